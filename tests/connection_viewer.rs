use sieve_solver::algebra::connection_viewer::{
    parallel_file_name, write_matrix_file, write_matrix_to_connection_viewer, write_vector_to_connection_viewer,
};
use sieve_solver::algebra::debug_writer::{ConnectionViewerWriter, DebugWriter};
use sieve_solver::algebra::{ParallelMatrix, ParallelVector};
use sieve_solver::solver_error::SolverError;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sieve-solver-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn identity_in_two_dimensions() {
    let a = ParallelMatrix::<f64>::identity(2);
    let mut out = Vec::new();
    write_matrix_to_connection_viewer(&mut out, &a, &[[0.0, 0.0, 0.0], [1.0, 1.0, 0.0]], 2).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "1\n2\n2\n0 0\n1 1\n1\n0 0 1\n1 1 1\n");
}

#[test]
fn vector_is_written_as_a_diagonal() {
    let v = ParallelVector::sequential(vec![0.5f64, -2.0]);
    let mut out = Vec::new();
    write_vector_to_connection_viewer(&mut out, &v, &[[0.0; 3], [1.0, 2.0, 3.0]], 3).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("1\n3\n2\n0 0 0\n1 2 3\n1\n"));
    assert!(text.ends_with("0 0 0.5\n1 1 -2\n"));
}

#[test]
fn one_position_per_row_is_required() {
    let a = ParallelMatrix::<f64>::identity(3);
    let mut out = Vec::new();
    let err = write_matrix_to_connection_viewer(&mut out, &a, &[[0.0; 3]], 2).unwrap_err();
    assert!(matches!(err, SolverError::DimensionMismatch { expected: 3, found: 1, .. }));
    assert!(out.is_empty());
}

#[test]
fn files_get_a_rank_suffix_in_parallel() {
    let dir = scratch_dir("cv-files");
    let a = ParallelMatrix::<f64>::identity(2);
    let pos = vec![[0.0; 3], [1.0, 0.0, 0.0]];

    let name = dir.join("A.mat").to_string_lossy().into_owned();
    let serial = write_matrix_file(&name, &a, &pos, 1, 0, 1).unwrap();
    assert_eq!(serial, PathBuf::from(&name));
    let parallel = write_matrix_file(&name, &a, &pos, 1, 5, 8).unwrap();
    assert_eq!(parallel, PathBuf::from(parallel_file_name(&name, 5)));
    assert!(parallel.ends_with("A_p0005.mat"));
    assert_eq!(
        std::fs::read_to_string(&serial).unwrap(),
        std::fs::read_to_string(&parallel).unwrap()
    );
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn debug_writer_names_files_after_the_object() {
    let dir = scratch_dir("cv-writer");
    let writer = ConnectionViewerWriter::new(&dir, vec![[0.0; 3], [0.5, 0.0, 0.0]], 1);
    let v = ParallelVector::sequential(vec![1.0f64, 2.0]);
    DebugWriter::<f64>::write_matrix(&writer, &ParallelMatrix::identity(2), "Stiffness").unwrap();
    writer.write_vector(&v, "Defect").unwrap();

    let mat = std::fs::read_to_string(dir.join("Stiffness.mat")).unwrap();
    assert!(mat.starts_with("1\n1\n2\n0 0.0\n0.5 0.0\n"));
    let vec = std::fs::read_to_string(dir.join("Defect.vec")).unwrap();
    assert!(vec.ends_with("0 0 1\n1 1 2\n"));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_directory_is_an_io_error() {
    let dir = std::env::temp_dir().join(format!("sieve-solver-missing-{}", std::process::id()));
    let writer = ConnectionViewerWriter::new(dir.join("nowhere"), vec![[0.0; 3]], 1);
    let err = writer
        .write_vector(&ParallelVector::sequential(vec![1.0f64]), "x")
        .unwrap_err();
    assert!(matches!(err, SolverError::Io(_)));
}
