//! ConnectionViewer text output.
//!
//! Layout of a file:
//!
//! ```text
//! 1                 format version
//! <dim>
//! <n>               number of positions
//! x y               n position lines (dimension 1: "x 0.0")
//! 1                 show all connections
//! i j a_ij          one line per stored entry, zero written as "0"
//! v <path>          optional reference to a companion .values file
//! ```

use super::Scalar;
use super::matrix::ParallelMatrix;
use super::vector::ParallelVector;
use crate::solver_error::SolverError;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CONNECTION_VIEWER_VERSION: u32 = 1;

/// Coordinates of a DoF; unused trailing components are ignored.
pub type Position = [f64; 3];

/// Rank-suffixed file name: `dir/name.ext` becomes `dir/name_p0003.ext`.
pub fn parallel_file_name(name: &str, rank: usize) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let mut file = format!("{stem}_p{rank:04}");
    if let Some(ext) = path.extension() {
        file.push('.');
        file.push_str(&ext.to_string_lossy());
    }
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(file).to_string_lossy().into_owned(),
        _ => file,
    }
}

/// `name.ext` becomes `name.values`.
pub fn values_file_name(name: &str) -> PathBuf {
    Path::new(name).with_extension("values")
}

fn write_header<W: Write>(w: &mut W, positions: &[Position], dim: usize) -> Result<(), SolverError> {
    writeln!(w, "{CONNECTION_VIEWER_VERSION}")?;
    writeln!(w, "{dim}")?;
    writeln!(w, "{}", positions.len())?;
    for p in positions {
        match dim {
            1 => writeln!(w, "{} 0.0", p[0])?,
            2 => writeln!(w, "{} {}", p[0], p[1])?,
            _ => writeln!(w, "{} {} {}", p[0], p[1], p[2])?,
        }
    }
    writeln!(w, "1")?;
    Ok(())
}

fn write_connections<W: Write, T: Scalar>(w: &mut W, a: &ParallelMatrix<T>) -> Result<(), SolverError> {
    for (i, j, v) in a.triplets() {
        if v != T::zero() {
            writeln!(w, "{i} {j} {v}")?;
        } else {
            writeln!(w, "{i} {j} 0")?;
        }
    }
    Ok(())
}

fn check_positions(n: usize, positions: &[Position], operator: &'static str) -> Result<(), SolverError> {
    if positions.len() != n {
        log::error!("{operator}: {} positions for {n} rows", positions.len());
        return Err(SolverError::DimensionMismatch {
            operator,
            expected: n,
            found: positions.len(),
        });
    }
    Ok(())
}

/// Matrix with one position per row.
pub fn write_matrix_to_connection_viewer<W: Write, T: Scalar>(
    w: &mut W,
    a: &ParallelMatrix<T>,
    positions: &[Position],
    dim: usize,
) -> Result<(), SolverError> {
    check_positions(a.num_rows(), positions, "write_matrix_to_connection_viewer")?;
    write_header(w, positions, dim)?;
    write_connections(w, a)
}

/// Vector as a diagonal: one line `i i v_i` per entry.
pub fn write_vector_to_connection_viewer<W: Write, T: Scalar>(
    w: &mut W,
    v: &ParallelVector<T>,
    positions: &[Position],
    dim: usize,
) -> Result<(), SolverError> {
    check_positions(v.len(), positions, "write_vector_to_connection_viewer")?;
    write_header(w, positions, dim)?;
    for (i, x) in v.values().iter().enumerate() {
        writeln!(w, "{i} {i} {x}")?;
    }
    Ok(())
}

/// Matrix connections plus a `v <values_path>` marker; the values
/// (optionally minus `compare`) go to `values`. Only dimension 2 is supported.
#[allow(clippy::too_many_arguments)]
pub fn write_vector_with_matrix_to_connection_viewer<W: Write, V: Write, T: Scalar>(
    w: &mut W,
    values: &mut V,
    values_path: &str,
    a: &ParallelMatrix<T>,
    v: &ParallelVector<T>,
    positions: &[Position],
    dim: usize,
    compare: Option<&ParallelVector<T>>,
) -> Result<(), SolverError> {
    if dim != 2 {
        log::error!("write_vector_with_matrix_to_connection_viewer: only dimension 2 supported");
        return Err(SolverError::Unsupported(
            "connection viewer vector output with values file needs dimension 2",
        ));
    }
    if let Some(c) = compare.filter(|c| c.len() != v.len()) {
        log::error!(
            "write_vector_with_matrix_to_connection_viewer: compare vector has {} entries, vector {}",
            c.len(),
            v.len()
        );
        return Err(SolverError::DimensionMismatch {
            operator: "write_vector_with_matrix_to_connection_viewer",
            expected: v.len(),
            found: c.len(),
        });
    }
    write_matrix_to_connection_viewer(w, a, positions, dim)?;
    writeln!(w, "v {values_path}")?;
    for (i, &x) in v.values().iter().enumerate() {
        let t = match compare {
            Some(c) => x - c[i],
            None => x,
        };
        writeln!(values, "{i} {t}")?;
    }
    Ok(())
}

/// File variant of [`write_matrix_to_connection_viewer`]; rank-suffixed
/// when `size > 1`.
pub fn write_matrix_file<T: Scalar>(
    filename: &str,
    a: &ParallelMatrix<T>,
    positions: &[Position],
    dim: usize,
    rank: usize,
    size: usize,
) -> Result<PathBuf, SolverError> {
    let name = if size > 1 {
        parallel_file_name(filename, rank)
    } else {
        filename.to_owned()
    };
    let mut f = std::io::BufWriter::new(std::fs::File::create(&name)?);
    write_matrix_to_connection_viewer(&mut f, a, positions, dim)?;
    f.flush()?;
    Ok(PathBuf::from(name))
}

/// File variant of [`write_vector_to_connection_viewer`].
pub fn write_vector_file<T: Scalar>(
    filename: &str,
    v: &ParallelVector<T>,
    positions: &[Position],
    dim: usize,
    rank: usize,
    size: usize,
) -> Result<PathBuf, SolverError> {
    let name = if size > 1 {
        parallel_file_name(filename, rank)
    } else {
        filename.to_owned()
    };
    let mut f = std::io::BufWriter::new(std::fs::File::create(&name)?);
    write_vector_to_connection_viewer(&mut f, v, positions, dim)?;
    f.flush()?;
    Ok(PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_names() {
        assert_eq!(parallel_file_name("A.mat", 3), "A_p0003.mat");
        assert_eq!(parallel_file_name("out/A.mat", 12), "out/A_p0012.mat");
        assert_eq!(values_file_name("dir/x.vec"), PathBuf::from("dir/x.values"));
    }

    #[test]
    fn one_dimensional_positions_and_zero_entries() {
        let a = ParallelMatrix::from_triplets(2, 2, [(0, 0, 2.5f64), (0, 1, 0.0), (1, 1, 1.0)]).unwrap();
        let mut out = Vec::new();
        write_matrix_to_connection_viewer(&mut out, &a, &[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]], 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "1\n1\n2\n0 0.0\n0.5 0.0\n1\n0 0 2.5\n0 1 0\n1 1 1\n");
    }

    #[test]
    fn values_companion() {
        let a = ParallelMatrix::<f64>::identity(2);
        let v = ParallelVector::sequential(vec![3.0, 4.0]);
        let c = ParallelVector::sequential(vec![1.0, 1.0]);
        let (mut w, mut vals) = (Vec::new(), Vec::new());
        write_vector_with_matrix_to_connection_viewer(
            &mut w,
            &mut vals,
            "x.values",
            &a,
            &v,
            &[[0.0; 3], [1.0, 0.0, 0.0]],
            2,
            Some(&c),
        )
        .unwrap();
        assert!(String::from_utf8(w).unwrap().ends_with("1 1 1\nv x.values\n"));
        assert_eq!(String::from_utf8(vals).unwrap(), "0 2\n1 3\n");
    }

    #[test]
    fn short_compare_vector_is_rejected() {
        let a = ParallelMatrix::<f64>::identity(2);
        let v = ParallelVector::sequential(vec![3.0, 4.0]);
        let c = ParallelVector::sequential(vec![1.0]);
        let (mut w, mut vals) = (Vec::new(), Vec::new());
        let err = write_vector_with_matrix_to_connection_viewer(
            &mut w,
            &mut vals,
            "x.values",
            &a,
            &v,
            &[[0.0; 3], [1.0, 0.0, 0.0]],
            2,
            Some(&c),
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch { expected: 2, found: 1, .. }));
        assert!(w.is_empty() && vals.is_empty());
    }
}
