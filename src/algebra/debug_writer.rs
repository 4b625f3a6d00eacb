//! Sinks for intermediate vectors and matrices of a solver.

use super::Scalar;
use super::connection_viewer::{Position, write_matrix_file, write_vector_file};
use super::matrix::ParallelMatrix;
use super::vector::ParallelVector;
use crate::solver_error::SolverError;
use std::path::PathBuf;

/// Receives named vectors and matrices for inspection.
pub trait DebugWriter<T: Scalar>: Send + Sync {
    fn write_vector(&self, v: &ParallelVector<T>, name: &str) -> Result<(), SolverError>;
    fn write_matrix(&self, a: &ParallelMatrix<T>, name: &str) -> Result<(), SolverError>;
}

/// Writes ConnectionViewer files (`<name>.vec`, `<name>.mat`) into a
/// directory, rank-suffixed when more than one process writes.
#[derive(Clone, Debug)]
pub struct ConnectionViewerWriter {
    dir: PathBuf,
    positions: Vec<Position>,
    dim: usize,
    rank: usize,
    size: usize,
}

impl ConnectionViewerWriter {
    pub fn new(dir: impl Into<PathBuf>, positions: Vec<Position>, dim: usize) -> Self {
        Self {
            dir: dir.into(),
            positions,
            dim,
            rank: 0,
            size: 1,
        }
    }

    pub fn with_rank(mut self, rank: usize, size: usize) -> Self {
        self.rank = rank;
        self.size = size;
        self
    }

    fn file(&self, name: &str, ext: &str) -> String {
        self.dir.join(format!("{name}.{ext}")).to_string_lossy().into_owned()
    }
}

impl<T: Scalar> DebugWriter<T> for ConnectionViewerWriter {
    fn write_vector(&self, v: &ParallelVector<T>, name: &str) -> Result<(), SolverError> {
        let path = write_vector_file(&self.file(name, "vec"), v, &self.positions, self.dim, self.rank, self.size)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    fn write_matrix(&self, a: &ParallelMatrix<T>, name: &str) -> Result<(), SolverError> {
        let path = write_matrix_file(&self.file(name, "mat"), a, &self.positions, self.dim, self.rank, self.size)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}
