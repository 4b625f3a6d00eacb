//! Distributed algebra: storage types, vectors, sparse matrices and their
//! debug output.

pub mod algebra_type;
pub mod connection_viewer;
pub mod debug_writer;
pub mod matrix;
pub mod storage_type;
pub mod vector;

pub use algebra_type::{AlgebraKind, AlgebraType, BlockSize};
pub use matrix::ParallelMatrix;
pub use storage_type::StorageType;
pub use vector::ParallelVector;

use bytemuck::Pod;
use num_traits::Float;
use std::fmt::{Debug, Display};
use std::ops::{AddAssign, MulAssign, SubAssign};

/// Scalar entry type of vectors and matrices (`f32`, `f64`).
pub trait Scalar:
    Float
    + Pod
    + Default
    + Debug
    + Display
    + Send
    + Sync
    + AddAssign
    + SubAssign
    + MulAssign
    + 'static
{
    /// Lossy conversion used for defects and diagnostics.
    fn to_f64_lossy(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    fn from_f64_lossy(v: f64) -> Self {
        <Self as num_traits::NumCast>::from(v).unwrap_or_else(Self::nan)
    }
}

impl<T> Scalar for T where
    T: Float
        + Pod
        + Default
        + Debug
        + Display
        + Send
        + Sync
        + AddAssign
        + SubAssign
        + MulAssign
        + 'static
{
}
