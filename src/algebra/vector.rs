//! Distributed vector with storage-type tracking.

use super::Scalar;
use super::storage_type::StorageType;
use crate::parallel::index_layout::{AlgebraLayouts, IndexLayout};
use crate::solver_error::SolverError;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Process-local part of a distributed vector.
///
/// The vector knows the layouts of the entries it shares with other ranks
/// and the [`StorageType`] its values are currently in. Only the layout
/// level selected by [`ParallelVector::use_layout`] takes part in
/// communication. A vector without interfaces on that level is always
/// reported as having every storage type.
#[derive(Clone, Debug)]
pub struct ParallelVector<T> {
    values: Vec<T>,
    storage: StorageType,
    layouts: Arc<AlgebraLayouts>,
    layout_level: usize,
}

impl<T: Scalar> ParallelVector<T> {
    /// Purely local vector.
    pub fn sequential(values: Vec<T>) -> Self {
        Self {
            values,
            storage: StorageType::ALL,
            layouts: Arc::new(AlgebraLayouts::sequential()),
            layout_level: 0,
        }
    }

    pub fn zeros(n: usize) -> Self {
        Self::sequential(vec![T::zero(); n])
    }

    /// Vector over `layouts` holding `values` in `storage`.
    pub fn with_layouts(values: Vec<T>, layouts: Arc<AlgebraLayouts>, storage: StorageType) -> Self {
        let mut v = Self {
            values,
            storage: StorageType::UNDEFINED,
            layouts,
            layout_level: 0,
        };
        v.set_storage_type(storage);
        v
    }

    /// Zero vector of the same size sharing layouts and active level.
    pub fn zeros_like(&self) -> Self {
        let mut v = Self {
            values: vec![T::zero(); self.values.len()],
            storage: StorageType::ALL,
            layouts: self.layouts.clone(),
            layout_level: self.layout_level,
        };
        v.set_storage_type(StorageType::ALL);
        v
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Direct access to the values. The storage type is left untouched;
    /// callers that change its meaning must call [`Self::set_storage_type`].
    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    pub fn resize(&mut self, n: usize) {
        self.values.resize(n, T::zero());
    }

    // --- storage type ---

    pub fn storage_type(&self) -> StorageType {
        self.storage
    }

    pub fn set_storage_type(&mut self, t: StorageType) {
        self.storage = if t.is_undefined() {
            t
        } else if self.has_interfaces() {
            t.normalized()
        } else {
            StorageType::ALL
        };
    }

    pub fn add_storage_type(&mut self, t: StorageType) {
        let cur = self.storage;
        self.set_storage_type(cur | t);
    }

    pub fn remove_storage_type(&mut self, t: StorageType) {
        self.storage = StorageType::from_bits(self.storage.bits() & !t.bits());
    }

    pub fn has_storage_type(&self, t: StorageType) -> bool {
        self.storage.contains(t)
    }

    /// Fail with [`SolverError::StorageTypeViolation`] unless the vector is in `required`.
    pub fn require_storage_type(
        &self,
        required: StorageType,
        operator: &'static str,
        object: &'static str,
    ) -> Result<(), SolverError> {
        if self.has_storage_type(required) {
            return Ok(());
        }
        log::error!(
            "{operator}: inadequate storage format of vector '{object}' (should be {required}, is {})",
            self.storage
        );
        Err(SolverError::StorageTypeViolation {
            operator,
            object,
            required,
            found: self.storage,
        })
    }

    // --- layouts ---

    pub fn layouts(&self) -> &Arc<AlgebraLayouts> {
        &self.layouts
    }

    pub fn set_layouts(&mut self, layouts: Arc<AlgebraLayouts>) {
        self.layouts = layouts;
        let cur = self.storage;
        self.set_storage_type(cur);
    }

    pub fn layout_level(&self) -> usize {
        self.layout_level
    }

    /// Select which layout level takes part in communication.
    pub fn use_layout(&mut self, level: usize) {
        self.layout_level = level;
    }

    pub fn master_layout(&self) -> &IndexLayout {
        self.layouts.master(self.layout_level)
    }

    pub fn slave_layout(&self) -> &IndexLayout {
        self.layouts.slave(self.layout_level)
    }

    pub fn master_layout_at(&self, level: usize) -> &IndexLayout {
        self.layouts.master(level)
    }

    pub fn slave_layout_at(&self, level: usize) -> &IndexLayout {
        self.layouts.slave(level)
    }

    /// True if the active layout level has any interface.
    pub fn has_interfaces(&self) -> bool {
        !self.layouts.level(self.layout_level).is_empty()
    }

    // --- arithmetic ---

    /// Set every entry to `value`. Zero is valid in every storage type,
    /// any other constant is consistent.
    pub fn set_all(&mut self, value: T) {
        self.values.iter_mut().for_each(|x| *x = value);
        if value == T::zero() {
            self.set_storage_type(StorageType::ALL);
        } else {
            self.set_storage_type(StorageType::CONSISTENT);
        }
    }

    /// Copy values and storage type of `other` (sizes must agree).
    pub fn assign(&mut self, other: &Self) -> Result<(), SolverError> {
        self.check_len(other, "ParallelVector::assign")?;
        self.values.copy_from_slice(&other.values);
        self.storage = other.storage;
        Ok(())
    }

    pub fn scale(&mut self, alpha: T) {
        self.values.iter_mut().for_each(|x| *x *= alpha);
    }

    /// `self += alpha * x`; the storage type becomes the common part of both.
    pub fn axpy(&mut self, alpha: T, x: &Self) -> Result<(), SolverError> {
        self.check_len(x, "ParallelVector::axpy")?;
        #[cfg(feature = "rayon")]
        self.values
            .par_iter_mut()
            .zip(x.values.par_iter())
            .for_each(|(a, &b)| *a += alpha * b);
        #[cfg(not(feature = "rayon"))]
        self.values
            .iter_mut()
            .zip(&x.values)
            .for_each(|(a, &b)| *a += alpha * b);
        self.storage = self.storage & x.storage;
        Ok(())
    }

    pub fn add_assign_vec(&mut self, x: &Self) -> Result<(), SolverError> {
        self.axpy(T::one(), x)
    }

    pub fn sub_assign_vec(&mut self, x: &Self) -> Result<(), SolverError> {
        self.axpy(-T::one(), x)
    }

    /// Process-local inner product (no communication).
    pub fn dot_local(&self, other: &Self) -> T {
        dot_kernel(&self.values, &other.values)
    }

    /// Process-local Euclidean norm (no communication).
    pub fn norm_local(&self) -> T {
        self.dot_local(self).sqrt()
    }

    pub fn max_abs_local(&self) -> T {
        self.values
            .iter()
            .fold(T::zero(), |m, &x| if x.abs() > m { x.abs() } else { m })
    }

    fn check_len(&self, other: &Self, operator: &'static str) -> Result<(), SolverError> {
        if self.len() == other.len() {
            Ok(())
        } else {
            Err(SolverError::DimensionMismatch {
                operator,
                expected: self.len(),
                found: other.len(),
            })
        }
    }
}

#[cfg(feature = "rayon")]
fn dot_kernel<T: Scalar>(a: &[T], b: &[T]) -> T {
    a.par_iter()
        .zip(b.par_iter())
        .map(|(&x, &y)| x * y)
        .reduce(T::zero, |x, y| x + y)
}

#[cfg(not(feature = "rayon"))]
fn dot_kernel<T: Scalar>(a: &[T], b: &[T]) -> T {
    a.iter().zip(b).fold(T::zero(), |acc, (&x, &y)| acc + x * y)
}

impl<T> Index<usize> for ParallelVector<T> {
    type Output = T;
    #[inline]
    fn index(&self, i: usize) -> &T {
        &self.values[i]
    }
}

impl<T> IndexMut<usize> for ParallelVector<T> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.values[i]
    }
}
