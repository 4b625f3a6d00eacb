//! Row-compressed distributed sparse matrix.

use super::Scalar;
use super::storage_type::StorageType;
use super::vector::ParallelVector;
use crate::parallel::index_layout::{AlgebraLayouts, IndexLayout};
use crate::solver_error::SolverError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Process-local rows of a distributed sparse matrix.
///
/// Each row stores `(column, value)` pairs sorted by column. The matrix
/// carries layouts and a storage type exactly like [`ParallelVector`]; an
/// assembled finite-element matrix is usually ADDITIVE.
#[derive(Clone, Debug)]
pub struct ParallelMatrix<T> {
    rows: Vec<Vec<(usize, T)>>,
    num_cols: usize,
    storage: StorageType,
    layouts: Arc<AlgebraLayouts>,
    layout_level: usize,
}

impl<T: Scalar> ParallelMatrix<T> {
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            rows: vec![Vec::new(); num_rows],
            num_cols,
            storage: StorageType::ALL,
            layouts: Arc::new(AlgebraLayouts::sequential()),
            layout_level: 0,
        }
    }

    /// Assemble from `(row, col, value)` triplets; duplicates are summed.
    pub fn from_triplets<I>(num_rows: usize, num_cols: usize, triplets: I) -> Result<Self, SolverError>
    where
        I: IntoIterator<Item = (usize, usize, T)>,
    {
        let mut m = Self::new(num_rows, num_cols);
        for (i, j, v) in triplets {
            m.add(i, j, v)?;
        }
        Ok(m)
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for (i, row) in m.rows.iter_mut().enumerate() {
            row.push((i, T::one()));
        }
        m
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn row(&self, i: usize) -> &[(usize, T)] {
        &self.rows[i]
    }

    fn check_entry(&self, i: usize, j: usize) -> Result<(), SolverError> {
        if i >= self.num_rows() {
            return Err(SolverError::DimensionMismatch {
                operator: "ParallelMatrix",
                expected: self.num_rows(),
                found: i,
            });
        }
        if j >= self.num_cols {
            return Err(SolverError::DimensionMismatch {
                operator: "ParallelMatrix",
                expected: self.num_cols,
                found: j,
            });
        }
        Ok(())
    }

    /// `A[i][j] += v`.
    pub fn add(&mut self, i: usize, j: usize, v: T) -> Result<(), SolverError> {
        self.check_entry(i, j)?;
        let row = &mut self.rows[i];
        match row.binary_search_by_key(&j, |&(c, _)| c) {
            Ok(pos) => row[pos].1 += v,
            Err(pos) => row.insert(pos, (j, v)),
        }
        Ok(())
    }

    /// `A[i][j] = v`.
    pub fn set(&mut self, i: usize, j: usize, v: T) -> Result<(), SolverError> {
        self.check_entry(i, j)?;
        let row = &mut self.rows[i];
        match row.binary_search_by_key(&j, |&(c, _)| c) {
            Ok(pos) => row[pos].1 = v,
            Err(pos) => row.insert(pos, (j, v)),
        }
        Ok(())
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        self.rows
            .get(i)
            .and_then(|row| {
                row.binary_search_by_key(&j, |&(c, _)| c)
                    .ok()
                    .map(|pos| row[pos].1)
            })
            .unwrap_or_else(T::zero)
    }

    pub fn diagonal(&self, i: usize) -> T {
        self.get(i, i)
    }

    /// Replace row `i` by the identity row; the column is left untouched.
    pub fn set_dirichlet_row(&mut self, i: usize) {
        if let Some(row) = self.rows.get_mut(i) {
            row.clear();
            row.push((i, T::one()));
        }
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::new(self.num_cols, self.num_rows());
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, v) in row {
                t.rows[j].push((i, v));
            }
        }
        t.storage = self.storage;
        t.layouts = self.layouts.clone();
        t
    }

    // --- storage type and layouts (same rules as ParallelVector) ---

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

    pub fn has_storage_type(&self, t: StorageType) -> bool {
        self.storage.contains(t)
    }

    pub fn require_storage_type(
        &self,
        required: StorageType,
        operator: &'static str,
    ) -> Result<(), SolverError> {
        if self.has_storage_type(required) {
            return Ok(());
        }
        log::error!(
            "{operator}: inadequate storage format of matrix (should be {required}, is {})",
            self.storage
        );
        Err(SolverError::StorageTypeViolation {
            operator,
            object: "matrix",
            required,
            found: self.storage,
        })
    }

    pub fn layouts(&self) -> &Arc<AlgebraLayouts> {
        &self.layouts
    }

    pub fn set_layouts(&mut self, layouts: Arc<AlgebraLayouts>) {
        self.layouts = layouts;
        let cur = self.storage;
        self.set_storage_type(cur);
    }

    pub fn num_layouts(&self) -> usize {
        self.layouts.num_levels()
    }

    pub fn layout_level(&self) -> usize {
        self.layout_level
    }

    pub fn use_layout(&mut self, level: usize) {
        self.layout_level = level;
    }

    pub fn master_layout(&self, level: usize) -> &IndexLayout {
        self.layouts.master(level)
    }

    pub fn slave_layout(&self, level: usize) -> &IndexLayout {
        self.layouts.slave(level)
    }

    pub fn has_interfaces(&self) -> bool {
        !self.layouts.level(self.layout_level).is_empty()
    }

    /// Zero row vector sharing this matrix' layouts and active level.
    pub fn create_row_vector(&self) -> ParallelVector<T> {
        let mut v = ParallelVector::with_layouts(
            vec![T::zero(); self.num_rows()],
            self.layouts.clone(),
            StorageType::ALL,
        );
        v.use_layout(self.layout_level);
        v.set_storage_type(StorageType::ALL);
        v
    }

    // --- products ---

    /// Storage type of `A u` or `A^T u`, or an error naming `operator`.
    fn product_storage(
        &self,
        u: &ParallelVector<T>,
        operator: &'static str,
    ) -> Result<StorageType, SolverError> {
        if self.has_storage_type(StorageType::ADDITIVE) && u.has_storage_type(StorageType::CONSISTENT) {
            return Ok(StorageType::ADDITIVE);
        }
        if self.has_storage_type(StorageType::CONSISTENT) && u.has_storage_type(StorageType::ADDITIVE) {
            return Ok(StorageType::ADDITIVE);
        }
        log::error!(
            "{operator}: wrong storage type of matrix ({}) and vector ({})",
            self.storage,
            u.storage_type()
        );
        if !self.has_storage_type(StorageType::ADDITIVE) {
            return Err(SolverError::StorageTypeViolation {
                operator,
                object: "matrix",
                required: StorageType::ADDITIVE,
                found: self.storage,
            });
        }
        Err(SolverError::StorageTypeViolation {
            operator,
            object: "u",
            required: StorageType::CONSISTENT,
            found: u.storage_type(),
        })
    }

    fn check_dims(&self, out: usize, inp: usize, rows: usize, cols: usize, op: &'static str) -> Result<(), SolverError> {
        if inp != cols {
            return Err(SolverError::DimensionMismatch {
                operator: op,
                expected: cols,
                found: inp,
            });
        }
        if out != rows {
            return Err(SolverError::DimensionMismatch {
                operator: op,
                expected: rows,
                found: out,
            });
        }
        Ok(())
    }

    /// `f = A u`.
    pub fn apply(&self, f: &mut ParallelVector<T>, u: &ParallelVector<T>) -> Result<(), SolverError> {
        let st = self.product_storage(u, "ParallelMatrix::apply")?;
        self.check_dims(f.len(), u.len(), self.num_rows(), self.num_cols, "ParallelMatrix::apply")?;
        let uv = u.values();
        for (fi, row) in f.values_mut().iter_mut().zip(&self.rows) {
            *fi = row.iter().fold(T::zero(), |acc, &(j, a)| acc + a * uv[j]);
        }
        f.set_storage_type(st);
        Ok(())
    }

    /// `f -= A u`; `f` must be additive.
    pub fn apply_sub(&self, f: &mut ParallelVector<T>, u: &ParallelVector<T>) -> Result<(), SolverError> {
        let st = self.product_storage(u, "ParallelMatrix::apply_sub")?;
        f.require_storage_type(StorageType::ADDITIVE, "ParallelMatrix::apply_sub", "f")?;
        self.check_dims(f.len(), u.len(), self.num_rows(), self.num_cols, "ParallelMatrix::apply_sub")?;
        let uv = u.values();
        for (fi, row) in f.values_mut().iter_mut().zip(&self.rows) {
            for &(j, a) in row {
                *fi -= a * uv[j];
            }
        }
        let cur = f.storage_type();
        f.set_storage_type(cur & st);
        Ok(())
    }

    /// `f = A^T u`.
    pub fn apply_transposed(
        &self,
        f: &mut ParallelVector<T>,
        u: &ParallelVector<T>,
    ) -> Result<(), SolverError> {
        let st = self.product_storage(u, "ParallelMatrix::apply_transposed")?;
        self.check_dims(f.len(), u.len(), self.num_cols, self.num_rows(), "ParallelMatrix::apply_transposed")?;
        f.values_mut().iter_mut().for_each(|x| *x = T::zero());
        let uv = u.values();
        let fv = f.values_mut();
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, a) in row {
                fv[j] += a * uv[i];
            }
        }
        f.set_storage_type(st);
        Ok(())
    }

    /// Galerkin product `P^T A P` for a prolongation `P` (fine x coarse).
    pub fn galerkin(&self, p: &ParallelMatrix<T>) -> Result<ParallelMatrix<T>, SolverError> {
        if p.num_rows() != self.num_cols || self.num_rows() != self.num_cols {
            return Err(SolverError::DimensionMismatch {
                operator: "ParallelMatrix::galerkin",
                expected: self.num_cols,
                found: p.num_rows(),
            });
        }
        // AP, fine x coarse
        let mut ap: Vec<BTreeMap<usize, T>> = vec![BTreeMap::new(); self.num_rows()];
        for (i, row) in self.rows.iter().enumerate() {
            for &(k, a) in row {
                for &(c, pv) in &p.rows[k] {
                    *ap[i].entry(c).or_insert_with(T::zero) += a * pv;
                }
            }
        }
        let nc = p.num_cols;
        let mut rc: Vec<BTreeMap<usize, T>> = vec![BTreeMap::new(); nc];
        for (k, prow) in p.rows.iter().enumerate() {
            for &(c, pv) in prow {
                for (&j, &v) in &ap[k] {
                    *rc[c].entry(j).or_insert_with(T::zero) += pv * v;
                }
            }
        }
        let mut coarse = ParallelMatrix::new(nc, nc);
        coarse.rows = rc.into_iter().map(|r| r.into_iter().collect()).collect();
        coarse.set_storage_type(self.storage);
        Ok(coarse)
    }

    /// Dense copy in double precision for process-local direct solvers.
    pub fn to_dense_f64(&self) -> nalgebra::DMatrix<f64> {
        let mut d = nalgebra::DMatrix::<f64>::zeros(self.num_rows(), self.num_cols);
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, v) in row {
                d[(i, j)] = v.to_f64_lossy();
            }
        }
        d
    }

    /// Iterate `(row, col, value)` over all stored entries.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().map(move |&(j, v)| (i, j, v)))
    }
}
