//! Damped Jacobi and forward Gauss-Seidel smoothers.
//!
//! Both take an additive defect and return a consistent correction. The
//! diagonal is made consistent once in `init`, so every process divides by
//! the full diagonal entry of shared rows.

use super::{LinearIterator, require_matrix};
use crate::algebra::{ParallelMatrix, ParallelVector, Scalar, StorageType};
use crate::parallel::Communicator;
use crate::parallel::storage_conversion::{additive_to_consistent, additive_to_unique};
use crate::solver_error::SolverError;
use std::sync::Arc;

/// Consistent diagonal of `a`; fails on a zero entry.
fn consistent_diagonal<T: Scalar, C: Communicator>(
    a: &ParallelMatrix<T>,
    comm: &C,
    operator: &'static str,
) -> Result<Vec<T>, SolverError> {
    a.require_storage_type(StorageType::ADDITIVE, operator)?;
    if a.num_rows() != a.num_cols() {
        return Err(SolverError::DimensionMismatch {
            operator,
            expected: a.num_rows(),
            found: a.num_cols(),
        });
    }
    let mut diag = a.create_row_vector();
    for i in 0..a.num_rows() {
        diag[i] = a.diagonal(i);
    }
    diag.set_storage_type(StorageType::ADDITIVE);
    additive_to_consistent(&mut diag, comm)?;
    if let Some(i) = diag.values().iter().position(|&x| x == T::zero()) {
        log::error!("{operator}: zero diagonal entry in row {i}");
        return Err(SolverError::SingularMatrix { operator });
    }
    Ok(diag.into_values())
}

fn check_len<T: Scalar>(d: &ParallelVector<T>, n: usize, operator: &'static str) -> Result<(), SolverError> {
    if d.len() == n {
        Ok(())
    } else {
        Err(SolverError::DimensionMismatch {
            operator,
            expected: n,
            found: d.len(),
        })
    }
}

/// `c = damp * D^-1 d`.
#[derive(Clone)]
pub struct Jacobi<T: Scalar, C: Communicator + Clone> {
    damp: T,
    comm: C,
    a: Option<Arc<ParallelMatrix<T>>>,
    inv_diag: Vec<T>,
}

impl<T: Scalar, C: Communicator + Clone> Jacobi<T, C> {
    pub fn new(damp: T, comm: C) -> Self {
        Self {
            damp,
            comm,
            a: None,
            inv_diag: Vec::new(),
        }
    }

    pub fn damp(&self) -> T {
        self.damp
    }

    pub fn set_damp(&mut self, damp: T) {
        self.damp = damp;
    }
}

impl<T: Scalar, C: Communicator + Clone> LinearIterator<T> for Jacobi<T, C> {
    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        let diag = consistent_diagonal(&a, &self.comm, "Jacobi::init")?;
        self.inv_diag = diag.into_iter().map(|x| T::one() / x).collect();
        self.a = Some(a);
        Ok(())
    }

    fn matrix(&self) -> Option<&Arc<ParallelMatrix<T>>> {
        self.a.as_ref()
    }

    fn apply(&mut self, c: &mut ParallelVector<T>, d: &ParallelVector<T>) -> Result<(), SolverError> {
        require_matrix(&self.a, "Jacobi::apply")?;
        d.require_storage_type(StorageType::ADDITIVE, "Jacobi::apply", "d")?;
        check_len(d, self.inv_diag.len(), "Jacobi::apply")?;

        let mut t = d.clone();
        for (x, &inv) in t.values_mut().iter_mut().zip(&self.inv_diag) {
            *x *= self.damp * inv;
        }
        t.set_storage_type(StorageType::ADDITIVE);
        additive_to_consistent(&mut t, &self.comm)?;
        *c = t;
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn LinearIterator<T>> {
        Box::new(self.clone())
    }
}

/// One forward Gauss-Seidel sweep on the process-local rows.
#[derive(Clone)]
pub struct GaussSeidel<T: Scalar, C: Communicator + Clone> {
    comm: C,
    a: Option<Arc<ParallelMatrix<T>>>,
    diag: Vec<T>,
}

impl<T: Scalar, C: Communicator + Clone> GaussSeidel<T, C> {
    pub fn new(comm: C) -> Self {
        Self {
            comm,
            a: None,
            diag: Vec::new(),
        }
    }
}

impl<T: Scalar, C: Communicator + Clone> LinearIterator<T> for GaussSeidel<T, C> {
    fn name(&self) -> &'static str {
        "GaussSeidel"
    }

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        self.diag = consistent_diagonal(&a, &self.comm, "GaussSeidel::init")?;
        self.a = Some(a);
        Ok(())
    }

    fn matrix(&self) -> Option<&Arc<ParallelMatrix<T>>> {
        self.a.as_ref()
    }

    fn apply(&mut self, c: &mut ParallelVector<T>, d: &ParallelVector<T>) -> Result<(), SolverError> {
        let a = require_matrix(&self.a, "GaussSeidel::apply")?;
        d.require_storage_type(StorageType::ADDITIVE, "GaussSeidel::apply", "d")?;
        check_len(d, self.diag.len(), "GaussSeidel::apply")?;

        // a shared defect entry is only seen by its master
        let mut t = d.clone();
        additive_to_unique(&mut t, &self.comm)?;
        {
            let x = t.values_mut();
            for i in 0..x.len() {
                let mut s = x[i];
                for &(j, aij) in a.row(i) {
                    if j < i {
                        s -= aij * x[j];
                    }
                }
                x[i] = s / self.diag[i];
            }
        }
        t.set_storage_type(StorageType::ADDITIVE);
        additive_to_consistent(&mut t, &self.comm)?;
        *c = t;
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn LinearIterator<T>> {
        Box::new(self.clone())
    }
}
