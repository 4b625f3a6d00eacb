//! Iterative solvers driven by a [`ConvergenceCheck`].
//!
//! Non-convergence is not an error: both solvers return `Ok` and leave the
//! terminal [`ConvergenceStatus`] in [`LinearOperatorInverse::last_status`].

use super::convergence_check::{ConvergenceCheck, ConvergenceStatus, StandardConvCheck};
use super::{LinearIterator, LinearOperatorInverse, require_matrix};
use crate::algebra::{ParallelMatrix, ParallelVector, Scalar, StorageType};
use crate::parallel::Communicator;
use crate::parallel::storage_conversion::{additive_to_consistent, parallel_dot, parallel_two_norm};
use crate::solver_error::SolverError;
use std::sync::Arc;

/// Correction `c` for the defect `d`: the preconditioner if one is set,
/// otherwise the consistent copy of `d`.
fn precondition<T: Scalar, C: Communicator>(
    precond: &mut Option<Box<dyn LinearIterator<T>>>,
    c: &mut ParallelVector<T>,
    d: &ParallelVector<T>,
    comm: &C,
    operator: &'static str,
) -> Result<(), SolverError> {
    match precond {
        Some(p) => p.apply(c, d).map_err(|e| e.within(operator, "preconditioner")),
        None => {
            let mut t = d.clone();
            additive_to_consistent(&mut t, comm)?;
            *c = t;
            Ok(())
        }
    }
}

fn check_sizes<T: Scalar>(
    a: &ParallelMatrix<T>,
    u: &ParallelVector<T>,
    f: &ParallelVector<T>,
    operator: &'static str,
) -> Result<(), SolverError> {
    for len in [u.len(), f.len()] {
        if len != a.num_rows() {
            return Err(SolverError::DimensionMismatch {
                operator,
                expected: a.num_rows(),
                found: len,
            });
        }
    }
    Ok(())
}

/// Preconditioned Richardson iteration `u += B (f - A u)`.
#[derive(Clone)]
pub struct LinearSolver<T: Scalar, C: Communicator + Clone> {
    comm: C,
    a: Option<Arc<ParallelMatrix<T>>>,
    precond: Option<Box<dyn LinearIterator<T>>>,
    conv_check: Box<dyn ConvergenceCheck>,
    status: Option<ConvergenceStatus>,
}

impl<T: Scalar, C: Communicator + Clone> LinearSolver<T, C> {
    pub fn new(comm: C) -> Self {
        Self {
            comm,
            a: None,
            precond: None,
            conv_check: Box::new(StandardConvCheck::default()),
            status: None,
        }
    }

    pub fn with_preconditioner(mut self, precond: Box<dyn LinearIterator<T>>) -> Self {
        self.precond = Some(precond);
        self
    }

    pub fn with_convergence_check(mut self, check: Box<dyn ConvergenceCheck>) -> Self {
        self.conv_check = check;
        self
    }

    pub fn convergence_check(&self) -> &dyn ConvergenceCheck {
        self.conv_check.as_ref()
    }
}

impl<T: Scalar, C: Communicator + Clone> LinearOperatorInverse<T> for LinearSolver<T, C> {
    fn name(&self) -> &'static str {
        "LinearSolver"
    }

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        if let Some(p) = self.precond.as_mut() {
            p.init(a.clone())
                .map_err(|e| e.within("LinearSolver::init", "preconditioner"))?;
        }
        self.a = Some(a);
        self.status = None;
        Ok(())
    }

    fn apply_return_defect(
        &mut self,
        u: &mut ParallelVector<T>,
        f: &mut ParallelVector<T>,
    ) -> Result<(), SolverError> {
        const OP: &str = "LinearSolver::apply_return_defect";
        let a = require_matrix(&self.a, OP)?.clone();
        check_sizes(&a, u, f, OP)?;
        u.require_storage_type(StorageType::CONSISTENT, OP, "u")?;
        f.require_storage_type(StorageType::ADDITIVE, OP, "f")?;

        a.apply_sub(f, u)?;
        let mut c = u.zeros_like();

        self.conv_check.set_symbol('%');
        self.conv_check.set_name("Linear Solver");
        self.conv_check.start_defect(parallel_two_norm(f, &self.comm)?);

        while !self.conv_check.iteration_ended() {
            precondition(&mut self.precond, &mut c, f, &self.comm, OP)?;
            a.apply_sub(f, &c)?;
            u.add_assign_vec(&c)?;
            self.conv_check.update_defect(parallel_two_norm(f, &self.comm)?);
        }
        self.conv_check.post();
        self.status = Some(self.conv_check.status());
        Ok(())
    }

    fn last_status(&self) -> Option<ConvergenceStatus> {
        self.status
    }

    fn clone_box(&self) -> Box<dyn LinearOperatorInverse<T>> {
        Box::new(self.clone())
    }
}

/// Preconditioned conjugate gradients for symmetric positive definite
/// systems.
#[derive(Clone)]
pub struct CgSolver<T: Scalar, C: Communicator + Clone> {
    comm: C,
    a: Option<Arc<ParallelMatrix<T>>>,
    precond: Option<Box<dyn LinearIterator<T>>>,
    conv_check: Box<dyn ConvergenceCheck>,
    status: Option<ConvergenceStatus>,
}

impl<T: Scalar, C: Communicator + Clone> CgSolver<T, C> {
    pub fn new(comm: C) -> Self {
        Self {
            comm,
            a: None,
            precond: None,
            conv_check: Box::new(StandardConvCheck::default()),
            status: None,
        }
    }

    pub fn with_preconditioner(mut self, precond: Box<dyn LinearIterator<T>>) -> Self {
        self.precond = Some(precond);
        self
    }

    pub fn with_convergence_check(mut self, check: Box<dyn ConvergenceCheck>) -> Self {
        self.conv_check = check;
        self
    }

    pub fn convergence_check(&self) -> &dyn ConvergenceCheck {
        self.conv_check.as_ref()
    }
}

impl<T: Scalar, C: Communicator + Clone> LinearOperatorInverse<T> for CgSolver<T, C> {
    fn name(&self) -> &'static str {
        "CgSolver"
    }

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        if let Some(p) = self.precond.as_mut() {
            p.init(a.clone())
                .map_err(|e| e.within("CgSolver::init", "preconditioner"))?;
        }
        self.a = Some(a);
        self.status = None;
        Ok(())
    }

    fn apply_return_defect(
        &mut self,
        u: &mut ParallelVector<T>,
        f: &mut ParallelVector<T>,
    ) -> Result<(), SolverError> {
        const OP: &str = "CgSolver::apply_return_defect";
        let a = require_matrix(&self.a, OP)?.clone();
        check_sizes(&a, u, f, OP)?;
        u.require_storage_type(StorageType::CONSISTENT, OP, "u")?;
        f.require_storage_type(StorageType::ADDITIVE, OP, "f")?;

        // r = f - A u lives in f
        a.apply_sub(f, u)?;
        let mut z = u.zeros_like();
        let mut q = f.zeros_like();

        self.conv_check.set_symbol('%');
        self.conv_check.set_name("CG Solver");
        self.conv_check.start_defect(parallel_two_norm(f, &self.comm)?);

        let mut p = u.zeros_like();
        let mut rho = 0.0;
        let mut first = true;

        while !self.conv_check.iteration_ended() {
            precondition(&mut self.precond, &mut z, f, &self.comm, OP)?;
            let rho_new = parallel_dot(&z, f, &self.comm)?;
            if first {
                p.assign(&z)?;
                first = false;
            } else {
                let beta = T::from_f64_lossy(rho_new / rho);
                p.scale(beta);
                p.add_assign_vec(&z)?;
            }
            rho = rho_new;

            a.apply(&mut q, &p)?;
            let qp = parallel_dot(&q, &p, &self.comm)?;
            if qp == 0.0 {
                log::warn!("{OP}: search direction has zero energy, stopping");
                break;
            }
            let alpha = T::from_f64_lossy(rho / qp);
            u.axpy(alpha, &p)?;
            f.axpy(-alpha, &q)?;
            self.conv_check.update_defect(parallel_two_norm(f, &self.comm)?);
        }
        self.conv_check.post();
        self.status = Some(self.conv_check.status());
        Ok(())
    }

    fn last_status(&self) -> Option<ConvergenceStatus> {
        self.status
    }

    fn clone_box(&self) -> Box<dyn LinearOperatorInverse<T>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::config::ConvCheckConfig;
    use crate::operator::smoothers::Jacobi;
    use crate::parallel::NoComm;

    fn laplace(n: usize) -> Arc<ParallelMatrix<f64>> {
        let mut a = ParallelMatrix::new(n, n);
        for i in 0..n {
            a.add(i, i, 2.0).unwrap();
            if i > 0 {
                a.add(i, i - 1, -1.0).unwrap();
            }
            if i + 1 < n {
                a.add(i, i + 1, -1.0).unwrap();
            }
        }
        Arc::new(a)
    }

    fn check(max: usize) -> Box<dyn ConvergenceCheck> {
        Box::new(StandardConvCheck::new(ConvCheckConfig::new(max, 1e-12, 1e-10)))
    }

    #[test]
    fn cg_converges_within_n_steps() {
        let n = 8;
        let mut cg = CgSolver::new(NoComm).with_convergence_check(check(n + 2));
        cg.init(laplace(n)).unwrap();
        let mut u = ParallelVector::zeros(n);
        let mut f = ParallelVector::sequential(vec![1.0; n]);
        cg.apply_return_defect(&mut u, &mut f).unwrap();
        assert!(cg.last_status().unwrap().is_converged());
        assert!(cg.convergence_check().step() <= n);
    }

    #[test]
    fn jacobi_preconditioned_richardson_reduces_the_defect() {
        let n = 4;
        let mut ls = LinearSolver::new(NoComm)
            .with_preconditioner(Box::new(Jacobi::new(0.66, NoComm)))
            .with_convergence_check(check(500));
        ls.init(laplace(n)).unwrap();
        let mut u = ParallelVector::zeros(n);
        let f = ParallelVector::sequential(vec![1.0; n]);
        ls.apply(&mut u, &f).unwrap();
        assert!(ls.last_status().unwrap().is_converged());
        // solution of the discrete problem with f = 1: u = (2, 3, 3, 2)
        for (x, e) in u.values().iter().zip([2.0, 3.0, 3.0, 2.0]) {
            assert!((x - e).abs() < 1e-8);
        }
    }

    #[test]
    fn step_limit_is_a_status_not_an_error() {
        let n = 16;
        let mut ls = LinearSolver::new(NoComm)
            .with_preconditioner(Box::new(Jacobi::new(0.5, NoComm)))
            .with_convergence_check(check(3));
        ls.init(laplace(n)).unwrap();
        let mut u = ParallelVector::zeros(n);
        let mut f = ParallelVector::sequential(vec![1.0; n]);
        ls.apply_return_defect(&mut u, &mut f).unwrap();
        assert_eq!(ls.last_status(), Some(ConvergenceStatus::MaxStepsReached));
    }
}
