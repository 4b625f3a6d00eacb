use crate::solver_error::SolverError;

/// Structural self-checks for layouts, grids and surface views.
///
/// `validate_invariants` always runs and reports the first violation;
/// `debug_assert_invariants` panics on it, but only in debug builds or with
/// the `check-invariants` feature.
pub trait DebugInvariants {
    fn debug_assert_invariants(&self);
    fn validate_invariants(&self) -> Result<(), SolverError>;
}

/// Run a `Result<(), SolverError>` check; log and panic on `Err` when
/// invariant checking is compiled in, otherwise expand to nothing.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $what:literal) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        {
            if let Err(err) = $check {
                log::error!("{} invariant violated: {}", $what, err);
                panic!("{} invariant violated: {}", $what, err);
            }
        }
    };
}
