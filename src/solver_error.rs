//! SolverError: Unified error type for sieve-solver public APIs
//!
//! Configuration problems, protocol violations and failures of nested
//! solvers are all reported through this type. Nothing in the crate
//! terminates the process; see [`SolverError::is_fatal`] for the split
//! between recoverable configuration errors and invariant violations.

use crate::algebra::storage_type::StorageType;
use thiserror::Error;

/// Unified error type for sieve-solver operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// An operator was used before the matrix/operator it acts on was set.
    #[error("{operator}: no operator set")]
    MissingOperator { operator: &'static str },
    /// A required sub-solver (Dirichlet, Neumann, base solver, ...) is missing.
    #[error("{operator}: no {solver} set")]
    MissingSubSolver {
        operator: &'static str,
        solver: &'static str,
    },
    /// The cross-point (Pi) layouts were not handed to a Schur operator.
    #[error("{operator}: master or slave layout for cross points not set")]
    MissingCrossPointLayouts { operator: &'static str },
    /// The domain decomposition info needed for cross-point extraction is missing.
    #[error("{operator}: no domain decomposition info set")]
    MissingDomainDecomposition { operator: &'static str },
    /// Operator carries the wrong number of layout levels.
    #[error("{operator}: operator must have {expected} layouts, but has {found}")]
    LayoutLevelMismatch {
        operator: &'static str,
        expected: usize,
        found: usize,
    },
    /// Generic invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// An operation was called before `init` brought the operator into a usable state.
    #[error("{operator}: not ready (state: {state})")]
    NotReady {
        operator: &'static str,
        state: &'static str,
    },
    /// Documented unsupported configuration or operation.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    /// Vector or matrix does not carry the storage type an operator requires.
    #[error(
        "{operator}: inadequate storage format of '{object}' (required {required}, found {found})"
    )]
    StorageTypeViolation {
        operator: &'static str,
        object: &'static str,
        required: StorageType,
        found: StorageType,
    },
    /// Level vectors disagree on storage type and cannot be merged.
    #[error("storage types of level vectors have no common type: {masks:?}")]
    StorageIntersectionEmpty { masks: Vec<(usize, StorageType)> },
    /// A framed message did not start/end with the expected sentinel.
    #[error("magic number mismatch in message from rank {peer}: expected {expected}, found {found}")]
    MagicNumberMismatch { peer: usize, expected: u32, found: u32 },
    /// Paired master/slave interfaces have different cardinalities.
    #[error("interface with rank {peer} has {expected} entries locally, but {found} arrived")]
    InterfaceSizeMismatch {
        peer: usize,
        expected: usize,
        found: usize,
    },
    /// A received buffer is malformed (too short, bad alignment, ...).
    #[error("communication with rank {peer} failed: {message}")]
    CommError { peer: usize, message: String },
    /// Index permutation does not match the number of DoFs.
    #[error("new index set must have same cardinality for swap indices (dofs {expected}, permutation {found})")]
    PermutationSizeMismatch { expected: usize, found: usize },
    /// Cuthill-McKee visited a different number of indices than it had to sort.
    #[error("Cuthill-McKee: must sort {expected} indices, but {sorted} indices sorted")]
    OrderingCountMismatch { expected: usize, sorted: usize },
    /// Cuthill-McKee could not write back all ordered indices.
    #[error("Cuthill-McKee: not all ordered indices written back ({written} of {expected})")]
    OrderingWriteBack { expected: usize, written: usize },
    /// Number of level vectors and level DoF distributions differ.
    #[error("number of level vectors ({vectors}) and level DoF distributions ({distributions}) does not match")]
    LevelCountMismatch { vectors: usize, distributions: usize },
    /// Surface and level index sets for the same vertex differ in size.
    #[error("vertex {vertex}: {surface} surface indices but {level} level indices")]
    ProjectionIndexMismatch {
        vertex: usize,
        surface: usize,
        level: usize,
    },
    /// Vector/matrix dimensions do not fit together.
    #[error("{operator}: dimension mismatch (expected {expected}, found {found})")]
    DimensionMismatch {
        operator: &'static str,
        expected: usize,
        found: usize,
    },
    /// A direct solver met a singular (or numerically singular) matrix.
    #[error("{operator}: matrix is singular")]
    SingularMatrix { operator: &'static str },
    /// A referenced vertex/edge/level does not exist in the grid.
    #[error("invalid grid reference: {0}")]
    InvalidGridReference(String),
    /// Writing debug output failed.
    #[error("I/O error: {0}")]
    Io(String),
    /// A nested solver, smoother or operator failed.
    #[error("{operator}: {stage} failed: {source}")]
    SubSolverFailed {
        operator: &'static str,
        stage: &'static str,
        #[source]
        source: Box<SolverError>,
    },
}

impl From<std::io::Error> for SolverError {
    fn from(e: std::io::Error) -> Self {
        SolverError::Io(e.to_string())
    }
}

impl SolverError {
    /// Wrap `self` as the failure of `stage` inside `operator`.
    pub fn within(self, operator: &'static str, stage: &'static str) -> Self {
        SolverError::SubSolverFailed {
            operator,
            stage,
            source: Box::new(self),
        }
    }

    /// Protocol and invariant violations indicate a programming error
    /// upstream; configuration errors can be fixed by the caller and retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            SolverError::StorageTypeViolation { .. }
            | SolverError::StorageIntersectionEmpty { .. }
            | SolverError::MagicNumberMismatch { .. }
            | SolverError::InterfaceSizeMismatch { .. }
            | SolverError::CommError { .. }
            | SolverError::PermutationSizeMismatch { .. }
            | SolverError::OrderingCountMismatch { .. }
            | SolverError::OrderingWriteBack { .. }
            | SolverError::LevelCountMismatch { .. }
            | SolverError::ProjectionIndexMismatch { .. } => true,
            SolverError::SubSolverFailed { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Innermost error of a chain of [`SolverError::SubSolverFailed`].
    pub fn root_cause(&self) -> &SolverError {
        match self {
            SolverError::SubSolverFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
