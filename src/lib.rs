#![cfg_attr(docsrs, feature(doc_cfg))]
//! # sieve-solver
//!
//! Parallel sparse algebra and solvers for finite-element codes: distributed
//! index layouts, storage-type tracked vectors and matrices, P1 degree of
//! freedom distributions on hierarchical grids, geometric multigrid and
//! FETI-DP domain decomposition.
//!
//! ## Storage types
//!
//! Every [`ParallelVector`](algebra::ParallelVector) and
//! [`ParallelMatrix`](algebra::ParallelMatrix) carries a
//! [`StorageType`](algebra::StorageType) telling how the copies of a shared
//! index on several processes relate:
//!
//! - *consistent*: every copy holds the full value,
//! - *additive*: the full value is the sum over all copies,
//! - *unique*: the master copy holds the full value, slaves hold zero.
//!
//! Operations check the storage types of their arguments and fail with
//! [`SolverError::StorageTypeViolation`](solver_error::SolverError) on an
//! illegal combination.
//!
//! ## Communication
//!
//! Processes exchange interface values through a
//! [`Communicator`](parallel::Communicator). [`NoComm`](parallel::NoComm)
//! serves serial runs, [`LocalComm`](parallel::LocalComm) runs several ranks
//! as threads of one process, and `MpiComm` (feature `mpi-support`) wraps
//! rsmpi.
//!
//! ## Features
//! - `mpi-support`: MPI backend
//! - `rayon`: parallel local vector kernels
//! - `check-invariants`: run [`DebugInvariants`] checks in release builds
//!
//! ## Logging
//!
//! Diagnostics go through the `log` facade. Nothing is printed unless the
//! application installs a logger.

pub mod algebra;
pub mod debug_invariants;
pub mod dof;
pub mod operator;
pub mod parallel;
pub mod solver_error;

pub use debug_invariants::DebugInvariants;

/// The most-used traits and types.
pub mod prelude {
    pub use crate::algebra::debug_writer::{ConnectionViewerWriter, DebugWriter};
    pub use crate::algebra::{
        AlgebraKind, AlgebraType, BlockSize, ParallelMatrix, ParallelVector, Scalar, StorageType,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::dof::{
        DofDistribution, FunctionPattern, GridView, GroupedP1ConformDofDistribution, MultiGrid,
        P1ConformDofDistribution, P1Prolongation, Prolongation, SurfaceView, VertexId,
        compute_cuthill_mckee_order, create_p1_distribution, order_cuthill_mckee,
    };
    pub use crate::operator::{
        CgSolver, ConvCheckConfig, ConvergenceCheck, ConvergenceStatus, CycleType, FetiIteration,
        FetiSolver, FetiState, GaussSeidel, GeometricMultigrid, Jacobi, LinearIterator,
        LinearOperator, LinearOperatorInverse, LinearSolver, LocalSchurComplement, LuSolver,
        MultigridConfig, SchurComplementInverse, StandardConvCheck,
    };
    #[cfg(feature = "mpi-support")]
    pub use crate::parallel::MpiComm;
    pub use crate::parallel::storage_conversion::{
        additive_to_consistent, additive_to_unique, change_storage_type, consistent_to_unique,
        parallel_dot, parallel_two_norm, unique_to_consistent,
    };
    pub use crate::parallel::{
        AlgebraLayouts, Communicator, DomainDecompositionInfo, IndexLayout, LayoutPair, LocalComm,
        NoComm, StandardDomainDecompositionInfo,
    };
    pub use crate::solver_error::SolverError;
}
