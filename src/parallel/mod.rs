//! Parallel layer: layouts, message passing, storage conversions and the
//! FETI cross-point split.

pub mod communicator;
pub mod cross_points;
pub mod domain_decomposition;
pub mod index_layout;
pub mod interface_comm;
pub mod layout_ops;
pub mod policy;
pub mod storage_conversion;
pub mod wire;

pub use communicator::{CommTag, Communicator, LocalComm, NoComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use domain_decomposition::{DomainDecompositionInfo, StandardDomainDecompositionInfo};
pub use index_layout::{AlgebraLayouts, IndexLayout, Interface, LayoutPair, LayoutRole};
pub use interface_comm::{InterfaceCommunicator, all_reduce_sum};
