//! Algebra backend selection.
//!
//! An [`AlgebraType`] is chosen once during setup and passed to whatever
//! needs it (e.g. [`crate::dof::create_p1_distribution`]). There is no
//! process-wide default.

use crate::solver_error::SolverError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgebraKind {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockSize {
    Fixed(usize),
    Variable,
}

impl Default for BlockSize {
    fn default() -> Self {
        BlockSize::Fixed(1)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgebraType {
    pub kind: AlgebraKind,
    pub block_size: BlockSize,
}

impl AlgebraType {
    pub fn new(kind: AlgebraKind, block_size: usize) -> Self {
        Self {
            kind,
            block_size: BlockSize::Fixed(block_size),
        }
    }

    pub fn variable(kind: AlgebraKind) -> Self {
        Self {
            kind,
            block_size: BlockSize::Variable,
        }
    }

    /// Parse the backend name and attach a fixed block size.
    pub fn parse_with_block_size(kind: &str, block_size: usize) -> Result<Self, SolverError> {
        Ok(Self::new(kind.parse()?, block_size))
    }

    /// Block algebras store all functions of a vertex in one block.
    pub fn uses_grouped_dofs(&self) -> bool {
        self.block_size != BlockSize::Fixed(1)
    }
}

impl FromStr for AlgebraKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CPU" => Ok(AlgebraKind::Cpu),
            "GPU" => Ok(AlgebraKind::Gpu),
            other => Err(SolverError::InvalidConfiguration(format!(
                "unknown algebra type '{other}'"
            ))),
        }
    }
}

/// A bare backend name selects variable block size.
impl FromStr for AlgebraType {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::variable(s.parse()?))
    }
}

impl fmt::Display for AlgebraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgebraKind::Cpu => write!(f, "CPU"),
            AlgebraKind::Gpu => write!(f, "GPU"),
        }
    }
}

impl fmt::Display for AlgebraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block_size {
            BlockSize::Fixed(n) => write!(f, "({}, {n})", self.kind),
            BlockSize::Variable => write!(f, "({}, variable)", self.kind),
        }
    }
}
