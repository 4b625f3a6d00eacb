//! Solver configuration values.
//!
//! Configurations are plain values handed to constructors; nothing is read
//! from global state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::solver_error::SolverError;

/// How often a multigrid level recurses into the next coarser one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CycleType {
    /// One coarse visit.
    #[default]
    V,
    /// Two coarse visits.
    W,
    /// An F-cycle followed by a V-cycle on the coarse level.
    F,
}

impl FromStr for CycleType {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "V" | "1" => Ok(CycleType::V),
            "W" | "2" => Ok(CycleType::W),
            "F" => Ok(CycleType::F),
            other => Err(SolverError::InvalidConfiguration(format!(
                "unknown cycle type '{other}' (expected V, W or F)"
            ))),
        }
    }
}

impl fmt::Display for CycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleType::V => "V",
            CycleType::W => "W",
            CycleType::F => "F",
        };
        f.write_str(s)
    }
}

/// Geometric multigrid parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultigridConfig {
    pub base_level: usize,
    pub cycle: CycleType,
    pub num_presmooth: usize,
    pub num_postsmooth: usize,
}

impl Default for MultigridConfig {
    fn default() -> Self {
        Self {
            base_level: 0,
            cycle: CycleType::V,
            num_presmooth: 2,
            num_postsmooth: 2,
        }
    }
}

/// Stopping criteria and output of a [`StandardConvCheck`](super::StandardConvCheck).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvCheckConfig {
    pub max_steps: usize,
    pub min_defect: f64,
    pub rel_reduction: f64,
    pub verbose: bool,
}

impl Default for ConvCheckConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            min_defect: 1e-12,
            rel_reduction: 1e-10,
            verbose: false,
        }
    }
}

impl ConvCheckConfig {
    pub fn new(max_steps: usize, min_defect: f64, rel_reduction: f64) -> Self {
        Self {
            max_steps,
            min_defect,
            rel_reduction,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
