//! Which discrete functions are defined on which subsets.

use crate::solver_error::SolverError;
use serde::{Deserialize, Serialize};

/// Table `defined[fct][subset]` of active functions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionPattern {
    num_subsets: usize,
    defined: Vec<Vec<bool>>,
}

impl FunctionPattern {
    pub fn new(num_subsets: usize) -> Self {
        Self {
            num_subsets,
            defined: Vec::new(),
        }
    }

    /// `num_functions` functions, each defined everywhere.
    pub fn everywhere(num_functions: usize, num_subsets: usize) -> Self {
        Self {
            num_subsets,
            defined: vec![vec![true; num_subsets]; num_functions],
        }
    }

    /// Add a function defined on `subsets`; returns its id.
    pub fn add_function(&mut self, subsets: &[usize]) -> Result<usize, SolverError> {
        let mut row = vec![false; self.num_subsets];
        for &si in subsets {
            *row.get_mut(si).ok_or_else(|| {
                SolverError::InvalidConfiguration(format!(
                    "subset {si} out of range ({} subsets)",
                    self.num_subsets
                ))
            })? = true;
        }
        self.defined.push(row);
        Ok(self.defined.len() - 1)
    }

    pub fn num_functions(&self) -> usize {
        self.defined.len()
    }

    pub fn num_subsets(&self) -> usize {
        self.num_subsets
    }

    pub fn is_def_in_subset(&self, fct: usize, si: usize) -> bool {
        self.defined
            .get(fct)
            .and_then(|row| row.get(si))
            .copied()
            .unwrap_or(false)
    }

    /// Number of functions defined in `si`.
    pub fn num_fct(&self, si: usize) -> usize {
        (0..self.num_functions())
            .filter(|&f| self.is_def_in_subset(f, si))
            .count()
    }

    /// Position of `fct` among the functions defined in `si`.
    pub fn offset(&self, si: usize, fct: usize) -> Option<usize> {
        if !self.is_def_in_subset(fct, si) {
            return None;
        }
        Some((0..fct).filter(|&f| self.is_def_in_subset(f, si)).count())
    }

    /// Common function count of all subsets, or `None` if they differ.
    pub fn uniform_num_fct(&self) -> Option<usize> {
        let mut counts = (0..self.num_subsets).map(|si| self.num_fct(si));
        let first = counts.next().unwrap_or(0);
        counts.all(|c| c == first).then_some(first)
    }
}
