//! Assignment of processes to subdomains.

use crate::solver_error::SolverError;

/// Maps ranks to the subdomain they contribute to.
pub trait DomainDecompositionInfo: Send + Sync {
    fn map_proc_id_to_subdomain_id(&self, proc: usize) -> usize;
    fn num_subdomains(&self) -> usize;
}

/// Consecutive blocks of `procs_per_subdomain` ranks form one subdomain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandardDomainDecompositionInfo {
    num_subdomains: usize,
    procs_per_subdomain: usize,
}

impl StandardDomainDecompositionInfo {
    pub fn new(num_subdomains: usize, procs_per_subdomain: usize) -> Result<Self, SolverError> {
        if num_subdomains == 0 || procs_per_subdomain == 0 {
            return Err(SolverError::InvalidConfiguration(format!(
                "domain decomposition needs at least one subdomain and one process per subdomain \
                 (got {num_subdomains} x {procs_per_subdomain})"
            )));
        }
        Ok(Self {
            num_subdomains,
            procs_per_subdomain,
        })
    }

    pub fn procs_per_subdomain(&self) -> usize {
        self.procs_per_subdomain
    }
}

impl DomainDecompositionInfo for StandardDomainDecompositionInfo {
    fn map_proc_id_to_subdomain_id(&self, proc: usize) -> usize {
        proc / self.procs_per_subdomain
    }

    fn num_subdomains(&self) -> usize {
        self.num_subdomains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_of_ranks() {
        let dd = StandardDomainDecompositionInfo::new(2, 3).unwrap();
        assert_eq!(dd.map_proc_id_to_subdomain_id(2), 0);
        assert_eq!(dd.map_proc_id_to_subdomain_id(3), 1);
        assert!(StandardDomainDecompositionInfo::new(2, 0).is_err());
    }
}
