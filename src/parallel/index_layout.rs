//! Master/slave index layouts.
//!
//! An [`IndexLayout`] maps each neighbouring rank to an ordered interface of
//! local indices. A master layout lists entries owned here; a slave layout
//! lists local copies of entries owned by the neighbour. Across two ranks
//! `p` and `q`, position `k` of `p.master[q]` and `q.slave[p]` refer to the
//! same logical entry; nothing but this position correspondence is
//! exchanged on the wire.

use crate::debug_invariants::DebugInvariants;
use crate::solver_error::SolverError;
use std::collections::{BTreeMap, BTreeSet};
use itertools::Itertools;

/// Which side of an interface pair a layout describes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutRole {
    #[default]
    Master,
    Slave,
}

/// Ordered local indices shared with one neighbouring rank.
pub type Interface = Vec<usize>;

/// Interfaces keyed by neighbouring rank, iterated in ascending rank order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexLayout {
    role: LayoutRole,
    interfaces: BTreeMap<usize, Interface>,
}

impl IndexLayout {
    pub fn new(role: LayoutRole) -> Self {
        Self {
            role,
            interfaces: BTreeMap::new(),
        }
    }

    pub fn master() -> Self {
        Self::new(LayoutRole::Master)
    }

    pub fn slave() -> Self {
        Self::new(LayoutRole::Slave)
    }

    /// Build a layout from `(rank, indices)` pairs.
    pub fn from_interfaces<I>(role: LayoutRole, interfaces: I) -> Self
    where
        I: IntoIterator<Item = (usize, Vec<usize>)>,
    {
        let mut layout = Self::new(role);
        for (proc, idx) in interfaces {
            layout.interface_mut(proc).extend(idx);
        }
        layout
    }

    #[inline]
    pub fn role(&self) -> LayoutRole {
        self.role
    }

    /// Interface shared with `proc`; empty if there is none.
    pub fn interface(&self, proc: usize) -> &[usize] {
        self.interfaces.get(&proc).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Interface shared with `proc`, created on first access.
    pub fn interface_mut(&mut self, proc: usize) -> &mut Interface {
        self.interfaces.entry(proc).or_default()
    }

    pub fn add_element(&mut self, proc: usize, index: usize) {
        self.interface_mut(proc).push(index);
    }

    pub fn has_interface(&self, proc: usize) -> bool {
        self.interfaces.get(&proc).is_some_and(|i| !i.is_empty())
    }

    /// `(rank, interface)` pairs in ascending rank order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.interfaces.iter().map(|(&p, i)| (p, i.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Interface)> + '_ {
        self.interfaces.iter_mut().map(|(&p, i)| (p, i))
    }

    /// Neighbouring ranks with a non-empty interface.
    pub fn procs(&self) -> impl Iterator<Item = usize> + '_ {
        self.interfaces
            .iter()
            .filter(|(_, i)| !i.is_empty())
            .map(|(&p, _)| p)
    }

    pub fn num_interfaces(&self) -> usize {
        self.procs().count()
    }

    pub fn num_interface_elements(&self) -> usize {
        self.interfaces.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.interfaces.clear();
    }

    pub fn remove_empty_interfaces(&mut self) {
        self.interfaces.retain(|_, i| !i.is_empty());
    }

    pub fn contains(&self, index: usize) -> bool {
        self.interfaces.values().any(|i| i.contains(&index))
    }

    /// All indices in any interface, sorted and deduplicated.
    pub fn collect_elements(&self) -> BTreeSet<usize> {
        self.interfaces.values().flatten().copied().collect()
    }

    /// Relabel every index through `new_index[old]`.
    pub fn permute(&mut self, new_index: &[usize]) {
        for idx in self.interfaces.values_mut().flatten() {
            *idx = new_index[*idx];
        }
    }

    /// Write one line per interface to the `log` facade.
    pub fn log(&self, name: &str) {
        log::debug!(
            "{name} ({:?}): {} interfaces, {} elements",
            self.role,
            self.num_interfaces(),
            self.num_interface_elements()
        );
        for (p, i) in self.iter() {
            log::debug!("  to proc {p}: {}", i.iter().join(" "));
        }
    }
}

impl DebugInvariants for IndexLayout {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "IndexLayout");
    }

    /// An index appears at most once per interface.
    fn validate_invariants(&self) -> Result<(), SolverError> {
        for (p, i) in self.iter() {
            let mut seen = BTreeSet::new();
            if let Some(dup) = i.iter().find(|&&idx| !seen.insert(idx)) {
                return Err(SolverError::InvalidConfiguration(format!(
                    "index {dup} appears twice in interface to proc {p}"
                )));
            }
        }
        Ok(())
    }
}

/// Master and slave layout of one layout level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutPair {
    pub master: IndexLayout,
    pub slave: IndexLayout,
}

impl Default for LayoutPair {
    fn default() -> Self {
        Self {
            master: IndexLayout::master(),
            slave: IndexLayout::slave(),
        }
    }
}

impl LayoutPair {
    pub fn new(master: IndexLayout, slave: IndexLayout) -> Self {
        Self { master, slave }
    }

    pub fn is_empty(&self) -> bool {
        self.master.is_empty() && self.slave.is_empty()
    }
}

/// Layout levels attached to a distributed vector or matrix.
///
/// Level 0 holds the plain process interfaces. FETI uses level 1 for the
/// subdomain boundary (Delta); its cross points (Pi) live in a separate
/// [`LayoutPair`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlgebraLayouts {
    levels: Vec<LayoutPair>,
}

static EMPTY_PAIR: once_cell::sync::Lazy<LayoutPair> = once_cell::sync::Lazy::new(LayoutPair::default);

impl AlgebraLayouts {
    /// No interfaces at all.
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn new(master: IndexLayout, slave: IndexLayout) -> Self {
        Self {
            levels: vec![LayoutPair::new(master, slave)],
        }
    }

    pub fn from_levels(levels: Vec<LayoutPair>) -> Self {
        Self { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn push_level(&mut self, pair: LayoutPair) -> usize {
        self.levels.push(pair);
        self.levels.len() - 1
    }

    /// Layout pair of `level`; an empty pair if the level does not exist.
    pub fn level(&self, level: usize) -> &LayoutPair {
        self.levels.get(level).unwrap_or(&EMPTY_PAIR)
    }

    pub fn level_mut(&mut self, level: usize) -> Option<&mut LayoutPair> {
        self.levels.get_mut(level)
    }

    pub fn master(&self, level: usize) -> &IndexLayout {
        &self.level(level).master
    }

    pub fn slave(&self, level: usize) -> &IndexLayout {
        &self.level(level).slave
    }

    /// True if any level carries an interface.
    pub fn has_interfaces(&self) -> bool {
        self.levels.iter().any(|l| !l.is_empty())
    }

    pub fn permute(&mut self, new_index: &[usize]) {
        for l in &mut self.levels {
            l.master.permute(new_index);
            l.slave.permute(new_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interfaces_are_ordered_by_rank() {
        let l = IndexLayout::from_interfaces(LayoutRole::Master, [(3, vec![5, 1]), (1, vec![2])]);
        let procs: Vec<_> = l.procs().collect();
        assert_eq!(procs, vec![1, 3]);
        assert_eq!(l.interface(3), &[5, 1]);
        assert_eq!(l.interface(7), &[] as &[usize]);
        assert_eq!(l.num_interface_elements(), 3);
    }

    #[test]
    fn duplicate_index_violates_invariant() {
        let l = IndexLayout::from_interfaces(LayoutRole::Slave, [(0, vec![4, 4])]);
        assert!(l.validate_invariants().is_err());
    }

    #[test]
    fn missing_level_is_empty() {
        let layouts = AlgebraLayouts::sequential();
        assert!(layouts.master(2).is_empty());
        assert!(!layouts.has_interfaces());
    }
}
