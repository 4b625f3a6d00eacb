mod util;
use proptest::prelude::*;
use sieve_solver::parallel::cross_points::extract_cross_point_layouts;
use sieve_solver::parallel::{Communicator, IndexLayout, LayoutPair, LayoutRole, StandardDomainDecompositionInfo};
use util::run_ranks;

/// Rank 0 masters `n` indices; index `k` is shared with rank 1 if
/// `shared[k].0`, with rank 2 if `shared[k].1`. Every rank is its own
/// subdomain and uses the same local numbering.
fn layouts(rank: usize, shared: &[(bool, bool)]) -> (IndexLayout, IndexLayout) {
    let with = |p: usize| -> Vec<usize> {
        (0..shared.len())
            .filter(|&k| if p == 1 { shared[k].0 } else { shared[k].1 })
            .collect()
    };
    if rank == 0 {
        let master = IndexLayout::from_interfaces(LayoutRole::Master, [(1, with(1)), (2, with(2))]);
        (master, IndexLayout::slave())
    } else {
        let slave = IndexLayout::from_interfaces(LayoutRole::Slave, [(0, with(rank))]);
        (IndexLayout::master(), slave)
    }
}

fn extract(shared: &[(bool, bool)]) -> Vec<(IndexLayout, IndexLayout, LayoutPair)> {
    let dd = StandardDomainDecompositionInfo::new(3, 1).unwrap();
    run_ranks(3, |c| {
        let (mut master, mut slave) = layouts(c.rank(), shared);
        let pi = extract_cross_point_layouts(shared.len(), &mut master, &mut slave, &dd, c).unwrap();
        (master, slave, pi)
    })
}

#[test]
fn corner_shared_by_three_subdomains_is_a_cross_point() {
    // index 0: ranks 0,1,2; index 1: ranks 0,1; index 2: ranks 0,2
    let res = extract(&[(true, true), (true, false), (false, true)]);

    let (m0, _, pi0) = &res[0];
    assert_eq!(m0.interface(1), &[1]);
    assert_eq!(m0.interface(2), &[2]);
    assert_eq!(pi0.master.interface(1), &[0]);
    assert_eq!(pi0.master.interface(2), &[0]);
    assert!(pi0.slave.is_empty());

    for (rank, delta) in [(1, 1usize), (2, 2)] {
        let (_, s, pi) = &res[rank];
        assert_eq!(s.interface(0), &[delta]);
        assert_eq!(pi.slave.interface(0), &[0]);
        assert!(pi.master.is_empty());
    }
}

#[test]
fn two_subdomains_have_no_cross_points() {
    let res = extract(&[(true, false), (true, false)]);
    for (_, _, pi) in &res {
        assert!(pi.is_empty());
    }
    assert_eq!(res[0].0.interface(1), &[0, 1]);
    assert_eq!(res[1].1.interface(0), &[0, 1]);
    // rank 2 shares nothing
    assert!(res[2].1.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn delta_and_pi_partition_the_original_interfaces(
        shared in proptest::collection::vec((any::<bool>(), any::<bool>()), 1..12)
    ) {
        let res = extract(&shared);
        for (rank, (master, slave, pi)) in res.iter().enumerate() {
            let (orig_m, orig_s) = layouts(rank, &shared);
            for (orig, delta, cross) in [(&orig_m, master, &pi.master), (&orig_s, slave, &pi.slave)] {
                for (p, idx) in orig.iter() {
                    let d = delta.interface(p);
                    let x = cross.interface(p);
                    prop_assert_eq!(d.len() + x.len(), idx.len());
                    for &i in idx {
                        let in_d = d.contains(&i);
                        let in_x = x.contains(&i);
                        prop_assert!(in_d != in_x, "index {} of rank {} must be in exactly one layout", i, rank);
                        // cross points are exactly the indices of all three ranks
                        prop_assert_eq!(in_x, shared[i].0 && shared[i].1);
                    }
                    // relative order survives the split
                    prop_assert!(d.windows(2).all(|w| w[0] < w[1]));
                    prop_assert!(x.windows(2).all(|w| w[0] < w[1]));
                }
            }
        }
        // master and slave sides stay paired position by position
        for p in 1..3 {
            prop_assert_eq!(res[0].2.master.interface(p), res[p].2.slave.interface(0));
            prop_assert_eq!(res[0].0.interface(p), res[p].1.interface(0));
        }
    }
}
