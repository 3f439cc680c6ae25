//! Direct (all-pairs) force evaluation.
//!
//! The `O(N²)` reference the Barnes–Hut tree approximates. Uses the same
//! softened force law as the tree ([`BodyStore::pair_force`]), so with an
//! opening angle of zero both agree up to summation order.

use crate::simulation::bodies::{BodyStore, NVec2};

/// Exact force on every body in `worklist` from every other body in it.
///
/// `out[k]` receives the force on `worklist[k]`.
pub fn direct_forces(bodies: &BodyStore, worklist: &[usize]) -> Vec<NVec2> {
    let mut out = vec![NVec2::zeros(); worklist.len()];

    // Loop over each unordered pair (i, j) with i < j. The force law is
    // symmetric in the masses, so body j feels the negated pull.
    for (i, &bi) in worklist.iter().enumerate() {
        for (j, &bj) in worklist.iter().enumerate().skip(i + 1) {
            let f = bodies.pair_force(bi, bj);
            out[i] += f;
            out[j] -= f;
        }
    }
    out
}

/// Exact force on `target` from every other body in `worklist`.
pub fn direct_force(bodies: &BodyStore, target: usize, worklist: &[usize]) -> NVec2 {
    worklist
        .iter()
        .filter(|&&source| source != target)
        .fold(NVec2::zeros(), |acc, &source| acc + bodies.pair_force(target, source))
}
