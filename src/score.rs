//! Proportional Approval Voting score.
//!
//! A voter with `r` approved candidates on the committee contributes the harmonic number
//! `H(r) = 1 + 1/2 + ... + 1/r`; the PAV score is the sum over voters.

use crate::profile::{Committee, Profile};

/// `H(r)`, with `H(0) = 0`.
#[inline]
pub fn harmonic(r: usize) -> f64 {
    (1..=r).map(|i| 1.0 / i as f64).sum()
}

/// Approved committee members per voter, in voter index order.
pub fn representation<V, C>(profile: &Profile<V, C>, committee: Committee) -> Vec<usize> {
    profile
        .approvals()
        .iter()
        .map(|&a| committee.representation(a))
        .collect()
}

/// PAV score of `committee`.
pub fn pav_score<V, C>(profile: &Profile<V, C>, committee: Committee) -> f64 {
    profile
        .approvals()
        .iter()
        .map(|&a| harmonic(committee.representation(a)))
        .sum()
}

/// Exact score change of replacing member `out` by `incoming`.
///
/// Only voters approving exactly one of the two candidates change: a voter gaining a
/// representative at count `r` adds `1/(r+1)`, one losing it subtracts `1/r`.
pub fn pav_swap_delta<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
    out: usize,
    incoming: usize,
) -> f64 {
    let out_bit = 1u64 << out;
    let in_bit = 1u64 << incoming;
    profile
        .approvals()
        .iter()
        .map(|&a| match (a & out_bit != 0, a & in_bit != 0) {
            (true, false) => -1.0 / committee.representation(a) as f64,
            (false, true) => 1.0 / (committee.representation(a) + 1) as f64,
            _ => 0.0,
        })
        .sum()
}

/// Whether moving from committee `from` to `to` gains at least `epsilon` PAV score.
pub fn is_profitable_deviation<V, C>(
    profile: &Profile<V, C>,
    from: Committee,
    to: Committee,
    epsilon: f64,
) -> bool {
    pav_score(profile, to) - pav_score(profile, from) >= epsilon
}
