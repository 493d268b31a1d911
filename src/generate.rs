//! Random profile generators.
//!
//! Candidates are `0..candidates` and voters `0..voters`, so candidate ids equal candidate
//! indices in the generated profiles.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{Error, Result};
use crate::prefix::PreferenceProfile;
use crate::profile::Profile;

/// Impartial approval culture: each voter approves each candidate independently with
/// probability `p`. Every candidate is declared, approved or not.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] if `p` is not in `[0, 1]`, or for the errors of
/// [`Profile::with_candidates`] (no voters, no candidates, more than 64 candidates).
pub fn random_approval_profile<R: Rng>(
    rng: &mut R,
    voters: usize,
    candidates: usize,
    p: f64,
) -> Result<Profile<usize, usize>> {
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::invalid(format!(
            "approval probability {p} is outside [0, 1]"
        )));
    }
    let ballots: Vec<(usize, Vec<usize>)> = (0..voters)
        .map(|v| {
            let approved = (0..candidates).filter(|_| rng.random_bool(p)).collect();
            (v, approved)
        })
        .collect();
    Profile::with_candidates(0..candidates, ballots)
}

/// Every voter ranks all candidates in a uniformly random order.
///
/// # Errors
/// The errors of [`PreferenceProfile::new`].
pub fn random_preferences<R: Rng>(
    rng: &mut R,
    voters: usize,
    candidates: usize,
) -> Result<PreferenceProfile<usize, usize>> {
    let ballots: Vec<(usize, Vec<usize>)> = (0..voters)
        .map(|v| {
            let mut ranking: Vec<usize> = (0..candidates).collect();
            ranking.shuffle(rng);
            (v, ranking)
        })
        .collect();
    PreferenceProfile::new(ballots)
}
