//! Committee search: exhaustive enumeration filtered by an axiom, and LS-PAV local search.

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::axioms::{Axiom, AxiomChecker};
use crate::budget::{Budget, Meter};
use crate::error::{Error, Result};
use crate::profile::{Bits, Committee, Profile, low_bits};
use crate::score::{pav_score, pav_swap_delta};
use crate::subsets::Combinations;

/// Committees handed to the worker pool per batch by [`find_all_satisfying`].
const PARALLEL_BATCH: usize = 4096;

/// Gains at or below this are treated as ties, so local search cannot cycle on
/// floating-point noise.
const MIN_GAIN: f64 = 1e-9;

// ============================================================================
// Enumeration
// ============================================================================

/// All committees of `seats` members in lexicographic order.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] for zero seats or more seats than candidates.
pub fn committees<V, C>(
    profile: &Profile<V, C>,
    seats: usize,
) -> Result<impl Iterator<Item = Committee> + use<V, C>> {
    profile.check_seats(seats)?;
    Ok(Combinations::of_range(profile.candidate_count(), seats).map(Committee::from_mask))
}

/// Lazy sequence of the committees satisfying an axiom, see [`enumerate_satisfying`].
///
/// Yields `Err` once if the budget runs out, then ends.
#[derive(Debug)]
pub struct SatisfyingCommittees {
    checker: AxiomChecker,
    combinations: Combinations,
    meter: Meter,
    failed: bool,
}

impl SatisfyingCommittees {
    /// Steps charged so far, including the checker's precomputation.
    pub fn steps(&self) -> u64 {
        self.meter.steps()
    }

    /// The prepared checker.
    pub fn checker(&self) -> &AxiomChecker {
        &self.checker
    }
}

impl Iterator for SatisfyingCommittees {
    type Item = Result<Committee>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        for mask in self.combinations.by_ref() {
            if let Err(e) = self.meter.tick() {
                self.failed = true;
                return Some(Err(e));
            }
            let committee = Committee::from_mask(mask);
            if self.checker.check(committee) {
                return Some(Ok(committee));
            }
        }
        None
    }
}

/// Lazily enumerates the `seats`-member committees satisfying `axiom`, lexicographically.
///
/// The cohesive groups are computed once up front; each committee then costs one step of
/// `budget`. Calling this again restarts the enumeration.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] for bad sizes, and [`Error::ResourceExhausted`] if
/// the budget runs out while preparing the checker.
pub fn enumerate_satisfying<V: Sync, C: Sync>(
    profile: &Profile<V, C>,
    seats: usize,
    axiom: Axiom,
    budget: &Budget,
) -> Result<SatisfyingCommittees> {
    let meter = budget.meter();
    let checker = AxiomChecker::prepare_metered(profile, seats, axiom, &meter)?;
    Ok(SatisfyingCommittees {
        checker,
        combinations: Combinations::of_range(profile.candidate_count(), seats),
        meter,
        failed: false,
    })
}

/// Every `seats`-member committee satisfying `axiom`, checked on the rayon pool and
/// returned in lexicographic order.
///
/// # Errors
/// Same as [`enumerate_satisfying`], and [`Error::ResourceExhausted`] if the budget runs
/// out during the scan.
pub fn find_all_satisfying<V: Sync, C: Sync>(
    profile: &Profile<V, C>,
    seats: usize,
    axiom: Axiom,
    budget: &Budget,
) -> Result<Vec<Committee>> {
    let meter = budget.meter();
    let checker = AxiomChecker::prepare_metered(profile, seats, axiom, &meter)?;
    let mut combinations = Combinations::of_range(profile.candidate_count(), seats);
    let total = combinations.total();

    let mut found = Vec::new();
    loop {
        let batch: Vec<u64> = combinations.by_ref().take(PARALLEL_BATCH).collect();
        if batch.is_empty() {
            break;
        }
        let verdicts = batch
            .par_iter()
            .map(|&mask| {
                meter.tick()?;
                let committee = Committee::from_mask(mask);
                Ok(checker.check(committee).then_some(committee))
            })
            .collect::<Result<Vec<Option<Committee>>>>()?;
        found.extend(verdicts.into_iter().flatten());
    }

    info!(
        "{axiom}: {} of {total} committees of size {seats} satisfy ({} steps)",
        found.len(),
        meter.steps()
    );
    Ok(found)
}

// ============================================================================
// Local search (LS-PAV)
// ============================================================================

/// Local search parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalSearchConfig {
    /// Minimum PAV gain for a swap to be taken.
    pub improvement_threshold: f64,
    /// Maximum number of swaps before giving up on convergence.
    pub max_iterations: usize,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            improvement_threshold: 0.0,
            max_iterations: 10_000,
        }
    }
}

/// Result of a local search run.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalSearchOutcome {
    /// Final committee.
    pub committee: Committee,
    /// Its PAV score.
    pub score: f64,
    /// Swaps applied.
    pub swaps: usize,
    /// `false` if the iteration bound stopped the search while a swap was still available.
    pub converged: bool,
}

/// First single swap `(out, incoming, gain)` gaining at least `threshold`, scanning
/// outgoing members and then incoming non-members by increasing candidate index.
pub fn improving_swap<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
    threshold: f64,
) -> Option<(usize, usize, f64)> {
    let outside = profile.universe() & !committee.mask();
    committee.members().find_map(|out| {
        Bits::of(outside).find_map(|incoming| {
            let gain = pav_swap_delta(profile, committee, out, incoming);
            (gain >= threshold && gain > MIN_GAIN).then_some((out, incoming, gain))
        })
    })
}

/// Hill-climbs from `seed` by first-improvement swaps until none gains at least the
/// threshold, or `max_iterations` swaps were made.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] for an invalid seed or a non-finite threshold.
pub fn local_search<V, C>(
    profile: &Profile<V, C>,
    seed: Committee,
    config: &LocalSearchConfig,
) -> Result<LocalSearchOutcome> {
    profile.check_committee(seed)?;
    if !config.improvement_threshold.is_finite() {
        return Err(Error::invalid("improvement threshold must be finite"));
    }

    let mut committee = seed;
    let mut swaps = 0;
    let converged = loop {
        let Some((out, incoming, gain)) =
            improving_swap(profile, committee, config.improvement_threshold)
        else {
            break true;
        };
        if swaps == config.max_iterations {
            warn!("local search stopped after {swaps} swaps with improving swaps left");
            break false;
        }
        committee = committee.swap(out, incoming);
        swaps += 1;
        debug!("swap {swaps}: {out} -> {incoming} (+{gain:.4})");
    };

    let score = pav_score(profile, committee);
    info!("local search: {swaps} swaps, PAV score {score:.4}");
    Ok(LocalSearchOutcome {
        committee,
        score,
        swaps,
        converged,
    })
}

/// LS-PAV: local search seeded with the first `seats` candidates.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] for bad sizes or a non-finite threshold.
pub fn ls_pav<V, C>(
    profile: &Profile<V, C>,
    seats: usize,
    config: &LocalSearchConfig,
) -> Result<LocalSearchOutcome> {
    profile.check_seats(seats)?;
    local_search(profile, Committee::from_mask(low_bits(seats)), config)
}

// ============================================================================
// Tests
// ============================================================================
