//! Ordinal preferences and the Prefix-JR ranking search.
//!
//! Each voter ranks (some of) the candidates. The *top-k approval profile* lets every voter
//! approve the first `k` entries of their ranking. A full ranking of the candidates is
//! Prefix-JR when, for every `k`, its first `k` candidates satisfy JR as a `k`-member
//! committee on the top-k profile.
//!
//! [`prefix_jr_rankings`] builds rankings one position at a time. At depth `k` the next
//! candidate must be approved (in the top-k profile) by a member of some group `S(c)` with
//! `|S(c)| >= n / k`; when no such group exists, any candidate in somebody's top `k` may
//! follow.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::info;

use crate::budget::{Budget, Meter};
use crate::cohesion::Quota;
use crate::error::{Error, Result};
use crate::profile::{Bits, MAX_CANDIDATES, Profile, Record, bit, low_bits, parse_records};

// ============================================================================
// PreferenceProfile
// ============================================================================

/// Voter → ranking mapping. Read-only once built.
#[derive(Clone, Debug)]
pub struct PreferenceProfile<V, C> {
    voters: Vec<V>,
    candidates: Vec<C>,
    /// Candidate indices, most preferred first.
    rankings: Vec<Vec<usize>>,
}

impl<V: Ord + Clone, C: Ord + Clone> PreferenceProfile<V, C> {
    /// Builds a profile from `(voter, ranking)` pairs; the candidate universe is the union of
    /// all rankings.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for no voters, no candidates, more than
    /// [`MAX_CANDIDATES`] candidates, a repeated voter, or a ranking that lists a candidate
    /// twice.
    pub fn new<I, R>(ballots: I) -> Result<Self>
    where
        I: IntoIterator<Item = (V, R)>,
        R: IntoIterator<Item = C>,
    {
        let mut ballots: Vec<(V, Vec<C>)> = ballots
            .into_iter()
            .map(|(v, r)| (v, r.into_iter().collect()))
            .collect();
        if ballots.is_empty() {
            return Err(Error::invalid("profile has no voters"));
        }
        let universe: BTreeSet<C> = ballots.iter().flat_map(|(_, r)| r.iter().cloned()).collect();
        if universe.is_empty() {
            return Err(Error::invalid("profile has no candidates"));
        }
        if universe.len() > MAX_CANDIDATES {
            return Err(Error::invalid(format!(
                "profile has {} candidates; at most {MAX_CANDIDATES} are supported",
                universe.len()
            )));
        }
        ballots.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(pos) = ballots.windows(2).position(|w| w[0].0 == w[1].0) {
            return Err(Error::invalid(format!(
                "voter at position {} appears more than once",
                pos + 1
            )));
        }

        let candidates: Vec<C> = universe.into_iter().collect();
        let mut voters = Vec::with_capacity(ballots.len());
        let mut rankings = Vec::with_capacity(ballots.len());
        for (pos, (voter, ranked)) in ballots.into_iter().enumerate() {
            let mut seen = 0u64;
            let mut ranking = Vec::with_capacity(ranked.len());
            for c in &ranked {
                let Ok(idx) = candidates.binary_search(c) else {
                    continue;
                };
                if seen & bit(idx) != 0 {
                    return Err(Error::invalid(format!(
                        "voter at position {} ranks a candidate twice",
                        pos + 1
                    )));
                }
                seen |= bit(idx);
                ranking.push(idx);
            }
            voters.push(voter);
            rankings.push(ranking);
        }
        Ok(Self {
            voters,
            candidates,
            rankings,
        })
    }

    /// Index of candidate `c`.
    pub fn candidate_index(&self, c: &C) -> Option<usize> {
        self.candidates.binary_search(c).ok()
    }

    /// The approval profile in which every voter approves their first `k` candidates.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] if `k == 0`.
    pub fn top_k_profile(&self, k: usize) -> Result<Profile<V, C>> {
        if k == 0 {
            return Err(Error::invalid("prefix length must be positive"));
        }
        Profile::with_candidates(
            self.candidates.iter().cloned(),
            self.voters.iter().cloned().zip(
                self.rankings
                    .iter()
                    .map(|r| r.iter().take(k).map(|&c| self.candidates[c].clone()).collect::<Vec<_>>()),
            ),
        )
    }

    /// Converts a ranking given by ids into candidate indices, checking that it is a
    /// permutation of the whole universe.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for unknown, repeated or missing candidates.
    pub fn ranking_indices(&self, ranking: &[C]) -> Result<Vec<usize>> {
        let mut seen = 0u64;
        let mut out = Vec::with_capacity(ranking.len());
        for (pos, c) in ranking.iter().enumerate() {
            let idx = self.candidate_index(c).ok_or_else(|| {
                Error::invalid(format!("ranking position {} is not a candidate", pos + 1))
            })?;
            if seen & bit(idx) != 0 {
                return Err(Error::invalid(format!(
                    "ranking position {} repeats a candidate",
                    pos + 1
                )));
            }
            seen |= bit(idx);
            out.push(idx);
        }
        if seen != low_bits(self.candidates.len()) {
            return Err(Error::invalid(format!(
                "ranking has {} of the {} candidates",
                out.len(),
                self.candidates.len()
            )));
        }
        Ok(out)
    }
}

impl<V, C> PreferenceProfile<V, C> {
    /// Number of voters.
    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    /// Number of candidates.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Voter ids in index order.
    pub fn voters(&self) -> &[V] {
        &self.voters
    }

    /// Candidate ids in index order.
    pub fn candidates(&self) -> &[C] {
        &self.candidates
    }

    /// Id of candidate `c`.
    pub fn candidate(&self, c: usize) -> &C {
        &self.candidates[c]
    }

    /// Ranking of voter `i`, as candidate indices.
    pub fn ranking(&self, i: usize) -> &[usize] {
        &self.rankings[i]
    }

    /// Per-voter approval bitsets of the top-k profile.
    pub fn top_k_approvals(&self, k: usize) -> Vec<u64> {
        self.rankings
            .iter()
            .map(|r| r.iter().take(k).fold(0, |acc, &c| acc | bit(c)))
            .collect()
    }
}

/// Parses ordinal preferences, one `voter: c1 > c2 > c3` line per voter.
///
/// Commas are accepted as separators too; `#` starts a comment.
///
/// # Errors
/// Returns [`Error::Parse`] for malformed lines or any directive, and the errors of
/// [`PreferenceProfile::new`].
pub fn parse_preferences(text: &str) -> Result<PreferenceProfile<String, String>> {
    let mut ballots = Vec::new();
    for record in parse_records(text, &['>', ',']) {
        match record? {
            Record::Directive { line, name, .. } => {
                return Err(Error::Parse {
                    line,
                    message: format!("directive @{name} is not allowed in preferences"),
                });
            }
            Record::Ballot { voter, items } => {
                let ranked: Vec<String> = items.into_iter().map(str::to_string).collect();
                ballots.push((voter.to_string(), ranked));
            }
        }
    }
    PreferenceProfile::new(ballots)
}

/// Reads and parses a preference file.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be read, otherwise the errors of
/// [`parse_preferences`].
pub fn load_preferences(path: impl AsRef<Path>) -> Result<PreferenceProfile<String, String>> {
    let text = fs::read_to_string(path)?;
    parse_preferences(&text)
}

// ============================================================================
// Prefix-JR
// ============================================================================

/// Benefit sets `approvals(S(c))` of the candidates `c` whose supporters deserve a seat of a
/// `k`-member committee.
fn deserving_benefits(approvals: &[u64], m: usize, k: usize) -> Vec<u64> {
    let Ok(quota) = Quota::new(approvals.len(), k) else {
        return Vec::new();
    };
    (0..m)
        .filter_map(|c| {
            let supporters = approvals.iter().filter(|&&a| a & bit(c) != 0);
            let count = supporters.clone().count();
            (count > 0 && quota.deserves(count, 1))
                .then(|| supporters.fold(0, |acc, &a| acc | a))
        })
        .collect()
}

/// Candidates allowed at ranking position `k` (1-based).
fn eligible_at(approvals: &[u64], m: usize, k: usize) -> u64 {
    let benefits = deserving_benefits(approvals, m, k);
    if benefits.is_empty() {
        approvals.iter().fold(0, |acc, &a| acc | a)
    } else {
        benefits.into_iter().fold(0, |acc, b| acc | b)
    }
}

/// Precomputed per-depth eligibility for one preference profile.
#[derive(Clone, Debug)]
pub struct PrefixSearch {
    candidates: usize,
    /// `eligible[k - 1]`: candidates allowed at position `k`.
    eligible: Vec<u64>,
}

impl PrefixSearch {
    /// Precomputes the eligible candidates at every depth.
    pub fn new<V, C>(prefs: &PreferenceProfile<V, C>) -> Self {
        let m = prefs.candidate_count();
        let eligible = (1..=m)
            .map(|k| eligible_at(&prefs.top_k_approvals(k), m, k))
            .collect();
        Self {
            candidates: m,
            eligible,
        }
    }

    /// Candidates allowed at position `depth` (1-based).
    pub fn eligible(&self, depth: usize) -> u64 {
        self.eligible[depth - 1]
    }

    /// All rankings (as candidate indices) reachable under the eligibility pruning, in
    /// lexicographic order. Each visited node costs one step of `meter`.
    ///
    /// # Errors
    /// Returns [`Error::ResourceExhausted`] if the meter runs out.
    pub fn rankings(&self, meter: &Meter) -> Result<Vec<Vec<usize>>> {
        let full = low_bits(self.candidates);
        let mut found = Vec::new();
        let mut stack: Vec<(Vec<usize>, u64)> = vec![(Vec::new(), 0)];
        while let Some((partial, used)) = stack.pop() {
            meter.tick()?;
            if used == full {
                found.push(partial);
                continue;
            }
            let options: Vec<usize> = Bits::of(self.eligible(partial.len() + 1) & !used).collect();
            // Reverse push so the smallest candidate is explored first.
            for &c in options.iter().rev() {
                let mut next = partial.clone();
                next.push(c);
                stack.push((next, used | bit(c)));
            }
        }
        Ok(found)
    }
}

/// Every ranking produced by the Prefix-JR search, in lexicographic candidate order.
///
/// # Errors
/// Returns [`Error::ResourceExhausted`] if `budget` runs out.
pub fn prefix_jr_rankings<V, C: Clone>(
    prefs: &PreferenceProfile<V, C>,
    budget: &Budget,
) -> Result<Vec<Vec<C>>> {
    let meter = budget.meter();
    let found = PrefixSearch::new(prefs).rankings(&meter)?;
    info!(
        "prefix search: {} rankings over {} candidates ({} steps)",
        found.len(),
        prefs.candidate_count(),
        meter.steps()
    );
    Ok(found
        .into_iter()
        .map(|r| r.into_iter().map(|c| prefs.candidate(c).clone()).collect())
        .collect())
}

/// Whether every prefix of `ranking` satisfies JR on the matching top-k profile.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] if `ranking` is not a permutation of the
/// candidates.
pub fn is_prefix_jr<V: Ord + Clone, C: Ord + Clone>(
    prefs: &PreferenceProfile<V, C>,
    ranking: &[C],
) -> Result<bool> {
    let order = prefs.ranking_indices(ranking)?;
    let m = prefs.candidate_count();
    let mut committee = 0u64;
    for (pos, &c) in order.iter().enumerate() {
        committee |= bit(c);
        let k = pos + 1;
        let approvals = prefs.top_k_approvals(k);
        if deserving_benefits(&approvals, m, k)
            .into_iter()
            .any(|benefit| benefit & committee == 0)
        {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axioms::satisfies_jr;
    use crate::generate::random_preferences;
    use crate::profile::Committee;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    const FIVE_VOTERS: &str = "\
u1: a1 > a2 > a3 > a4 > a5
u2: a1 > a2 > a4 > a5 > a3
u3: a1 > a2 > a5 > a3 > a4
u4: a3 > a4 > a5 > a1 > a2
u5: a3 > a4 > a5 > a2 > a1
";

    fn names(r: &[&str]) -> Vec<String> {
        r.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn parses_rankings_in_order() {
        let p = parse_preferences(FIVE_VOTERS).unwrap();
        assert_eq!(p.voter_count(), 5);
        assert_eq!(p.candidate_count(), 5);
        assert_eq!(p.ranking(3), &[2, 3, 4, 0, 1]);
        assert_eq!(p.top_k_approvals(2)[0], 0b00011);
        assert_eq!(p.top_k_approvals(2)[4], 0b01100);
    }

    #[test]
    fn rejects_bad_preferences() {
        assert!(parse_preferences("u1: a > b > a\n").is_err());
        assert!(parse_preferences("u1: a > b\nu1: b > a\n").is_err());
        assert!(matches!(
            parse_preferences("@candidates a b\nu1: a > b\n"),
            Err(Error::Parse { line: 1, .. })
        ));
        assert!(parse_preferences("# nothing\n").is_err());
    }

    #[test]
    fn eligibility_per_depth() {
        let p = parse_preferences(FIVE_VOTERS).unwrap();
        let search = PrefixSearch::new(&p);
        // depth 1: no candidate reaches 5 supporters, anything ranked first is allowed
        assert_eq!(search.eligible(1), 0b00101);
        // depth 2: only a1 and a2 reach 2.5 supporters
        assert_eq!(search.eligible(2), 0b00011);
        assert_eq!(search.eligible(3), 0b11111);
        assert_eq!(search.eligible(5), 0b11111);
    }

    #[test]
    fn five_voter_rankings() {
        let p = parse_preferences(FIVE_VOTERS).unwrap();
        let rankings = prefix_jr_rankings(&p, &Budget::unlimited()).unwrap();
        // a1 first forces a2 second (6 tails); a3 first allows a1 or a2 second (12).
        assert_eq!(rankings.len(), 18);
        assert_eq!(rankings[0], names(&["a1", "a2", "a3", "a4", "a5"]));
        assert_eq!(rankings[17], names(&["a3", "a2", "a5", "a4", "a1"]));
        let mut sorted = rankings.clone();
        sorted.sort();
        assert_eq!(sorted, rankings);
    }

    #[test]
    fn prefix_jr_check() {
        let p = parse_preferences(FIVE_VOTERS).unwrap();
        assert!(is_prefix_jr(&p, &names(&["a1", "a2", "a3", "a4", "a5"])).unwrap());
        assert!(is_prefix_jr(&p, &names(&["a3", "a1", "a4", "a5", "a2"])).unwrap());
        // {a3, a4} leaves the three a1/a2 voters without a representative.
        assert!(!is_prefix_jr(&p, &names(&["a3", "a4", "a1", "a2", "a5"])).unwrap());
        assert!(is_prefix_jr(&p, &names(&["a1", "a2"])).is_err());
        assert!(is_prefix_jr(&p, &names(&["a1", "a1", "a2", "a3", "a4"])).is_err());
    }

    #[test]
    fn prefix_check_agrees_with_profile_jr() {
        let mut rng = XorShiftRng::seed_from_u64(0x9E1F);
        for _ in 0..20 {
            let p = random_preferences(&mut rng, 6, 4).unwrap();
            for ranking in prefix_jr_rankings(&p, &Budget::unlimited()).unwrap() {
                let expect = (1..=4).all(|k| {
                    let top = p.top_k_profile(k).unwrap();
                    let committee = Committee::from_indices(ranking[..k].iter().copied());
                    satisfies_jr(&top, committee).unwrap()
                });
                assert_eq!(is_prefix_jr(&p, &ranking).unwrap(), expect);
            }
        }
    }

    #[test]
    fn budget_limits_the_search() {
        let p = parse_preferences(FIVE_VOTERS).unwrap();
        let err = prefix_jr_rankings(&p, &Budget::steps(3)).unwrap_err();
        assert!(err.is_exhausted());
    }
}
