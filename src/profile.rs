//! Approval profiles, committees and their text encodings.
//!
//! Voters and candidates are generic identifiers; internally both are replaced by dense
//! indices into sorted id tables, and every approval set is a `u64` bitset over candidate
//! indices (so a profile holds at most [`MAX_CANDIDATES`] candidates).

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Largest candidate universe a [`Profile`] can hold.
pub const MAX_CANDIDATES: usize = 64;

// ============================================================================
// Bitset helpers
// ============================================================================

#[inline(always)]
pub(crate) const fn bit(i: usize) -> u64 {
    1u64 << i
}

/// Returns a mask with the lowest `n` bits set.
#[inline(always)]
pub(crate) const fn low_bits(n: usize) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

/// Iterates the set bits of a mask in increasing order.
#[derive(Clone, Copy, Debug)]
pub struct Bits(u64);

impl Bits {
    /// Iterator over the set bits of `mask`.
    pub const fn of(mask: u64) -> Self {
        Bits(mask)
    }
}

impl Iterator for Bits {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let i = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(i)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Bits {}

// ============================================================================
// Committee
// ============================================================================

/// A set of candidate indices.
///
/// Committees order lexicographically by their sorted member indices, which is also the
/// order in which [`crate::search`] enumerates them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Committee {
    members: u64,
}

impl Committee {
    /// Builds a committee from a candidate bitset.
    pub const fn from_mask(members: u64) -> Self {
        Self { members }
    }

    /// Builds a committee from candidate indices (duplicates collapse).
    ///
    /// # Panics
    /// Panics if an index is `>= 64`.
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut members = 0u64;
        for i in indices {
            assert!(i < MAX_CANDIDATES, "candidate index {i} out of range");
            members |= bit(i);
        }
        Self { members }
    }

    /// The candidate bitset.
    #[inline]
    pub const fn mask(self) -> u64 {
        self.members
    }

    /// Number of members.
    #[inline]
    pub const fn size(self) -> usize {
        self.members.count_ones() as usize
    }

    /// Whether candidate `c` is a member.
    #[inline]
    pub const fn contains(self, c: usize) -> bool {
        c < 64 && (self.members >> c) & 1 == 1
    }

    /// Members in increasing index order.
    pub fn members(self) -> Bits {
        Bits::of(self.members)
    }

    /// How many of the candidates in `approvals` sit on the committee.
    #[inline]
    pub const fn representation(self, approvals: u64) -> usize {
        (approvals & self.members).count_ones() as usize
    }

    /// Replaces member `out` by non-member `incoming`.
    pub fn swap(self, out: usize, incoming: usize) -> Self {
        debug_assert!(self.contains(out), "swapped-out candidate must be a member");
        debug_assert!(!self.contains(incoming), "swapped-in candidate must not be a member");
        Self {
            members: (self.members & !bit(out)) | bit(incoming),
        }
    }
}

impl PartialOrd for Committee {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Committee {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.members().cmp(other.members())
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Voter → approval set mapping. Read-only once built.
#[derive(Clone, Debug)]
pub struct Profile<V, C> {
    voters: Vec<V>,
    candidates: Vec<C>,
    approvals: Vec<u64>,
}

impl<V: Ord + Clone, C: Ord + Clone> Profile<V, C> {
    /// Builds a profile whose candidate universe is the union of all approval sets.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for an empty profile, an empty universe,
    /// more than [`MAX_CANDIDATES`] candidates, or a repeated voter id.
    pub fn new<I, A>(ballots: I) -> Result<Self>
    where
        I: IntoIterator<Item = (V, A)>,
        A: IntoIterator<Item = C>,
    {
        Self::build(BTreeSet::new(), ballots)
    }

    /// Like [`Profile::new`], but also declares candidates that may have no supporters.
    ///
    /// # Errors
    /// Same as [`Profile::new`].
    pub fn with_candidates<K, I, A>(candidates: K, ballots: I) -> Result<Self>
    where
        K: IntoIterator<Item = C>,
        I: IntoIterator<Item = (V, A)>,
        A: IntoIterator<Item = C>,
    {
        Self::build(candidates.into_iter().collect(), ballots)
    }

    fn build<I, A>(mut universe: BTreeSet<C>, ballots: I) -> Result<Self>
    where
        I: IntoIterator<Item = (V, A)>,
        A: IntoIterator<Item = C>,
    {
        let mut ballots: Vec<(V, BTreeSet<C>)> = ballots
            .into_iter()
            .map(|(v, a)| (v, a.into_iter().collect()))
            .collect();
        if ballots.is_empty() {
            return Err(Error::invalid("profile has no voters"));
        }
        for (_, approved) in &ballots {
            universe.extend(approved.iter().cloned());
        }
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
        let mut approvals = Vec::with_capacity(ballots.len());
        for (voter, approved) in ballots {
            let mut mask = 0u64;
            for c in &approved {
                // Every approved candidate was inserted into the universe above.
                if let Ok(idx) = candidates.binary_search(c) {
                    mask |= bit(idx);
                }
            }
            voters.push(voter);
            approvals.push(mask);
        }

        Ok(Self {
            voters,
            candidates,
            approvals,
        })
    }

    /// Index of candidate `c`, if it belongs to the universe.
    pub fn candidate_index(&self, c: &C) -> Option<usize> {
        self.candidates.binary_search(c).ok()
    }

    /// Index of voter `v`, if present.
    pub fn voter_index(&self, v: &V) -> Option<usize> {
        self.voters.binary_search(v).ok()
    }

    /// Builds a committee from candidate ids.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for unknown or repeated candidates.
    pub fn committee<I, T>(&self, members: I) -> Result<Committee>
    where
        I: IntoIterator<Item = T>,
        T: Borrow<C>,
    {
        let mut mask = 0u64;
        for (pos, c) in members.into_iter().enumerate() {
            let idx = self.candidate_index(c.borrow()).ok_or_else(|| {
                Error::invalid(format!("committee member #{} is not a candidate", pos + 1))
            })?;
            if mask & bit(idx) != 0 {
                return Err(Error::invalid(format!(
                    "committee member #{} is listed twice",
                    pos + 1
                )));
            }
            mask |= bit(idx);
        }
        Ok(Committee::from_mask(mask))
    }
}

impl<V, C> Profile<V, C> {
    /// Number of voters.
    #[inline]
    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    /// Number of candidates in the universe.
    #[inline]
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

    /// Id of voter `i`.
    pub fn voter(&self, i: usize) -> &V {
        &self.voters[i]
    }

    /// Id of candidate `c`.
    pub fn candidate(&self, c: usize) -> &C {
        &self.candidates[c]
    }

    /// Approval bitsets in voter index order.
    #[inline]
    pub fn approvals(&self) -> &[u64] {
        &self.approvals
    }

    /// Approval bitset of voter `i`.
    #[inline]
    pub fn approval(&self, i: usize) -> u64 {
        self.approvals[i]
    }

    /// Bitset of the whole candidate universe.
    #[inline]
    pub fn universe(&self) -> u64 {
        low_bits(self.candidates.len())
    }

    /// Voters approving candidate `c`.
    pub fn supporters(&self, c: usize) -> impl Iterator<Item = usize> + '_ {
        let m = bit(c);
        self.approvals
            .iter()
            .enumerate()
            .filter(move |(_, a)| *a & m != 0)
            .map(|(i, _)| i)
    }

    /// Number of voters approving candidate `c`.
    pub fn support_count(&self, c: usize) -> usize {
        let m = bit(c);
        self.approvals.iter().filter(|a| *a & m != 0).count()
    }

    /// Union of the approval sets of `voters`.
    pub fn approval_union<I: IntoIterator<Item = usize>>(&self, voters: I) -> u64 {
        voters.into_iter().fold(0, |acc, v| acc | self.approvals[v])
    }

    /// Intersection of the approval sets of `voters` (empty for no voters).
    pub fn common_approvals<I: IntoIterator<Item = usize>>(&self, voters: I) -> u64 {
        let mut it = voters.into_iter();
        match it.next() {
            None => 0,
            Some(first) => it.fold(self.approvals[first], |acc, v| acc & self.approvals[v]),
        }
    }

    /// Checks that `committee` is a non-empty subset of the universe.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] otherwise.
    pub fn check_committee(&self, committee: Committee) -> Result<()> {
        if committee.size() == 0 {
            return Err(Error::invalid("committee size must be positive"));
        }
        if committee.mask() & !self.universe() != 0 {
            return Err(Error::invalid(format!(
                "committee refers to candidates outside the {}-candidate universe",
                self.candidate_count()
            )));
        }
        Ok(())
    }

    /// Checks a requested committee size against the universe.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for zero seats or more seats than candidates.
    pub fn check_seats(&self, seats: usize) -> Result<()> {
        if seats == 0 {
            return Err(Error::invalid("committee size must be positive"));
        }
        if seats > self.candidate_count() {
            return Err(Error::invalid(format!(
                "committee size {seats} exceeds the {} available candidates",
                self.candidate_count()
            )));
        }
        Ok(())
    }

    /// Member ids of `committee`, in candidate order.
    pub fn committee_members(&self, committee: Committee) -> Vec<&C> {
        committee
            .members()
            .filter(|&c| c < self.candidates.len())
            .map(|c| &self.candidates[c])
            .collect()
    }
}

impl<V, C: fmt::Display> Profile<V, C> {
    /// Stable text encoding of a committee: sorted, comma-separated candidate ids.
    pub fn format_committee(&self, committee: Committee) -> String {
        committee
            .members()
            .filter(|&c| c < self.candidates.len())
            .map(|c| self.candidates[c].to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Formats a candidate bitset as `{a,b,c}`.
    pub fn format_candidates(&self, mask: u64) -> String {
        format!("{{{}}}", self.format_committee(Committee::from_mask(mask)))
    }
}

impl<V: fmt::Display, C: fmt::Display> Profile<V, C> {
    /// Writes the profile in the text format read by [`parse_profile`].
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        let universe: Vec<String> = self.candidates.iter().map(ToString::to_string).collect();
        writeln!(w, "@candidates {}", universe.join(" "))?;
        for (voter, &approved) in self.voters.iter().zip(&self.approvals) {
            let ids: Vec<String> = Bits::of(approved)
                .map(|c| self.candidates[c].to_string())
                .collect();
            writeln!(w, "{voter}: {}", ids.join(" "))?;
        }
        Ok(())
    }
}

impl<V: Ord + Clone, C: Ord + Clone + FromStr> Profile<V, C> {
    /// Parses the text encoding produced by [`Profile::format_committee`].
    ///
    /// # Errors
    /// Returns [`Error::Parse`] for ids that do not parse and
    /// [`Error::InvalidConfiguration`] for unknown or repeated candidates.
    pub fn parse_committee(&self, text: &str) -> Result<Committee> {
        let ids = text
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<C>().map_err(|_| Error::Parse {
                    line: 0,
                    message: format!("invalid candidate id {t:?}"),
                })
            })
            .collect::<Result<Vec<C>>>()?;
        self.committee(ids)
    }
}

// ============================================================================
// Text format
// ============================================================================

/// Splits `text` into `(line number, key, tokens)` records.
///
/// Comments start with `#`; blank lines are skipped; `@key rest` lines are directives.
pub(crate) fn parse_records<'a>(
    text: &'a str,
    separators: &'a [char],
) -> impl Iterator<Item = Result<Record<'a>>> + 'a {
    text.lines().enumerate().filter_map(move |(i, raw)| {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            return None;
        }
        let lineno = i + 1;
        let tokens = |rest: &'a str| {
            rest.split(|ch: char| ch.is_whitespace() || separators.contains(&ch))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        };
        if let Some(directive) = line.strip_prefix('@') {
            let (name, rest) = directive
                .split_once(char::is_whitespace)
                .unwrap_or((directive, ""));
            return Some(Ok(Record::Directive {
                line: lineno,
                name,
                items: tokens(rest),
            }));
        }
        Some(match line.split_once(':') {
            Some((voter, rest)) if !voter.trim().is_empty() => Ok(Record::Ballot {
                voter: voter.trim(),
                items: tokens(rest),
            }),
            _ => Err(Error::Parse {
                line: lineno,
                message: "expected `voter: candidates`".to_string(),
            }),
        })
    })
}

pub(crate) enum Record<'a> {
    Directive {
        line: usize,
        name: &'a str,
        items: Vec<&'a str>,
    },
    Ballot {
        voter: &'a str,
        items: Vec<&'a str>,
    },
}

/// Parses an approval profile with string ids.
///
/// ```text
/// # three groups
/// @candidates a b c d e f
/// v1: a b
/// v2: a, b
/// ```
///
/// # Errors
/// Returns [`Error::Parse`] for malformed lines or unknown directives, and the errors of
/// [`Profile::with_candidates`].
pub fn parse_profile(text: &str) -> Result<Profile<String, String>> {
    let mut declared = Vec::new();
    let mut ballots = Vec::new();
    for record in parse_records(text, &[',']) {
        match record? {
            Record::Directive { line, name, items } => {
                if name != "candidates" {
                    return Err(Error::Parse {
                        line,
                        message: format!("unknown directive @{name}"),
                    });
                }
                declared.extend(items.into_iter().map(str::to_string));
            }
            Record::Ballot { voter, items } => {
                let approved: Vec<String> = items.into_iter().map(str::to_string).collect();
                ballots.push((voter.to_string(), approved));
            }
        }
    }
    Profile::with_candidates(declared, ballots)
}

/// Reads and parses a profile file.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be read, otherwise the errors of
/// [`parse_profile`].
pub fn load_profile(path: impl AsRef<Path>) -> Result<Profile<String, String>> {
    let text = fs::read_to_string(path)?;
    parse_profile(&text)
}

// ============================================================================
// Tests
// ============================================================================
