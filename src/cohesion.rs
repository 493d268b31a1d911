//! Quotas and cohesive-group discovery.
//!
//! A group of voters *deserves* ℓ seats when `|G| >= ℓ · n / k`. The comparison is done
//! exactly in integers (`|G| · k >= ℓ · n`), so there is no rounding at boundary sizes.
//!
//! Two discovery modes are provided:
//! - [`CohesionMode::Union`]: one group per candidate `c`, namely the supporters `S(c)`.
//!   The group's benefit set is the union of its members' approvals (JR, PJR).
//! - [`CohesionMode::Intersection`]: one group per ℓ-set of candidates `T`, namely the
//!   voters approving all of `T`, so the members share at least ℓ candidates.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::profile::{Committee, Profile};
use crate::subsets::Combinations;

// ============================================================================
// Quota
// ============================================================================

/// The proportional share `n / k`, kept as an exact fraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quota {
    voters: usize,
    seats: usize,
}

impl Quota {
    /// Quota for `voters` voters electing `seats` candidates.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] if either count is zero.
    pub fn new(voters: usize, seats: usize) -> Result<Self> {
        if seats == 0 {
            return Err(Error::invalid("committee size must be positive"));
        }
        if voters == 0 {
            return Err(Error::invalid("profile has no voters"));
        }
        Ok(Self { voters, seats })
    }

    /// Quota for `profile` with a committee of `seats` members.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for zero seats or more seats than candidates.
    pub fn for_profile<V, C>(profile: &Profile<V, C>, seats: usize) -> Result<Self> {
        profile.check_seats(seats)?;
        Self::new(profile.voter_count(), seats)
    }

    /// Number of voters `n`.
    pub fn voters(&self) -> usize {
        self.voters
    }

    /// Committee size `k`.
    pub fn seats(&self) -> usize {
        self.seats
    }

    /// `n / k` as a float, for display.
    pub fn value(&self) -> f64 {
        self.voters as f64 / self.seats as f64
    }

    /// Whether a group of `group_size` voters deserves `ell` seats.
    #[inline]
    pub fn deserves(&self, group_size: usize, ell: usize) -> bool {
        group_size * self.seats >= ell * self.voters
    }

    /// Smallest group size deserving `ell` seats: `ceil(ell · n / k)`.
    #[inline]
    pub fn min_group_size(&self, ell: usize) -> usize {
        (ell * self.voters).div_ceil(self.seats)
    }

    /// Minimum size of each subgroup in an EJR partition: `max(1, floor(n / k))`.
    ///
    /// Flooring keeps every PJR group (`|S(c)| >= ℓ n / k`) splittable into ℓ such
    /// subgroups, which is what makes EJR imply PJR at non-integer quotas.
    #[inline]
    pub fn min_subgroup_size(&self) -> usize {
        (self.voters / self.seats).max(1)
    }
}

// ============================================================================
// Cohesive groups
// ============================================================================

/// Group discovery mode, see the module docs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CohesionMode {
    /// Supporters of a single candidate.
    Union,
    /// Voters sharing a whole ℓ-set of candidates.
    Intersection,
}

/// A group of voters together with what it is owed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CohesiveGroup {
    /// Number of representatives the group deserves.
    pub ell: usize,
    /// Member voter indices, increasing.
    pub voters: Vec<usize>,
    /// Candidates approved by every member.
    pub common: u64,
    /// Candidates whose election counts as representing the group (union of approvals).
    pub benefit: u64,
}

impl CohesiveGroup {
    /// Builds a group from member voters, deriving `common` and `benefit`.
    pub fn from_voters<V, C>(profile: &Profile<V, C>, ell: usize, voters: Vec<usize>) -> Self {
        let common = profile.common_approvals(voters.iter().copied());
        let benefit = profile.approval_union(voters.iter().copied());
        Self {
            ell,
            voters,
            common,
            benefit,
        }
    }

    /// Number of member voters.
    pub fn size(&self) -> usize {
        self.voters.len()
    }

    /// Representatives of the group on `committee`.
    #[inline]
    pub fn represented(&self, committee: Committee) -> usize {
        committee.representation(self.benefit)
    }

    /// `Some(represented)` if the committee gives the group fewer than ℓ representatives.
    #[inline]
    pub fn shortfall(&self, committee: Committee) -> Option<usize> {
        let r = self.represented(committee);
        (r < self.ell).then_some(r)
    }
}

/// Finds the groups that deserve `ell` seats of a `seats`-member committee.
///
/// Groups are deduplicated by voter set and reported in candidate (union mode) or
/// lexicographic candidate-set (intersection mode) order.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] for `ell == 0`, zero seats, or more seats than
/// candidates.
pub fn find_cohesive_groups<V, C>(
    profile: &Profile<V, C>,
    ell: usize,
    seats: usize,
    mode: CohesionMode,
) -> Result<Vec<CohesiveGroup>> {
    if ell == 0 {
        return Err(Error::invalid("cohesion level must be at least 1"));
    }
    let quota = Quota::for_profile(profile, seats)?;
    Ok(cohesive_groups_with_quota(profile, ell, quota, mode))
}

pub(crate) fn cohesive_groups_with_quota<V, C>(
    profile: &Profile<V, C>,
    ell: usize,
    quota: Quota,
    mode: CohesionMode,
) -> Vec<CohesiveGroup> {
    let mut seen = BTreeSet::new();
    let mut groups = Vec::new();
    let mut push = |voters: Vec<usize>| {
        if quota.deserves(voters.len(), ell) && seen.insert(voters.clone()) {
            groups.push(CohesiveGroup::from_voters(profile, ell, voters));
        }
    };

    match mode {
        CohesionMode::Union => {
            for c in 0..profile.candidate_count() {
                if quota.deserves(profile.support_count(c), ell) {
                    push(profile.supporters(c).collect());
                }
            }
        }
        CohesionMode::Intersection => {
            for shared in Combinations::of_range(profile.candidate_count(), ell) {
                let voters: Vec<usize> = profile
                    .approvals()
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| *a & shared == shared)
                    .map(|(i, _)| i)
                    .collect();
                push(voters);
            }
        }
    }
    groups
}

// ============================================================================
// Precomputed table
// ============================================================================

/// All groups deserving `ell` seats, with the group size threshold that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CohesionTier {
    /// Deserved representatives.
    pub ell: usize,
    /// `ceil(ell · n / k)`.
    pub min_group_size: usize,
    /// Groups in this tier.
    pub groups: Vec<CohesiveGroup>,
}

/// Committee-independent cohesive groups for one `(profile, seats)` pair.
///
/// Building the table is the expensive part of an axiom check; once built, checking a
/// committee is a scan of popcounts, so one table serves a whole enumeration pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CohesionTable {
    seats: usize,
    tiers: Vec<CohesionTier>,
}

impl CohesionTable {
    /// Table of groups for ℓ = 1..=`max_ell` in the given mode.
    ///
    /// # Errors
    /// Same as [`find_cohesive_groups`].
    pub fn build<V, C>(
        profile: &Profile<V, C>,
        seats: usize,
        max_ell: usize,
        mode: CohesionMode,
    ) -> Result<Self> {
        let quota = Quota::for_profile(profile, seats)?;
        let tiers = (1..=max_ell)
            .map(|ell| CohesionTier {
                ell,
                min_group_size: quota.min_group_size(ell),
                groups: cohesive_groups_with_quota(profile, ell, quota, mode),
            })
            .collect();
        Ok(Self { seats, tiers })
    }

    /// Wraps tiers computed elsewhere (the EJR partition search).
    pub fn from_tiers(seats: usize, tiers: Vec<CohesionTier>) -> Self {
        Self { seats, tiers }
    }

    /// Committee size the table was built for.
    pub fn seats(&self) -> usize {
        self.seats
    }

    /// Tiers in increasing ℓ.
    pub fn tiers(&self) -> &[CohesionTier] {
        &self.tiers
    }

    /// Total number of groups across tiers.
    pub fn group_count(&self) -> usize {
        self.tiers.iter().map(|t| t.groups.len()).sum()
    }

    /// First group (by ℓ, then table order) that `committee` under-represents.
    pub fn first_shortfall(&self, committee: Committee) -> Option<(&CohesiveGroup, usize)> {
        self.tiers
            .iter()
            .flat_map(|t| t.groups.iter())
            .find_map(|g| g.shortfall(committee).map(|r| (g, r)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn three_groups() -> Profile<&'static str, &'static str> {
        Profile::new([
            ("v1", vec!["a", "b"]),
            ("v2", vec!["a", "b"]),
            ("v3", vec!["a", "b"]),
            ("v4", vec!["c", "d"]),
            ("v5", vec!["c", "d"]),
            ("v6", vec!["c", "d"]),
            ("v7", vec!["e", "f"]),
            ("v8", vec!["e", "f"]),
            ("v9", vec!["e", "f"]),
        ])
        .unwrap()
    }

    #[test]
    fn quota_thresholds_are_exact() {
        let q = Quota::new(10, 4).unwrap();
        assert_eq!(q.value(), 2.5);
        assert!(!q.deserves(2, 1));
        assert!(q.deserves(3, 1));
        assert!(!q.deserves(4, 2));
        assert!(q.deserves(5, 2));
        assert_eq!(q.min_group_size(1), 3);
        assert_eq!(q.min_group_size(2), 5);
        assert_eq!(q.min_subgroup_size(), 2);
        assert_eq!(Quota::new(2, 5).unwrap().min_subgroup_size(), 1);
    }

    #[test]
    fn zero_seats_is_invalid() {
        assert!(matches!(Quota::new(5, 0), Err(Error::InvalidConfiguration(_))));
        let p = three_groups();
        assert!(find_cohesive_groups(&p, 1, 0, CohesionMode::Union).is_err());
        assert!(find_cohesive_groups(&p, 1, 7, CohesionMode::Union).is_err());
        assert!(find_cohesive_groups(&p, 0, 3, CohesionMode::Union).is_err());
    }

    #[test]
    fn union_mode_dedupes_identical_supporter_sets() {
        let p = three_groups();
        let groups = find_cohesive_groups(&p, 1, 3, CohesionMode::Union).unwrap();
        // a and b have the same supporters, and so on.
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].voters, vec![0, 1, 2]);
        assert_eq!(groups[0].common, 0b11);
        assert_eq!(groups[2].benefit, 0b11_0000);
        assert!(find_cohesive_groups(&p, 2, 3, CohesionMode::Union)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn intersection_mode_requires_shared_sets() {
        let p = three_groups();
        let ell2 = find_cohesive_groups(&p, 2, 6, CohesionMode::Intersection).unwrap();
        // quota 1.5, ell 2 => groups of >= 3 voters sharing two candidates.
        assert_eq!(ell2.len(), 3);
        assert!(ell2.iter().all(|g| g.common.count_ones() >= 2));
        let ell3 = find_cohesive_groups(&p, 3, 6, CohesionMode::Intersection).unwrap();
        assert!(ell3.is_empty());
    }

    #[test]
    fn voters_without_approvals_never_form_groups() {
        let p = Profile::new([(1, vec![]), (2, vec![]), (3, vec!['x'])]).unwrap();
        let groups = find_cohesive_groups(&p, 1, 1, CohesionMode::Union).unwrap();
        assert!(groups.is_empty());
        let groups = find_cohesive_groups(&p, 1, 1, CohesionMode::Intersection).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn table_reports_first_shortfall() {
        let p = three_groups();
        let table = CohesionTable::build(&p, 3, 3, CohesionMode::Union).unwrap();
        assert_eq!(table.tiers().len(), 3);
        assert_eq!(table.tiers()[0].min_group_size, 3);
        assert_eq!(table.group_count(), 3);

        let good = p.committee(["a", "c", "e"]).unwrap();
        assert!(table.first_shortfall(good).is_none());

        let bad = p.committee(["a", "b", "c"]).unwrap();
        let (group, represented) = table.first_shortfall(bad).unwrap();
        assert_eq!(group.voters, vec![6, 7, 8]);
        assert_eq!(represented, 0);
    }
}
