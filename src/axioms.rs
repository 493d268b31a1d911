//! JR, PJR and EJR verification.
//!
//! Every check derives the committee size `k` from the committee itself and the quota from
//! `n / k`. A voter group *qualifies* for ℓ representatives when it is large enough
//! (`|G| >= ceil(ℓ n / k)`) and cohesive in the sense of the axiom:
//!
//! - **JR**: `G = S(c)` for some candidate `c`, with ℓ = 1.
//! - **PJR**: `G = S(c)` for some candidate `c`, any ℓ in `1..=k`.
//! - **EJR**: any voter set that shares a candidate, or that splits into ℓ disjoint
//!   subgroups of at least `max(1, floor(n / k))` voters, each sharing a candidate.
//!
//! A qualifying group is represented when at least ℓ committee members fall in the union of
//! its members' approvals. With these choices EJR ⟹ PJR ⟹ JR holds for every profile.
//!
//! The `find_*_violation` functions stop at the first under-represented group.
//! [`AxiomChecker`] precomputes the committee-independent groups once per committee size and
//! then answers per committee with a table scan.

use std::fmt;
use std::str::FromStr;

use log::debug;
use rayon::prelude::*;

use crate::budget::{Budget, Meter};
use crate::cohesion::{
    CohesionMode, CohesionTable, CohesionTier, CohesiveGroup, Quota, cohesive_groups_with_quota,
};
use crate::error::{Error, Result};
use crate::partition::{GroupPartitioner, MAX_PARTITION_VOTERS};
use crate::profile::{Bits, Committee, Profile};
use crate::subsets::Combinations;

// ============================================================================
// Axiom selector
// ============================================================================

/// Proportionality axiom, in increasing strength.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axiom {
    /// Justified Representation.
    Jr,
    /// Proportional Justified Representation.
    Pjr,
    /// Extended Justified Representation.
    Ejr,
}

impl Axiom {
    /// All axioms, weakest first.
    pub const fn all() -> [Axiom; 3] {
        [Axiom::Jr, Axiom::Pjr, Axiom::Ejr]
    }
}

impl fmt::Display for Axiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axiom::Jr => "JR",
            Axiom::Pjr => "PJR",
            Axiom::Ejr => "EJR",
        })
    }
}

impl FromStr for Axiom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jr" => Ok(Axiom::Jr),
            "pjr" => Ok(Axiom::Pjr),
            "ejr" => Ok(Axiom::Ejr),
            _ => Err(Error::invalid(format!(
                "unknown axiom {s:?} (expected jr, pjr or ejr)"
            ))),
        }
    }
}

// ============================================================================
// Violations
// ============================================================================

/// An under-represented qualifying group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Axiom that is violated.
    pub axiom: Axiom,
    /// The group, with the representation ℓ it deserves.
    pub group: CohesiveGroup,
    /// Committee members in the group's benefit set (always `< group.ell`).
    pub represented: usize,
}

impl Violation {
    /// One-line human readable description.
    pub fn describe<V: fmt::Display, C: fmt::Display>(&self, profile: &Profile<V, C>) -> String {
        let voters: Vec<String> = self
            .group
            .voters
            .iter()
            .map(|&v| profile.voter(v).to_string())
            .collect();
        format!(
            "{} violated: voters {{{}}} deserve {} representative(s) among {} but the committee has {}",
            self.axiom,
            voters.join(","),
            self.group.ell,
            profile.format_candidates(self.group.benefit),
            self.represented
        )
    }
}

/// Validates a committee and returns its quota.
fn committee_quota<V, C>(profile: &Profile<V, C>, committee: Committee) -> Result<Quota> {
    profile.check_committee(committee)?;
    Quota::for_profile(profile, committee.size())
}

fn check_voter_limit<V, C>(profile: &Profile<V, C>) -> Result<()> {
    if profile.voter_count() > MAX_PARTITION_VOTERS {
        return Err(Error::invalid(format!(
            "EJR checks support at most {MAX_PARTITION_VOTERS} voters, profile has {}",
            profile.voter_count()
        )));
    }
    Ok(())
}

// ============================================================================
// JR / PJR
// ============================================================================

fn union_violation<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
    axiom: Axiom,
    max_ell: usize,
    quota: Quota,
) -> Option<Violation> {
    (1..=max_ell).find_map(|ell| {
        cohesive_groups_with_quota(profile, ell, quota, CohesionMode::Union)
            .into_iter()
            .find_map(|group| {
                group.shortfall(committee).map(|represented| Violation {
                    axiom,
                    group,
                    represented,
                })
            })
    })
}

/// First JR violation of `committee`, if any.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] for an empty committee or one naming candidates
/// outside the profile.
pub fn find_jr_violation<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
) -> Result<Option<Violation>> {
    let quota = committee_quota(profile, committee)?;
    Ok(union_violation(profile, committee, Axiom::Jr, 1, quota))
}

/// Whether `committee` satisfies JR.
///
/// # Errors
/// Same as [`find_jr_violation`].
pub fn satisfies_jr<V, C>(profile: &Profile<V, C>, committee: Committee) -> Result<bool> {
    Ok(find_jr_violation(profile, committee)?.is_none())
}

/// First PJR violation of `committee` (smallest ℓ first), if any.
///
/// # Errors
/// Same as [`find_jr_violation`].
pub fn find_pjr_violation<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
) -> Result<Option<Violation>> {
    let quota = committee_quota(profile, committee)?;
    Ok(union_violation(
        profile,
        committee,
        Axiom::Pjr,
        committee.size(),
        quota,
    ))
}

/// Whether `committee` satisfies PJR.
///
/// # Errors
/// Same as [`find_jr_violation`].
pub fn satisfies_pjr<V, C>(profile: &Profile<V, C>, committee: Committee) -> Result<bool> {
    Ok(find_pjr_violation(profile, committee)?.is_none())
}

// ============================================================================
// EJR
// ============================================================================

/// Whether voter set `group` qualifies for `ell` representatives (size already checked).
fn qualifies(
    partitioner: &mut GroupPartitioner<'_>,
    group: u64,
    ell: usize,
    min_subgroup: usize,
    meter: &Meter,
) -> Result<bool> {
    if partitioner.common_approvals(group) != 0 {
        return Ok(true);
    }
    partitioner.can_partition(group, ell, min_subgroup, meter)
}

fn bitset_to_voters(group: u64) -> Vec<usize> {
    Bits::of(group).collect()
}

/// First EJR violation of `committee`, scanning ℓ, then group size, then voter sets in
/// lexicographic order.
///
/// # Errors
/// Returns [`Error::InvalidConfiguration`] for an invalid committee or more than 64 voters,
/// and [`Error::ResourceExhausted`] if `budget` runs out before the answer is known.
pub fn find_ejr_violation<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
    budget: &Budget,
) -> Result<Option<Violation>> {
    let quota = committee_quota(profile, committee)?;
    check_voter_limit(profile)?;
    let meter = budget.meter();
    let n = profile.voter_count();
    let min_subgroup = quota.min_subgroup_size();
    let mut partitioner = GroupPartitioner::new(profile.approvals());

    for ell in 1..=committee.size() {
        let min_size = quota.min_group_size(ell);
        for size in min_size..=n {
            for group in Combinations::of_range(n, size) {
                meter.tick()?;
                let benefit = profile.approval_union(Bits::of(group));
                let represented = committee.representation(benefit);
                if represented >= ell {
                    continue;
                }
                if qualifies(&mut partitioner, group, ell, min_subgroup, &meter)? {
                    debug!(
                        "EJR violation at ell={ell} after {} steps ({} subgroups examined)",
                        meter.steps(),
                        partitioner.subgroups_examined()
                    );
                    return Ok(Some(Violation {
                        axiom: Axiom::Ejr,
                        group: CohesiveGroup::from_voters(profile, ell, bitset_to_voters(group)),
                        represented,
                    }));
                }
            }
        }
    }
    debug!("EJR holds, {} steps", meter.steps());
    Ok(None)
}

/// Whether `committee` satisfies EJR.
///
/// # Errors
/// Same as [`find_ejr_violation`].
pub fn satisfies_ejr<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
    budget: &Budget,
) -> Result<bool> {
    Ok(find_ejr_violation(profile, committee, budget)?.is_none())
}

/// First violation of `axiom`, if any. The budget only applies to EJR.
///
/// # Errors
/// Same as the axiom-specific functions.
pub fn find_violation<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
    axiom: Axiom,
    budget: &Budget,
) -> Result<Option<Violation>> {
    match axiom {
        Axiom::Jr => find_jr_violation(profile, committee),
        Axiom::Pjr => find_pjr_violation(profile, committee),
        Axiom::Ejr => find_ejr_violation(profile, committee, budget),
    }
}

/// Whether `committee` satisfies `axiom`.
///
/// # Errors
/// Same as [`find_violation`].
pub fn satisfies<V, C>(
    profile: &Profile<V, C>,
    committee: Committee,
    axiom: Axiom,
    budget: &Budget,
) -> Result<bool> {
    Ok(find_violation(profile, committee, axiom, budget)?.is_none())
}

/// Minimal voter sets qualifying for `ell` representatives.
///
/// Sets are visited by increasing size, so skipping supersets of earlier claims leaves
/// exactly the inclusion-minimal ones.
fn ejr_tier<V, C>(
    profile: &Profile<V, C>,
    ell: usize,
    quota: Quota,
    meter: &Meter,
) -> Result<CohesionTier> {
    let n = profile.voter_count();
    let min_group_size = quota.min_group_size(ell);
    let min_subgroup = quota.min_subgroup_size();
    let mut partitioner = GroupPartitioner::new(profile.approvals());
    let mut claims: Vec<u64> = Vec::new();

    for size in min_group_size..=n {
        for group in Combinations::of_range(n, size) {
            meter.tick()?;
            if claims.iter().any(|&c| c & !group == 0) {
                continue;
            }
            if qualifies(&mut partitioner, group, ell, min_subgroup, meter)? {
                claims.push(group);
            }
        }
    }
    debug!(
        "EJR tier ell={ell}: {} minimal groups (min size {min_group_size}, {} subgroups examined)",
        claims.len(),
        partitioner.subgroups_examined()
    );

    let groups = claims
        .into_iter()
        .map(|g| CohesiveGroup::from_voters(profile, ell, bitset_to_voters(g)))
        .collect();
    Ok(CohesionTier {
        ell,
        min_group_size,
        groups,
    })
}

// ============================================================================
// AxiomChecker
// ============================================================================

/// Committee-independent precomputation for checking many committees of one size.
///
/// Verdicts agree with [`satisfies`] for every committee of the prepared size.
#[derive(Clone, Debug)]
pub struct AxiomChecker {
    axiom: Axiom,
    table: CohesionTable,
}

impl AxiomChecker {
    /// Precomputes the qualifying groups of `profile` for committees of `seats` members.
    ///
    /// EJR tiers are built in parallel, one rayon task per ℓ, all charging `budget`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for zero seats, more seats than candidates, or
    /// (EJR) more than 64 voters, and [`Error::ResourceExhausted`] if the budget runs out.
    pub fn prepare<V: Sync, C: Sync>(
        profile: &Profile<V, C>,
        seats: usize,
        axiom: Axiom,
        budget: &Budget,
    ) -> Result<Self> {
        Self::prepare_metered(profile, seats, axiom, &budget.meter())
    }

    /// [`AxiomChecker::prepare`] charging an already running meter.
    pub(crate) fn prepare_metered<V: Sync, C: Sync>(
        profile: &Profile<V, C>,
        seats: usize,
        axiom: Axiom,
        meter: &Meter,
    ) -> Result<Self> {
        let table = match axiom {
            Axiom::Jr => CohesionTable::build(profile, seats, 1, CohesionMode::Union)?,
            Axiom::Pjr => CohesionTable::build(profile, seats, seats, CohesionMode::Union)?,
            Axiom::Ejr => {
                let quota = Quota::for_profile(profile, seats)?;
                check_voter_limit(profile)?;
                let tiers = (1..=seats)
                    .into_par_iter()
                    .map(|ell| ejr_tier(profile, ell, quota, meter))
                    .collect::<Result<Vec<_>>>()?;
                debug!("EJR table for k={seats} used {} steps", meter.steps());
                CohesionTable::from_tiers(seats, tiers)
            }
        };
        debug!(
            "{axiom} checker for k={seats}: {} groups over {} tiers",
            table.group_count(),
            table.tiers().len()
        );
        Ok(Self { axiom, table })
    }

    /// Axiom being checked.
    pub fn axiom(&self) -> Axiom {
        self.axiom
    }

    /// Committee size the checker was prepared for.
    pub fn seats(&self) -> usize {
        self.table.seats()
    }

    /// Precomputed groups.
    pub fn table(&self) -> &CohesionTable {
        &self.table
    }

    /// First violation of the prepared axiom by `committee`.
    ///
    /// # Panics
    /// Panics if `committee` does not have the prepared size.
    pub fn first_violation(&self, committee: Committee) -> Option<Violation> {
        assert_eq!(
            committee.size(),
            self.table.seats(),
            "committee size differs from the size the checker was prepared for"
        );
        self.table
            .first_shortfall(committee)
            .map(|(group, represented)| Violation {
                axiom: self.axiom,
                group: group.clone(),
                represented,
            })
    }

    /// Whether `committee` satisfies the prepared axiom.
    ///
    /// # Panics
    /// Panics if `committee` does not have the prepared size.
    pub fn check(&self, committee: Committee) -> bool {
        assert_eq!(
            committee.size(),
            self.table.seats(),
            "committee size differs from the size the checker was prepared for"
        );
        self.table.first_shortfall(committee).is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::random_approval_profile;
    use crate::search::committees;
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    type P = Profile<&'static str, &'static str>;

    fn three_groups() -> P {
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

    fn pjr_vs_jr() -> P {
        Profile::with_candidates(
            ["e", "f"],
            [
                ("v1", vec!["a", "b"]),
                ("v2", vec!["a", "b"]),
                ("v3", vec!["a", "c"]),
                ("v4", vec!["a", "c"]),
                ("v5", vec!["d"]),
                ("v6", vec!["d"]),
                ("v7", vec!["d"]),
                ("v8", vec!["d"]),
            ],
        )
        .unwrap()
    }

    fn verdicts(p: &P, members: &[&'static str]) -> [bool; 3] {
        let c = p.committee(members).unwrap();
        let budget = Budget::unlimited();
        Axiom::all().map(|a| satisfies(p, c, a, &budget).unwrap())
    }

    #[test]
    fn axiom_names_round_trip() {
        for a in Axiom::all() {
            assert_eq!(a.to_string().parse::<Axiom>().unwrap(), a);
        }
        assert_eq!("ejr".parse::<Axiom>().unwrap(), Axiom::Ejr);
        assert!("ejr+".parse::<Axiom>().is_err());
    }

    #[test]
    fn three_groups_verdicts() {
        let p = three_groups();
        assert_eq!(verdicts(&p, &["a", "c", "e"]), [true, true, true]);
        assert_eq!(verdicts(&p, &["a", "c", "f"]), [true, true, true]);
        assert_eq!(verdicts(&p, &["a", "b", "c"]), [false, false, false]);

        let bad = p.committee(["a", "b", "c"]).unwrap();
        let v = find_jr_violation(&p, bad).unwrap().unwrap();
        assert_eq!(v.group.voters, vec![6, 7, 8]);
        assert_eq!(v.represented, 0);
        assert_eq!(
            v.describe(&p),
            "JR violated: voters {v7,v8,v9} deserve 1 representative(s) among {e,f} but the committee has 0"
        );
    }

    #[test]
    fn pairs_satisfy_ejr() {
        let p: P = Profile::new([
            ("v1", vec!["a"]),
            ("v2", vec!["a"]),
            ("v3", vec!["b"]),
            ("v4", vec!["b"]),
            ("v5", vec!["c"]),
            ("v6", vec!["c"]),
        ])
        .unwrap();
        let c = p.committee(["a", "b", "c"]).unwrap();
        assert!(satisfies_ejr(&p, c, &Budget::unlimited()).unwrap());
    }

    #[test]
    fn pjr_is_stronger_than_jr() {
        let p = pjr_vs_jr();
        assert_eq!(verdicts(&p, &["a", "b", "c", "d"]), [true, false, false]);
        assert_eq!(verdicts(&p, &["a", "d", "e", "f"]), [true, false, false]);

        let c = p.committee(["a", "b", "c", "d"]).unwrap();
        let v = find_pjr_violation(&p, c).unwrap().unwrap();
        assert_eq!(v.group.ell, 2);
        assert_eq!(v.group.voters, vec![4, 5, 6, 7]);
        assert_eq!(v.represented, 1);
    }

    #[test]
    fn ejr_catches_groups_pjr_misses() {
        // Voters 1-4 share nothing as a whole but split into two cohesive pairs; together
        // they deserve 2 seats and the union of their approvals holds only x.
        let p: P = Profile::with_candidates(
            ["y"],
            [
                ("v1", vec!["p", "x"]),
                ("v2", vec!["p"]),
                ("v3", vec!["q", "x"]),
                ("v4", vec!["q"]),
            ],
        )
        .unwrap();
        let c = p.committee(["x", "y"]).unwrap();
        // n = 4, k = 2: quota 2, each pair deserves 1 and has x via v1 / v3.
        assert!(satisfies_pjr(&p, c).unwrap());
        let v = find_ejr_violation(&p, c, &Budget::unlimited()).unwrap().unwrap();
        assert_eq!(v.group.ell, 2);
        assert_eq!(v.group.voters, vec![0, 1, 2, 3]);
        assert_eq!(v.represented, 1);
    }

    #[test]
    fn invalid_inputs_are_errors() {
        let p = three_groups();
        let budget = Budget::unlimited();
        assert!(matches!(
            satisfies_jr(&p, Committee::default()),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(satisfies_pjr(&p, Committee::from_indices([9])).is_err());
        assert!(AxiomChecker::prepare(&p, 0, Axiom::Jr, &budget).is_err());
        assert!(AxiomChecker::prepare(&p, 7, Axiom::Pjr, &budget).is_err());

        let many: Vec<(usize, Vec<u8>)> = (0..65).map(|v| (v, vec![0])).collect();
        let big = Profile::new(many).unwrap();
        let c = Committee::from_indices([0]);
        assert!(satisfies_jr(&big, c).unwrap());
        assert!(matches!(
            satisfies_ejr(&big, c, &budget),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn ejr_budget_exhaustion_is_reported() {
        let p = three_groups();
        let c = p.committee(["a", "c", "e"]).unwrap();
        let err = satisfies_ejr(&p, c, &Budget::steps(10)).unwrap_err();
        assert!(err.is_exhausted());
        let err = AxiomChecker::prepare(&p, 3, Axiom::Ejr, &Budget::steps(10)).unwrap_err();
        assert!(err.is_exhausted());
    }

    #[test]
    fn checker_stores_minimal_ejr_groups() {
        let p = three_groups();
        let checker = AxiomChecker::prepare(&p, 3, Axiom::Ejr, &Budget::unlimited()).unwrap();
        let tier1 = &checker.table().tiers()[0];
        assert_eq!(tier1.min_group_size, 3);
        assert_eq!(
            tier1.groups.iter().map(|g| g.voters.clone()).collect::<Vec<_>>(),
            vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]
        );
        assert!(checker.check(p.committee(["a", "c", "e"]).unwrap()));
        let v = checker
            .first_violation(p.committee(["a", "b", "c"]).unwrap())
            .unwrap();
        assert_eq!(v.axiom, Axiom::Ejr);
        assert_eq!(v.group.voters, vec![6, 7, 8]);
    }

    #[test]
    #[should_panic(expected = "prepared for")]
    fn checker_rejects_other_sizes() {
        let p = three_groups();
        let checker = AxiomChecker::prepare(&p, 3, Axiom::Jr, &Budget::unlimited()).unwrap();
        checker.check(p.committee(["a", "c"]).unwrap());
    }

    #[test]
    fn implications_and_checker_agree_on_random_profiles() {
        let mut rng = XorShiftRng::seed_from_u64(0xA11_07ED);
        let budget = Budget::unlimited();
        for _case in 0..25 {
            let n = rng.random_range(1..=7);
            let m = rng.random_range(2..=5);
            let p = random_approval_profile(&mut rng, n, m, 0.4).unwrap();
            let k = rng.random_range(1..=p.candidate_count());
            let checkers = Axiom::all()
                .map(|a| AxiomChecker::prepare(&p, k, a, &budget).unwrap());
            for c in committees(&p, k).unwrap() {
                let direct = Axiom::all().map(|a| satisfies(&p, c, a, &budget).unwrap());
                let [jr, pjr, ejr] = direct;
                assert!(!ejr || pjr, "EJR without PJR: {:?} {c:?}", p.approvals());
                assert!(!pjr || jr, "PJR without JR: {:?} {c:?}", p.approvals());
                for (checker, verdict) in checkers.iter().zip(direct) {
                    assert_eq!(checker.check(c), verdict, "{} on {c:?}", checker.axiom());
                }
            }
        }
    }
}
