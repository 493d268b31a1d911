//! Exact search for partitions of a voter group into disjoint cohesive subgroups.
//!
//! A subgroup is *cohesive* when all of its members approve at least one common candidate.
//! [`GroupPartitioner::can_partition`] decides whether a group splits into exactly `m`
//! disjoint cohesive subgroups of at least `s` voters each, using every voter.
//!
//! The search is a backtracking over subgroups, with three prunings that never change the
//! answer:
//! - a size bound: fewer than `m · s` remaining voters fails at once;
//! - symmetry breaking: the subgroup chosen at each level contains the lowest remaining
//!   voter (every voter must land somewhere, so nothing is lost);
//! - cohesion is monotone: once the running intersection of approvals is empty, no
//!   extension of the current subgroup can be cohesive.
//!
//! States proved infeasible are memoised on `(remaining voters, subgroups needed)`; the memo
//! is valid for as long as the minimum subgroup size stays the same.

use std::collections::HashSet;

use crate::budget::Meter;
use crate::error::Result;
use crate::profile::{Bits, bit, low_bits};

/// Largest voter group the partitioner accepts (voter sets are `u64` bitsets).
pub const MAX_PARTITION_VOTERS: usize = 64;

// ============================================================================
// GroupPartitioner
// ============================================================================

/// Exact partition oracle over one profile's approval sets.
///
/// Internally reuses a stack buffer and the failure memo across queries.
#[derive(Clone, Debug)]
pub struct GroupPartitioner<'p> {
    approvals: &'p [u64],
    /// Subgroups chosen on the current search path.
    stack: Vec<u64>,
    /// `(remaining, needed)` states known to be infeasible for `memo_min_size`.
    dead: HashSet<(u64, usize)>,
    memo_min_size: usize,
    examined: u64,
}

impl<'p> GroupPartitioner<'p> {
    /// Creates a partitioner over per-voter approval bitsets.
    ///
    /// # Panics
    /// Panics if there are more than [`MAX_PARTITION_VOTERS`] voters.
    pub fn new(approvals: &'p [u64]) -> Self {
        assert!(
            approvals.len() <= MAX_PARTITION_VOTERS,
            "partition search supports at most {MAX_PARTITION_VOTERS} voters"
        );
        Self {
            approvals,
            stack: Vec::new(),
            dead: HashSet::new(),
            memo_min_size: 0,
            examined: 0,
        }
    }

    /// Number of candidate subgroups examined since creation.
    pub fn subgroups_examined(&self) -> u64 {
        self.examined
    }

    /// Common approvals of every voter in `group` (empty for an empty group).
    pub fn common_approvals(&self, group: u64) -> u64 {
        if group == 0 {
            return 0;
        }
        Bits::of(group).fold(u64::MAX, |acc, v| acc & self.approvals[v])
    }

    /// Returns `true` iff `group` splits into exactly `num_subgroups` disjoint cohesive
    /// subgroups, each with at least `min_size` voters.
    ///
    /// # Errors
    /// Returns [`Error::ResourceExhausted`](crate::error::Error::ResourceExhausted) if the
    /// meter runs out first.
    ///
    /// # Panics
    /// Panics if `group` names voters outside the profile.
    pub fn can_partition(
        &mut self,
        group: u64,
        num_subgroups: usize,
        min_size: usize,
        meter: &Meter,
    ) -> Result<bool> {
        self.find_into(group, num_subgroups, min_size, meter)
    }

    /// Like [`GroupPartitioner::can_partition`], but returns the subgroups found.
    ///
    /// # Errors
    /// Same as [`GroupPartitioner::can_partition`].
    pub fn find_partition(
        &mut self,
        group: u64,
        num_subgroups: usize,
        min_size: usize,
        meter: &Meter,
    ) -> Result<Option<Vec<u64>>> {
        if self.find_into(group, num_subgroups, min_size, meter)? {
            Ok(Some(self.stack.clone()))
        } else {
            Ok(None)
        }
    }

    fn find_into(
        &mut self,
        group: u64,
        num_subgroups: usize,
        min_size: usize,
        meter: &Meter,
    ) -> Result<bool> {
        assert!(
            group & !low_bits(self.approvals.len()) == 0,
            "voter group refers to voters outside the profile"
        );
        // Empty subgroups have no common approval, so they are never cohesive.
        let min_size = min_size.max(1);
        if self.memo_min_size != min_size {
            self.dead.clear();
            self.memo_min_size = min_size;
        }
        self.stack.clear();
        self.search(group, num_subgroups, min_size, meter)
    }

    fn search(&mut self, remaining: u64, needed: usize, min_size: usize, meter: &Meter) -> Result<bool> {
        if needed == 0 {
            return Ok(remaining == 0);
        }
        let count = remaining.count_ones() as usize;
        if count < needed * min_size {
            return Ok(false);
        }
        if needed == 1 {
            // The last subgroup must take everyone left.
            self.examined += 1;
            meter.tick()?;
            if self.common_approvals(remaining) != 0 {
                self.stack.push(remaining);
                return Ok(true);
            }
            return Ok(false);
        }
        if self.dead.contains(&(remaining, needed)) {
            return Ok(false);
        }

        let anchor = remaining.trailing_zeros() as usize;
        if self.approvals[anchor] == 0 {
            // A voter approving nobody fits in no cohesive subgroup.
            self.dead.insert((remaining, needed));
            return Ok(false);
        }
        let pool = remaining & !bit(anchor);
        let max_size = count - (needed - 1) * min_size;
        for size in min_size..=max_size {
            let chosen = bit(anchor);
            let common = self.approvals[anchor];
            if self.extend(chosen, common, pool, size, remaining, needed, min_size, meter)? {
                return Ok(true);
            }
        }

        self.dead.insert((remaining, needed));
        Ok(false)
    }

    /// Grows the subgroup `chosen` (cohesive, with shared approvals `common`) to exactly
    /// `size` voters drawn from `pool`, recursing on the remainder once it is complete.
    #[allow(clippy::too_many_arguments)]
    fn extend(
        &mut self,
        chosen: u64,
        common: u64,
        pool: u64,
        size: usize,
        remaining: u64,
        needed: usize,
        min_size: usize,
        meter: &Meter,
    ) -> Result<bool> {
        let have = chosen.count_ones() as usize;
        if have == size {
            self.examined += 1;
            meter.tick()?;
            self.stack.push(chosen);
            if self.search(remaining & !chosen, needed - 1, min_size, meter)? {
                return Ok(true);
            }
            self.stack.pop();
            return Ok(false);
        }
        if (pool.count_ones() as usize) < size - have {
            return Ok(false);
        }

        let mut rest = pool;
        while rest != 0 {
            let v = rest.trailing_zeros() as usize;
            rest &= rest - 1;
            let shared = common & self.approvals[v];
            if shared == 0 {
                continue;
            }
            if self.extend(chosen | bit(v), shared, rest, size, remaining, needed, min_size, meter)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Budget;
    use crate::error::Error;
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    fn mask(voters: &[usize]) -> u64 {
        voters.iter().fold(0, |m, &v| m | bit(v))
    }

    /// Reference: try every assignment of voters to `m` labelled subgroups.
    fn brute_can_partition(approvals: &[u64], group: u64, m: usize, s: usize) -> bool {
        let voters: Vec<usize> = Bits::of(group).collect();
        if m == 0 {
            return voters.is_empty();
        }
        let s = s.max(1);
        let total = m.pow(voters.len() as u32);
        for code in 0..total {
            let mut parts = vec![0u64; m];
            let mut c = code;
            for &v in &voters {
                parts[c % m] |= bit(v);
                c /= m;
            }
            let ok = parts.iter().all(|&p| {
                p.count_ones() as usize >= s
                    && Bits::of(p).fold(u64::MAX, |acc, v| acc & approvals[v]) != 0
            });
            if ok {
                return true;
            }
        }
        false
    }

    #[test]
    fn pairs_split_into_three() {
        // {v0,v1}->a, {v2,v3}->b, {v4,v5}->c
        let approvals = [0b001, 0b001, 0b010, 0b010, 0b100, 0b100];
        let mut p = GroupPartitioner::new(&approvals);
        let meter = Meter::unlimited();
        assert!(p.can_partition(0b11_1111, 3, 2, &meter).unwrap());
        assert!(!p.can_partition(0b11_1111, 4, 2, &meter).unwrap());
        assert!(!p.can_partition(0b11_1111, 2, 2, &meter).unwrap());
        assert!(p.can_partition(0b00_1111, 2, 2, &meter).unwrap());
        assert!(!p.can_partition(0b00_0111, 1, 1, &meter).unwrap());
    }

    #[test]
    fn find_partition_returns_disjoint_cohesive_cover() {
        let approvals = [0b011, 0b001, 0b110, 0b100, 0b010, 0b101];
        let mut p = GroupPartitioner::new(&approvals);
        let meter = Meter::unlimited();
        let group = 0b11_1111;
        let parts = p.find_partition(group, 3, 2, &meter).unwrap().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().fold(0, |acc, &s| acc | s), group);
        for (i, &a) in parts.iter().enumerate() {
            assert!(a.count_ones() >= 2);
            assert_ne!(p.common_approvals(a), 0);
            for &b in &parts[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }

    #[test]
    fn undersized_group_fails_without_enumeration() {
        let approvals = [u64::MAX; 10];
        let mut p = GroupPartitioner::new(&approvals);
        let meter = Meter::unlimited();
        // 9 voters < 4 * 3
        assert!(!p.can_partition(mask(&[0, 1, 2, 3, 4, 5, 6, 7, 8]), 4, 3, &meter).unwrap());
        assert_eq!(p.subgroups_examined(), 0);
        assert_eq!(meter.steps(), 0);
    }

    #[test]
    fn zero_subgroups_only_for_empty_group() {
        let approvals = [1, 1];
        let mut p = GroupPartitioner::new(&approvals);
        let meter = Meter::unlimited();
        assert!(p.can_partition(0, 0, 1, &meter).unwrap());
        assert!(!p.can_partition(0b11, 0, 1, &meter).unwrap());
    }

    #[test]
    fn matches_bruteforce_on_random_groups() {
        let mut rng = XorShiftRng::seed_from_u64(0x5EED_1234);
        for _case in 0..60 {
            let n = rng.random_range(1..=8);
            let approvals: Vec<u64> = (0..n)
                .map(|_| {
                    let mut a = 0u64;
                    for c in 0..4 {
                        if rng.random_bool(0.4) {
                            a |= bit(c);
                        }
                    }
                    a
                })
                .collect();
            let mut p = GroupPartitioner::new(&approvals);
            let meter = Meter::unlimited();
            let group = rng.random_range(0..(1u64 << n));
            for m in 0..=3 {
                for s in 1..=3 {
                    let expect = brute_can_partition(&approvals, group, m, s);
                    let got = p.can_partition(group, m, s, &meter).unwrap();
                    assert_eq!(expect, got, "approvals={approvals:?} group={group:b} m={m} s={s}");
                }
            }
        }
    }

    #[test]
    fn budget_exhaustion_is_not_a_verdict() {
        // The last voter approves nothing, so every branch fails only at the final
        // subgroup and the search has to walk many of them.
        let mut approvals = vec![1u64; 12];
        approvals[11] = 0;
        let mut p = GroupPartitioner::new(&approvals);
        let meter = Budget::steps(5).meter();
        let err = p.can_partition(low_bits(12), 3, 3, &meter).unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted { .. }));
    }

    #[test]
    #[should_panic(expected = "outside the profile")]
    fn foreign_voters_are_a_programming_error() {
        let approvals = [1, 1];
        let mut p = GroupPartitioner::new(&approvals);
        let _ = p.can_partition(0b100, 1, 1, &Meter::unlimited());
    }
}
