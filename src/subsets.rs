//! Lexicographic k-subset enumeration over bitmasks.

use crate::profile::{Bits, bit};

/// Iterates all `k`-element subsets of the set bits of a pool mask, in lexicographic order of
/// their sorted elements (the order of Python's `itertools.combinations`).
///
/// Stateless apart from the cursor: cloning restarts nothing, and a fresh iterator over the
/// same pool always yields the same sequence.
#[derive(Clone, Debug)]
pub struct Combinations {
    elements: Vec<usize>,
    cursor: Vec<usize>,
    done: bool,
}

impl Combinations {
    /// Subsets of size `k` drawn from the bits of `pool`.
    pub fn new(pool: u64, k: usize) -> Self {
        let elements: Vec<usize> = Bits::of(pool).collect();
        let done = k > elements.len();
        Self {
            elements,
            cursor: (0..k).collect(),
            done,
        }
    }

    /// Subsets of size `k` of `{0, .., n-1}`.
    pub fn of_range(n: usize, k: usize) -> Self {
        debug_assert!(n <= 64, "bitmask subsets need n <= 64");
        Self::new(crate::profile::low_bits(n), k)
    }

    /// Number of subsets this iterator yields in total, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        binomial(self.elements.len(), self.cursor.len())
    }

    fn current(&self) -> u64 {
        self.cursor
            .iter()
            .fold(0u64, |acc, &i| acc | bit(self.elements[i]))
    }

    fn advance(&mut self) {
        let n = self.elements.len();
        let k = self.cursor.len();
        let mut i = k;
        while i > 0 {
            i -= 1;
            if self.cursor[i] < n - k + i {
                self.cursor[i] += 1;
                for j in (i + 1)..k {
                    self.cursor[j] = self.cursor[j - 1] + 1;
                }
                return;
            }
        }
        self.done = true;
    }
}

impl Iterator for Combinations {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.done {
            return None;
        }
        let out = self.current();
        self.advance();
        Some(out)
    }
}

/// `n choose k`, saturating at `u64::MAX`.
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}
