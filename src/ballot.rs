// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `Ballot` orders competing proposal rounds; higher ballots win.
///
/// Every participant draws its ballots from a private arithmetic sequence
/// `i - n, i, i + n, i + 2n, ...` so two participants of the same group can
/// never propose under the same ballot. Ballots below zero are only ever
/// seeds: no round is ever run under one.
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Ballot(pub i64);

impl Ballot {
    pub const ZERO: Ballot = Ballot(0);

    /// The ballot participant `i` of `n` holds before its first round.
    pub fn seed(n: usize, i: usize) -> Ballot {
        Ballot(i as i64 - n as i64)
    }

    /// The ballot following this one in a group of `n`.
    pub fn next(self, n: usize) -> Ballot {
        Ballot(self.0 + n as i64)
    }

    /// True iff some round could actually have run under this ballot.
    pub fn is_imposed(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Strict majority of `n`. Any two such subsets of the same group intersect.
pub fn is_quorum(count: usize, n: usize) -> bool {
    count > n / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn seeds_are_negative_and_first_rounds_are_not() {
        for i in 0..7 {
            let seed = Ballot::seed(7, i);
            assert!(!seed.is_imposed());
            assert!(seed.next(7).is_imposed());
            assert_eq!(seed.next(7), Ballot(i as i64));
        }
    }

    #[test]
    fn sequences_never_collide() {
        let n = 5;
        let mut seen = BTreeSet::new();
        for i in 0..n {
            let mut b = Ballot::seed(n, i);
            for _ in 0..50 {
                b = b.next(n);
                assert!(seen.insert(b), "ballot {} drawn twice", b);
            }
        }
    }

    #[test]
    fn quorum_is_strict_majority() {
        assert!(is_quorum(1, 1));
        assert!(!is_quorum(1, 2));
        assert!(is_quorum(2, 2));
        assert!(is_quorum(2, 3));
        assert!(!is_quorum(2, 4));
        assert!(is_quorum(3, 5));
        assert!(!is_quorum(5, 10));
        assert!(is_quorum(6, 10));
    }
}
