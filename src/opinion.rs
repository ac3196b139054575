// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::Ballot;

/// `Participant`s report `Opinion`s to a proposer while it gathers a quorum:
/// the value they currently hold and the ballot under which they accepted
/// it. The proposer keeps one per responding peer for the current round.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Opinion {
    pub estimate: bool,
    pub impose_ballot: Ballot,
}

/// Picks the value a proposer is obliged to carry forward, if any: the
/// estimate reported under the highest impose ballot, provided that ballot
/// belongs to a round that actually ran. Seed ballots never constrain.
pub fn adopt<'a, I>(opinions: I) -> Option<bool>
where
    I: IntoIterator<Item = &'a Opinion>,
{
    opinions
        .into_iter()
        .filter(|o| o.impose_ballot.is_imposed())
        .max_by_key(|o| o.impose_ballot)
        .map(|o| o.estimate)
}
