// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::tests::{init_tracing, simulate};
use crate::{adopt, Ballot, Opinion, Peer};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;

// Small groups keep each simulated run cheap; the interesting variety
// comes from the seed, which fixes every coin flip and delivery order.
fn group_size(n: u8) -> usize {
    1 + (n as usize % 7)
}

fn roles(n: usize, f: usize, seed: u64) -> (Vec<Peer>, Peer) {
    let mut order: Vec<Peer> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let mut crashed = order[..f].to_vec();
    crashed.sort_unstable();
    (crashed, order[f])
}

#[quickcheck]
fn agreement_and_validity(seed: u64, n: u8, hold_after: u16) -> bool {
    init_tracing();
    let n = group_size(n);
    let (_, leader) = roles(n, 0, seed);
    let net = simulate(n, &[], leader, hold_after as usize % 2000, seed);
    net.completed && net.agreement() && net.validity() && net.decisions().len() == n
}

#[quickcheck]
fn tolerates_any_minority_of_crashes(seed: u64, n: u8, f: u8) -> TestResult {
    let n = group_size(n);
    let f = f as usize % n;
    let (crashed, leader) = roles(n, f, seed);
    let net = simulate(n, &crashed, leader, 300, seed);
    if !net.agreement() || !net.validity() {
        return TestResult::failed();
    }
    if 2 * f < n {
        // A majority survives: everyone who did not crash decides.
        let survivors_decided = (0..n)
            .filter(|i| !crashed.contains(i))
            .all(|i| net.participant(i).is_decided());
        TestResult::from_bool(net.completed && survivors_decided)
    } else {
        // No majority is left to answer; the run stalls quietly.
        TestResult::from_bool(!net.completed && net.decisions().is_empty() && net.is_quiescent())
    }
}

#[quickcheck]
fn deciders_notify_detector_exactly_once(seed: u64, n: u8) -> bool {
    let n = group_size(n);
    let net = simulate(n, &[], 0, 100, seed);
    net.notifications.len() == net.decisions().len()
        && net.notifications.values().all(|&count| count == 1)
}

#[quickcheck]
fn ballots_never_collide(n: u8, rounds: u8) -> bool {
    let n = group_size(n);
    let mut seen = BTreeSet::new();
    for i in 0..n {
        let mut b = Ballot::seed(n, i);
        for _ in 0..rounds {
            b = b.next(n);
            if !seen.insert(b) {
                return false;
            }
        }
    }
    true
}

#[quickcheck]
fn proposers_never_share_a_ballot(seed: u64, n: u8) -> bool {
    let n = group_size(n);
    let net = simulate(n, &[], n - 1, 500, seed);
    net.reads.values().all(|senders| senders.len() == 1)
}

#[quickcheck]
fn adopts_the_most_recent_acceptance(reported: Vec<(bool, i8)>) -> bool {
    let opinions: Vec<Opinion> = reported
        .iter()
        .map(|&(estimate, b)| Opinion {
            estimate,
            impose_ballot: Ballot(b as i64),
        })
        .collect();
    let highest = opinions
        .iter()
        .map(|o| o.impose_ballot)
        .filter(|b| b.is_imposed())
        .max();
    match (adopt(&opinions), highest) {
        (None, None) => true,
        (Some(v), Some(b)) => opinions
            .iter()
            .any(|o| o.impose_ballot == b && o.estimate == v),
        _ => false,
    }
}
