// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{Address, Envelope, Message, Peer};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Counts the distinct participants that have reported a decision and
/// fires, once, when `target` of them have. A run whose faults leave fewer
/// than `target` deciders simply never fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detector {
    target: usize,
    decided: BTreeMap<Peer, bool>,
    fired: bool,
}

impl Detector {
    pub fn new(target: usize) -> Self {
        Detector {
            target,
            decided: BTreeMap::new(),
            fired: false,
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn count(&self) -> usize {
        self.decided.len()
    }

    pub fn is_complete(&self) -> bool {
        self.fired
    }

    /// The value each reporting participant decided.
    pub fn decisions(&self) -> &BTreeMap<Peer, bool> {
        &self.decided
    }

    /// Records one notification. Returns true exactly once: on the
    /// notification that brings the count of distinct deciders to target.
    pub fn observe(&mut self, env: &Envelope) -> bool {
        let value = match (env.to, env.msg) {
            (Address::Detector, Message::Decide { value }) => value,
            _ => {
                trace!("detector ignoring {:?}", env);
                return false;
            }
        };
        if self.decided.insert(env.from, value).is_some() {
            trace!("detector already heard from {}", env.from);
            return false;
        }
        debug!(
            "detector heard {} decide {} ({}/{})",
            env.from,
            value,
            self.count(),
            self.target
        );
        if !self.fired && self.count() >= self.target {
            self.fired = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(from: Peer, value: bool) -> Envelope {
        Envelope {
            from,
            to: Address::Detector,
            msg: Message::Decide { value },
        }
    }

    #[test]
    fn fires_once_at_target() {
        let mut d = Detector::new(2);
        assert!(!d.observe(&decide(0, true)));
        assert!(d.observe(&decide(2, true)));
        assert!(d.is_complete());
        assert!(!d.observe(&decide(1, true)));
        assert_eq!(d.count(), 3);
    }

    #[test]
    fn duplicates_are_not_counted() {
        let mut d = Detector::new(2);
        assert!(!d.observe(&decide(0, true)));
        assert!(!d.observe(&decide(0, true)));
        assert_eq!(d.count(), 1);
        assert!(!d.is_complete());
    }

    #[test]
    fn only_decisions_count() {
        let mut d = Detector::new(1);
        let stray = Envelope {
            from: 0,
            to: Address::Detector,
            msg: Message::Ack,
        };
        assert!(!d.observe(&stray));
        assert_eq!(d.count(), 0);
    }

    #[test]
    fn zero_target_fires_on_first_report() {
        let mut d = Detector::new(0);
        assert!(d.observe(&decide(4, false)));
        assert_eq!(d.decisions().get(&4), Some(&false));
    }
}
