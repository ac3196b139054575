// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{
    adopt, is_quorum, Address, Ballot, Control, Envelope, Input, Membership, Message, Opinion,
    Peer,
};
use im::OrdMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

// As with the rest of this crate, the participant is an explicit state
// machine rather than an async task: every input is handled to completion
// by `step`, which pushes any resulting messages onto an outgoing vector.
// Whoever drives it (the tokio runtime, or the simulated network in the
// tests) owns delivery.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Idle,    // Not proposing: awaiting Launch, or held after an abort.
    Read,    // Proposing, phase 1: collecting gathers.
    Impose,  // Proposing, phase 2: collecting acks.
    Decided, // Finished with a value.
    Silent,  // Crashed.
}

/// A `Participant` acts as both proposer and acceptor in a single-decree
/// synod. It is stepped with `Input`s and emits `Envelope`s; it never
/// blocks and never fails. Once `Decided` or `Silent` it ignores all
/// further input.
///
/// Replies (Gather, Abort, Ack) carry no round number, so a proposer
/// correlates them by counting: each request sent to a peer is one
/// outstanding reply, and only the reply that settles the most recent
/// request to that peer is acted upon. With FIFO delivery per pair this
/// drops exactly the replies that belong to abandoned rounds.
#[derive(Clone, Debug)]
pub struct Participant {
    pub id: Peer,
    pub(crate) n: usize,
    pub(crate) alpha: f64,
    pub(crate) membership: Option<Membership>,

    // Acceptor state.
    pub(crate) read_ballot: Ballot,
    pub(crate) impose_ballot: Ballot,
    pub(crate) estimate: Option<bool>,

    // Proposer state, reset once per round.
    pub(crate) stage: Stage,
    pub(crate) proposal: Option<bool>,
    pub(crate) ballot: Ballot,
    pub(crate) ack_count: usize,
    pub(crate) quorum_state: OrdMap<Peer, Opinion>,
    pub(crate) outstanding: Vec<u64>,

    // Fault injection and leader election.
    pub(crate) fault_prone: bool,
    pub(crate) hold: bool,

    // History variables, for checking validity.
    pub(crate) proposed_history: Vec<bool>,
}

impl Participant {
    /// Creates participant `id` of a group of `n`. `alpha` is the chance of
    /// falling silent on each input once crashed, and belongs in `[0, 1]`:
    /// anything at or below 0 never silences, anything at or above 1 always
    /// does, and NaN never does. `RunConfig::validate` rejects the rest
    /// before the driver gets here.
    pub fn new(n: usize, id: Peer, alpha: f64) -> Self {
        debug_assert!(id < n);
        let seed = Ballot::seed(n, id);
        Participant {
            id,
            n,
            alpha,
            membership: None,

            read_ballot: Ballot::ZERO,
            impose_ballot: seed,
            estimate: None,

            stage: Stage::Idle,
            proposal: None,
            ballot: seed,
            ack_count: 0,
            quorum_state: OrdMap::new(),
            outstanding: vec![0; n],

            fault_prone: false,
            hold: false,

            proposed_history: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_decided(&self) -> bool {
        self.stage == Stage::Decided
    }

    pub fn is_silent(&self) -> bool {
        self.stage == Stage::Silent
    }

    /// Terminal stages drop every input.
    pub fn is_finished(&self) -> bool {
        self.is_decided() || self.is_silent()
    }

    /// The decided value, once there is one.
    pub fn decision(&self) -> Option<bool> {
        if self.is_decided() {
            self.estimate
        } else {
            None
        }
    }

    pub fn ballot(&self) -> Ballot {
        self.ballot
    }

    pub fn read_ballot(&self) -> Ballot {
        self.read_ballot
    }

    pub fn impose_ballot(&self) -> Ballot {
        self.impose_ballot
    }

    pub fn estimate(&self) -> Option<bool> {
        self.estimate
    }

    pub fn proposal(&self) -> Option<bool> {
        self.proposal
    }

    pub fn is_held(&self) -> bool {
        self.hold
    }

    /// Every value this participant ever started a round with, in order.
    pub fn proposed_history(&self) -> &[bool] {
        &self.proposed_history
    }

    pub fn rounds(&self) -> usize {
        self.proposed_history.len()
    }

    /// Consumes one input, pushing whatever it provokes onto `outgoing`.
    pub fn step<R>(&mut self, input: Input, rng: &mut R, outgoing: &mut Vec<Envelope>)
    where
        R: Rng + ?Sized,
    {
        if self.is_finished() {
            trace!("peer {} finished, dropping {:?}", self.id, input);
            return;
        }
        if self.fault_prone && rng.gen::<f64>() < self.alpha {
            debug!("peer {} went silent at {:?}", self.id, input);
            self.stage = Stage::Silent;
            return;
        }
        match input {
            Input::Membership(m) => {
                debug!("peer {} joined group of {}", self.id, m.peers.len());
                self.membership = Some(m);
            }
            Input::Control(c) => self.control(c, rng, outgoing),
            Input::Message { msg, .. } if self.membership.is_none() => {
                trace!("peer {} has no membership, dropping {:?}", self.id, msg);
            }
            Input::Message { from, msg } => self.receive(from, msg, rng, outgoing),
        }
    }

    fn control<R>(&mut self, c: Control, rng: &mut R, outgoing: &mut Vec<Envelope>)
    where
        R: Rng + ?Sized,
    {
        trace!("peer {} got {:?}", self.id, c);
        match c {
            Control::Launch if self.membership.is_none() => {
                trace!("peer {} has no membership, ignoring launch", self.id);
            }
            Control::Launch => {
                let value = rng.gen();
                self.propose(value, outgoing);
            }
            Control::Crash => self.fault_prone = true,
            Control::Hold => self.hold = true,
        }
    }

    fn receive<R>(&mut self, from: Peer, msg: Message, rng: &mut R, outgoing: &mut Vec<Envelope>)
    where
        R: Rng + ?Sized,
    {
        trace!("peer {} got {:?} from {}", self.id, msg, from);
        if msg.is_reply() && !self.settle_reply(from) {
            trace!("peer {} dropping stale reply from {}", self.id, from);
            return;
        }
        match msg {
            Message::Read { ballot } => {
                if self.read_ballot > ballot || self.impose_ballot > ballot {
                    self.reply(from, Message::Abort, outgoing);
                } else {
                    self.read_ballot = ballot;
                    let gather = Message::Gather {
                        ballot,
                        impose_ballot: self.impose_ballot,
                        estimate: self.estimate,
                    };
                    self.reply(from, gather, outgoing);
                }
            }
            Message::Impose { ballot, value } => {
                if self.read_ballot > ballot || self.impose_ballot > ballot {
                    self.reply(from, Message::Abort, outgoing);
                } else {
                    self.estimate = Some(value);
                    self.impose_ballot = ballot;
                    self.reply(from, Message::Ack, outgoing);
                }
            }
            Message::Gather {
                ballot,
                impose_ballot,
                estimate,
            } => self.gather(from, ballot, impose_ballot, estimate, outgoing),
            Message::Abort => self.abort(rng, outgoing),
            Message::Ack => self.ack(outgoing),
            Message::Decide { value } => self.decide(value, outgoing),
        }
    }

    // Returns true iff a reply from `from` answers our latest request to it.
    fn settle_reply(&mut self, from: Peer) -> bool {
        match self.outstanding.get_mut(from) {
            Some(pending) if *pending > 0 => {
                *pending -= 1;
                *pending == 0
            }
            _ => false,
        }
    }

    fn propose(&mut self, value: bool, outgoing: &mut Vec<Envelope>) {
        self.proposal = Some(value);
        // An accepted estimate is only ever replaced by a later Impose.
        if self.estimate.is_none() {
            self.estimate = Some(value);
        }
        self.ballot = self.ballot.next(self.n);
        self.quorum_state = OrdMap::new();
        self.ack_count = 0;
        self.stage = Stage::Read;
        self.proposed_history.push(value);
        debug!("peer {} proposing {} at {}", self.id, value, self.ballot);
        let read = Message::Read {
            ballot: self.ballot,
        };
        self.request(read, outgoing);
    }

    fn gather(
        &mut self,
        from: Peer,
        ballot: Ballot,
        impose_ballot: Ballot,
        estimate: Option<bool>,
        outgoing: &mut Vec<Envelope>,
    ) {
        if self.stage != Stage::Read || ballot != self.ballot {
            return;
        }
        if let Some(estimate) = estimate {
            self.quorum_state.insert(
                from,
                Opinion {
                    estimate,
                    impose_ballot,
                },
            );
        }
        if !is_quorum(self.quorum_state.len(), self.n) {
            return;
        }
        let value = match adopt(self.quorum_state.values()).or(self.proposal) {
            Some(v) => v,
            None => return,
        };
        if Some(value) != self.proposal {
            debug!("peer {} adopting {} from quorum", self.id, value);
        }
        self.proposal = Some(value);
        self.quorum_state = OrdMap::new();
        self.stage = Stage::Impose;
        debug!("peer {} imposing {} at {}", self.id, value, self.ballot);
        self.request(
            Message::Impose {
                ballot: self.ballot,
                value,
            },
            outgoing,
        );
    }

    fn abort<R>(&mut self, rng: &mut R, outgoing: &mut Vec<Envelope>)
    where
        R: Rng + ?Sized,
    {
        if self.stage != Stage::Read && self.stage != Stage::Impose {
            return;
        }
        if self.hold {
            debug!("peer {} aborted at {} while held, ceding", self.id, self.ballot);
            self.stage = Stage::Idle;
        } else {
            debug!("peer {} aborted at {}, retrying", self.id, self.ballot);
            let value = rng.gen();
            self.propose(value, outgoing);
        }
    }

    fn ack(&mut self, outgoing: &mut Vec<Envelope>) {
        if self.stage != Stage::Impose {
            return;
        }
        self.ack_count += 1;
        if !is_quorum(self.ack_count, self.n) {
            return;
        }
        self.ack_count = 0;
        if let Some(value) = self.proposal {
            debug!("peer {} has quorum of acks at {}", self.id, self.ballot);
            self.broadcast(Message::Decide { value }, outgoing);
        }
    }

    fn decide(&mut self, value: bool, outgoing: &mut Vec<Envelope>) {
        debug!("peer {} decided {}", self.id, value);
        self.estimate = Some(value);
        self.proposal = Some(value);
        self.stage = Stage::Decided;
        let decide = Message::Decide { value };
        self.broadcast(decide, outgoing);
        outgoing.push(Envelope {
            from: self.id,
            to: Address::Detector,
            msg: decide,
        });
    }

    fn reply(&self, to: Peer, msg: Message, outgoing: &mut Vec<Envelope>) {
        outgoing.push(Envelope {
            from: self.id,
            to: Address::Peer(to),
            msg,
        });
    }

    // Sends to every member, self included; nothing goes out before
    // membership arrives.
    fn broadcast(&self, msg: Message, outgoing: &mut Vec<Envelope>) {
        if let Some(m) = &self.membership {
            for &peer in m.peers.iter() {
                self.reply(peer, msg, outgoing);
            }
        }
    }

    // A broadcast that expects one reply per member.
    fn request(&mut self, msg: Message, outgoing: &mut Vec<Envelope>) {
        if let Some(m) = &self.membership {
            for &peer in m.peers.iter() {
                if let Some(pending) = self.outstanding.get_mut(peer) {
                    *pending += 1;
                }
                outgoing.push(Envelope {
                    from: self.id,
                    to: Address::Peer(peer),
                    msg,
                });
            }
        }
    }
}
