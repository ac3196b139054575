// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{Ballot, Peer};
use serde::{Deserialize, Serialize};

/// Protocol messages exchanged between participants (and, for `Decide`,
/// sent on to the termination detector). Read/Impose are requests; Gather,
/// Abort and Ack are the replies to them, routed back to the requester;
/// Decide is broadcast.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Read {
        ballot: Ballot,
    },
    Gather {
        ballot: Ballot,
        impose_ballot: Ballot,
        estimate: Option<bool>,
    },
    Abort,
    Impose {
        ballot: Ballot,
        value: bool,
    },
    Ack,
    Decide {
        value: bool,
    },
}

impl Message {
    /// True for the messages a participant sends in answer to a request.
    pub fn is_reply(&self) -> bool {
        matches!(self, Message::Gather { .. } | Message::Abort | Message::Ack)
    }
}

/// Messages from the driver rather than from another participant.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    /// Begin proposing.
    Launch,
    /// Become fault-prone.
    Crash,
    /// Stop initiating new proposals.
    Hold,
}

/// The group a participant belongs to. The runtime layers real mailboxes on
/// top of this; the state machine only needs the identities it broadcasts to.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub peers: Vec<Peer>,
}

impl Membership {
    pub fn of_size(n: usize) -> Self {
        Membership {
            peers: (0..n).collect(),
        }
    }
}

/// Everything a `Participant` can be stepped with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Membership(Membership),
    Control(Control),
    Message { from: Peer, msg: Message },
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Address {
    Peer(Peer),
    Detector,
}

/// A message in flight. Delivery is the responsibility of whoever steps
/// the participants; it is assumed FIFO per (from, to) pair.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Peer,
    pub to: Address,
    pub msg: Message,
}

impl Envelope {
    /// The input the addressee should be stepped with.
    pub fn input(&self) -> Input {
        Input::Message {
            from: self.from,
            msg: self.msg,
        }
    }
}
