// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

/*!
 * This crate implements the single-decree "synod" protocol at the heart of
 * Paxos: a group of `n` participants agreeing on one boolean despite crash
 * faults and competing proposers.
 *
 *   - Every participant is both a proposer and an acceptor. A proposer
 *     runs rounds under ballots drawn from a private sequence
 *     (`i - n`, then steps of `n`), so no two participants ever share one.
 *
 *   - A round has two phases, each needing replies from a strict majority:
 *     `Read`/`Gather` collects promises and any previously accepted value
 *     (which the proposer must then carry forward), and `Impose`/`Ack`
 *     gets the value accepted. A proposer that completes both broadcasts
 *     `Decide`, and every participant that hears it decides and
 *     re-broadcasts it.
 *
 *   - Any acceptor that has promised or accepted a higher ballot answers
 *     `Abort`, upon which the proposer immediately retries with a fresh
 *     ballot and value, unless it has been told to `Hold`.
 *
 * The protocol guarantees agreement and validity but, as ever, not
 * termination: dueling proposers can starve each other indefinitely. The
 * driver in `runtime` breaks the tie the usual way, by electing a leader:
 * after a pause it holds every participant but one.
 *
 * Crash faults are injected rather than suffered: a participant told to
 * `Crash` becomes fault-prone, and from then on goes permanently silent
 * with probability `alpha` on each message it handles.
 *
 * The `Participant` is a plain state machine, stepped with one `Input` at
 * a time and emitting `Envelope`s; it does no IO of its own. `runtime`
 * runs a group of them as tokio tasks. A `Detector` counts the distinct
 * participants that report deciding and signals completion once enough
 * have.
 *
 * ## Reference
 *
 * Leslie Lamport. The Part-Time Parliament. ACM Transactions on Computer
 * Systems 16, 2 (May 1998), 133-169.
 */

mod ballot;
mod config;
mod detector;
mod error;
mod message;
mod opinion;
mod participant;
pub mod runtime;

/// Participants are identified by their index in the group.
pub type Peer = usize;

pub use ballot::{is_quorum, Ballot};
pub use config::RunConfig;
pub use detector::Detector;
pub use error::{Error, Result};
pub use message::{Address, Control, Envelope, Input, Membership, Message};
pub use opinion::{adopt, Opinion};
pub use participant::{Participant, Stage};
pub use runtime::{run, ParticipantReport, RunReport};


#[cfg(test)]
mod quickcheck_tests;
