// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use thiserror::Error;

/// Errors only arise around a run, never inside the protocol: crashes,
/// aborted rounds and lost quorums are all ordinary participant states.
#[derive(Error, Debug)]
pub enum Error {
    #[error("A run needs at least one participant")]
    NoParticipants,
    #[error("Cannot crash {f} of {n} participants and still leave a proposer")]
    TooManyFaults { f: usize, n: usize },
    #[error("Crash probability must lie in [0, 1], got {0}")]
    CrashProbability(f64),
    #[error("Leader index {leader} is out of range for {n} participants")]
    LeaderOutOfRange { leader: usize, n: usize },
    #[error("A participant task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("We experienced an IO error")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode or decode JSON")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
