// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{Error, Peer, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Parameters of one driven run: group size, how many participants to
/// crash and how eagerly, and the pauses the driver takes between phases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub n: usize,
    pub f: usize,
    pub alpha: f64,
    /// Fixes every random draw of the run; entropy when absent.
    pub seed: Option<u64>,
    pub settle_ms: u64,
    pub hold_delay_ms: u64,
    pub timeout_ms: u64,
    /// The participant left proposing after leader election. Picked at
    /// random among the non-crashed when absent.
    pub leader: Option<Peer>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            n: 10,
            f: 0,
            alpha: 0.5,
            seed: None,
            settle_ms: 50,
            hold_delay_ms: 1000,
            timeout_ms: 10_000,
            leader: None,
        }
    }
}

impl RunConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(Error::NoParticipants);
        }
        if self.f >= self.n {
            return Err(Error::TooManyFaults {
                f: self.f,
                n: self.n,
            });
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::CrashProbability(self.alpha));
        }
        if let Some(leader) = self.leader {
            if leader >= self.n {
                return Err(Error::LeaderOutOfRange { leader, n: self.n });
            }
        }
        Ok(())
    }

    /// How many decisions the detector waits for: every participant not
    /// chosen to crash.
    pub fn target(&self) -> usize {
        self.n - self.f
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
