// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Drives a group of `Participant`s as tokio tasks, one per participant plus
//! one for the `Detector`, each owning its state and an unbounded mailbox.
//! The driver wires the group together, launches it, crashes `f` members,
//! and after a pause holds everyone but a single leader.

use crate::{
    Address, Ballot, Control, Detector, Envelope, Input, Membership, Participant, Peer, Result,
    RunConfig, Stage,
};
use futures::future::join_all;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, trace, warn};

type Mailbox = mpsc::UnboundedSender<Mail>;

/// Live handles for everyone a participant may address.
#[derive(Clone)]
struct Directory {
    peers: Vec<Mailbox>,
    detector: mpsc::UnboundedSender<Envelope>,
}

enum Mail {
    Membership(Directory),
    Input(Input),
}

/// Final state of one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParticipantReport {
    pub id: Peer,
    pub stage: Stage,
    pub decision: Option<bool>,
    pub ballot: Ballot,
    pub rounds: usize,
    pub proposed: Vec<bool>,
    pub held: bool,
}

impl From<&Participant> for ParticipantReport {
    fn from(p: &Participant) -> Self {
        ParticipantReport {
            id: p.id,
            stage: p.stage(),
            decision: p.decision(),
            ballot: p.ballot(),
            rounds: p.rounds(),
            proposed: p.proposed_history().to_vec(),
            held: p.is_held(),
        }
    }
}

/// What a run came to. `completed` is false when the detector's target was
/// never reached before the timeout; that is an outcome, not an error.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub n: usize,
    pub f: usize,
    pub target: usize,
    pub completed: bool,
    pub leader: Peer,
    pub crashed: Vec<Peer>,
    pub participants: Vec<ParticipantReport>,
}

impl RunReport {
    pub fn decisions(&self) -> impl Iterator<Item = bool> + '_ {
        self.participants.iter().filter_map(|p| p.decision)
    }

    pub fn decided(&self) -> usize {
        self.decisions().count()
    }

    /// The value everyone who decided agreed on, if anyone decided and
    /// nobody disagreed.
    pub fn agreement(&self) -> Option<bool> {
        if self.decisions().all_equal() {
            self.decisions().next()
        } else {
            None
        }
    }

    /// True iff every decided value was at some point proposed.
    pub fn is_valid(&self) -> bool {
        self.decisions().all(|v| {
            self.participants
                .iter()
                .any(|p| p.proposed.contains(&v))
        })
    }
}

/// Per-participant random streams, reproducible when the run is seeded.
pub fn rng_for(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

/// Chooses the `f` participants to crash and the one left proposing after
/// leader election. The two never overlap.
pub fn pick_roles<R: rand::Rng + ?Sized>(config: &RunConfig, rng: &mut R) -> (Vec<Peer>, Peer) {
    let mut order: Vec<Peer> = (0..config.n).collect();
    order.shuffle(rng);
    let leader = match config.leader {
        Some(leader) => {
            order.retain(|&p| p != leader);
            leader
        }
        None => order[config.f],
    };
    let mut crashed = order[..config.f].to_vec();
    crashed.sort_unstable();
    (crashed, leader)
}

fn post(mailbox: &Mailbox, mail: Mail) {
    if mailbox.send(mail).is_err() {
        trace!("mailbox closed, dropping mail");
    }
}

fn route(directory: &Directory, outgoing: &mut Vec<Envelope>) {
    for env in outgoing.drain(..) {
        match env.to {
            Address::Peer(to) => match directory.peers.get(to) {
                Some(mailbox) => post(mailbox, Mail::Input(env.input())),
                None => trace!("no such peer {}, dropping {:?}", to, env),
            },
            Address::Detector => {
                if directory.detector.send(env).is_err() {
                    trace!("detector gone, dropping {:?}", env);
                }
            }
        }
    }
}

async fn participant_task(
    mut participant: Participant,
    mut rng: StdRng,
    mut inbox: mpsc::UnboundedReceiver<Mail>,
    mut shutdown: watch::Receiver<bool>,
) -> Participant {
    let mut directory: Option<Directory> = None;
    let mut outgoing = Vec::new();
    loop {
        let mail = tokio::select! {
            _ = shutdown.changed() => break,
            mail = inbox.recv() => match mail {
                Some(mail) => mail,
                None => break,
            },
        };
        let input = match mail {
            Mail::Membership(dir) => {
                let membership = Membership::of_size(dir.peers.len());
                directory = Some(dir);
                Input::Membership(membership)
            }
            Mail::Input(input) => input,
        };
        participant.step(input, &mut rng, &mut outgoing);
        match &directory {
            Some(dir) => route(dir, &mut outgoing),
            None => outgoing.clear(),
        }
    }
    trace!("participant {} task exiting", participant.id);
    participant
}

async fn detector_task(
    mut detector: Detector,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    done: oneshot::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) -> Detector {
    let mut done = Some(done);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            env = inbox.recv() => match env {
                Some(env) => {
                    if detector.observe(&env) {
                        info!("{} participants decided, run complete", detector.count());
                        if let Some(done) = done.take() {
                            let _ = done.send(());
                        }
                    }
                }
                None => break,
            },
        }
    }
    detector
}

/// Waits for the detector's signal until `deadline`. A resolved receiver is
/// taken out of `done`, so it is never polled again.
async fn await_completion(done: &mut Option<oneshot::Receiver<()>>, deadline: Instant) -> bool {
    let rx = match done.as_mut() {
        Some(rx) => rx,
        None => return false,
    };
    let waited = timeout_at(deadline, rx).await;
    match waited {
        Ok(Ok(())) => {
            *done = None;
            true
        }
        Ok(Err(_)) => {
            warn!("detector went away before signalling completion");
            *done = None;
            false
        }
        Err(_) => false,
    }
}

/// Runs one group to completion or timeout.
pub async fn run(config: &RunConfig) -> Result<RunReport> {
    config.validate()?;
    let n = config.n;
    let mut driver_rng = rng_for(config.seed, n as u64);
    info!("system started with n={} f={} alpha={}", n, config.f, config.alpha);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (detector_tx, detector_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();
    let mut done_rx = Some(done_rx);
    let detector = tokio::spawn(detector_task(
        Detector::new(config.target()),
        detector_rx,
        done_tx,
        shutdown_rx.clone(),
    ));

    let mut mailboxes = Vec::with_capacity(n);
    let mut tasks = Vec::with_capacity(n);
    for i in 0..n {
        let (tx, rx) = mpsc::unbounded_channel();
        mailboxes.push(tx);
        tasks.push(tokio::spawn(participant_task(
            Participant::new(n, i, config.alpha),
            rng_for(config.seed, i as u64),
            rx,
            shutdown_rx.clone(),
        )));
    }

    let directory = Directory {
        peers: mailboxes.clone(),
        detector: detector_tx,
    };
    for mailbox in mailboxes.iter() {
        post(mailbox, Mail::Membership(directory.clone()));
    }
    drop(directory);
    sleep(config.settle()).await;

    let deadline = Instant::now() + config.timeout();
    for mailbox in mailboxes.iter() {
        post(mailbox, Mail::Input(Input::Control(Control::Launch)));
    }

    let (crashed, leader) = pick_roles(config, &mut driver_rng);
    for &i in crashed.iter() {
        debug!("crashing participant {}", i);
        post(&mailboxes[i], Mail::Input(Input::Control(Control::Crash)));
    }

    let hold_at = Instant::now() + config.hold_delay();
    let mut completed = await_completion(&mut done_rx, hold_at.min(deadline)).await;
    if !completed && done_rx.is_some() && Instant::now() < deadline {
        info!("start leader election, leader is {}", leader);
        for (i, mailbox) in mailboxes.iter().enumerate() {
            if i != leader {
                post(mailbox, Mail::Input(Input::Control(Control::Hold)));
            }
        }
        completed = await_completion(&mut done_rx, deadline).await;
    }

    let _ = shutdown_tx.send(true);
    let mut participants = Vec::with_capacity(n);
    for joined in join_all(tasks).await {
        participants.push(ParticipantReport::from(&joined?));
    }
    let detector = detector.await?;
    if !completed {
        warn!(
            "run did not complete: {}/{} participants decided",
            detector.count(),
            detector.target()
        );
    }

    Ok(RunReport {
        n,
        f: config.f,
        target: detector.target(),
        completed,
        leader,
        crashed,
        participants,
    })
}
