// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use clap::Parser;
use std::path::PathBuf;
use synod::{run, RunConfig, RunReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "synod")]
#[command(about = "Run single-decree synod consensus among crash-prone participants")]
struct Args {
    /// JSON file holding a run configuration; flags override its fields
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Number of participants
    #[arg(short, long)]
    n: Option<usize>,
    /// Number of participants to crash
    #[arg(short, long)]
    f: Option<usize>,
    /// Per-message probability that a crashed participant falls silent
    #[arg(short, long)]
    alpha: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_name = "MS")]
    settle_ms: Option<u64>,
    #[arg(long, value_name = "MS")]
    hold_delay_ms: Option<u64>,
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
    /// Participant left proposing after leader election
    #[arg(long)]
    leader: Option<usize>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn config(&self) -> synod::Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::load_from_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(n) = self.n {
            cfg.n = n;
        }
        if let Some(f) = self.f {
            cfg.f = f;
        }
        if let Some(alpha) = self.alpha {
            cfg.alpha = alpha;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(ms) = self.settle_ms {
            cfg.settle_ms = ms;
        }
        if let Some(ms) = self.hold_delay_ms {
            cfg.hold_delay_ms = ms;
        }
        if let Some(ms) = self.timeout_ms {
            cfg.timeout_ms = ms;
        }
        if self.leader.is_some() {
            cfg.leader = self.leader;
        }
        Ok(cfg)
    }
}

fn print_report(report: &RunReport) {
    println!(
        "n={} f={} leader={} crashed={:?}",
        report.n, report.f, report.leader, report.crashed
    );
    for p in report.participants.iter() {
        let decision = match p.decision {
            Some(v) => v.to_string(),
            None => "-".to_string(),
        };
        println!(
            "  participant {:>3}: {:<8} decision {:<5} ballot {:>6} rounds {}",
            p.id,
            format!("{:?}", p.stage),
            decision,
            p.ballot.0,
            p.rounds
        );
    }
    match (report.completed, report.agreement()) {
        (true, Some(v)) => println!(
            "decided {} ({}/{} participants)",
            v,
            report.decided(),
            report.n
        ),
        (true, None) => println!("completed without agreement"),
        (false, _) => println!(
            "run did not complete: {}/{} decisions",
            report.decided(),
            report.target
        ),
    }
}

#[tokio::main]
async fn main() -> synod::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config()?;
    info!("config: {:?}", config);

    let report = run(&config).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    if !report.completed {
        std::process::exit(2);
    }
    Ok(())
}
