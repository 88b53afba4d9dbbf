//! Drive a gate from stdin
//!
//! Every line read from stdin is one hit. When the gate fires, the
//! configured command runs (or, without a command, a `fired` line is
//! printed). On EOF the gate is drained before the summary is printed;
//! Ctrl-C at any point drops whatever is still pending.

use crate::settings;
use anyhow::{Context, Result};
use clap::Args;
use gate::{Completion, Gate, GateConfig, GateStatus};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Config file (default: $HITGATE_CONFIG or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Debounce window in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Window extension per extra hit in milliseconds (0 = disabled)
    #[arg(long)]
    pub rolling_bump_ms: Option<u64>,

    /// Ceiling on the debounce window in milliseconds (0 = none)
    #[arg(long)]
    pub rolling_max_ms: Option<u64>,

    /// Quiet period after each run in milliseconds
    #[arg(long)]
    pub cool_time_ms: Option<u64>,

    /// Do not replay hits that arrive while the command runs
    #[arg(long)]
    pub no_trailing: bool,

    /// Release the gate as soon as the command is spawned
    #[arg(long)]
    pub no_wait: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Command to run each time the gate fires
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the file configuration
    pub fn apply(&self, mut config: GateConfig) -> GateConfig {
        if let Some(ms) = self.delay_ms {
            config.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.rolling_bump_ms {
            config.rolling_bump = Duration::from_millis(ms);
        }
        if let Some(ms) = self.rolling_max_ms {
            config.rolling_max = Duration::from_millis(ms);
        }
        if let Some(ms) = self.cool_time_ms {
            config.cool_time = Duration::from_millis(ms);
        }
        if self.no_trailing {
            config.trailing = false;
        }
        if self.no_wait {
            config.wait = false;
        }
        config
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let path = settings::resolve_path(args.config.as_deref())?;
    let file = settings::load_from(&path)?;
    let config = args.apply(file.gate);
    config.validate().context("Invalid gate configuration")?;

    info!("Running gate with {:?}", config);

    let started = Instant::now();
    let gate = Gate::new(config.clone(), CommandJob::new(args.command.clone(), started));

    let mut interrupted = false;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(_) => gate.hit(),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
        }
    }

    if !interrupted {
        tokio::select! {
            status = gate.idle() => {
                return print_summary(&config, &status?, args.json);
            }
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    // Only a job that is already running is waited for
    info!("Interrupted; dropping pending cycle");
    gate.cancel()?;
    let status = gate.idle().await?;
    print_summary(&config, &status, args.json)
}

/// Runs the configured command, or prints a marker line without one
struct CommandJob {
    argv: Vec<String>,
    started: Instant,
    runs: u64,
}

impl CommandJob {
    fn new(argv: Vec<String>, started: Instant) -> Self {
        Self {
            argv,
            started,
            runs: 0,
        }
    }
}

impl gate::Job for CommandJob {
    fn run(&mut self, done: Completion) {
        self.runs += 1;
        let elapsed = self.started.elapsed().as_millis();
        println!("fired #{} at +{}ms", self.runs, elapsed);

        let Some((program, rest)) = self.argv.split_first() else {
            done.complete();
            return;
        };

        let spawned = tokio::process::Command::new(program)
            .args(rest)
            .stdin(std::process::Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let run = self.runs;
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if status.success() => {}
                        Ok(status) => warn!("Run {} exited with {}", run, status),
                        Err(e) => warn!("Failed to wait for run {}: {}", run, e),
                    }
                    done.complete();
                });
            }
            Err(e) => {
                warn!("Failed to spawn {}: {}", program, e);
                done.complete();
            }
        }
    }
}

fn print_summary(config: &GateConfig, status: &GateStatus, json: bool) -> Result<()> {
    let stats = &status.stats;

    if json {
        let summary = serde_json::json!({
            "config": config,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n{}", "Gate Summary".bold());
    println!("  {}: {}", "hits".cyan(), stats.hits);
    println!("  {}: {}", "cycles".cyan(), stats.cycles);
    println!("  {}: {}", "executions".cyan(), stats.executions);
    println!(
        "  {}: {} {}",
        "bumps".cyan(),
        stats.bumps,
        format!("({} capped)", stats.ceilings).dimmed()
    );
    println!("  {}: {}", "coalesced".cyan(), stats.coalesced);
    println!(
        "  {}: {} {}",
        "trailing_replays".cyan(),
        stats.trailing_replays,
        format!("({} dropped)", stats.dropped_trailing).dimmed()
    );

    Ok(())
}
