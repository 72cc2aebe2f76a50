//! Gauntlet CLI
//!
//! Starts a soak run against a deployed protocol, either in-process with a
//! single worker or as a set of supervised worker processes.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use gauntlet_config::{GauntletConfig, MonitoringConfig};
use std::path::PathBuf;
use std::sync::Arc;
use swarm::shutdown::spawn_listener;
use swarm::{available_cpus, bounded_workers, Engine, Supervisor, Worker, WorkerSettings};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(about = "Stochastic load generator for protocol soak testing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a run
    Start {
        /// Worker processes (at most half the CPUs)
        #[arg(short, long)]
        workers: Option<usize>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Run one worker in this process (started by `start`)
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        index: usize,

        #[command(flatten)]
        run: RunArgs,
    },
}

/// Settings shared by the supervisor and its workers
#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Top accounts up from the funding source when they run dry
    #[arg(long)]
    fund: bool,

    /// Target network (local or live)
    #[arg(long)]
    network: Option<String>,

    /// RNG seed; each worker offsets it by its index
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many rounds
    #[arg(long)]
    rounds: Option<u64>,

    /// Pause between rounds (e.g. "500ms", "2s")
    #[arg(long)]
    round_interval: Option<humantime::Duration>,
}

impl RunArgs {
    fn load(&self) -> anyhow::Result<GauntletConfig> {
        let mut config = match &self.config {
            Some(path) => GauntletConfig::from_file_with_env(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => GauntletConfig::from_env()?,
        };

        if self.fund {
            config.funding.enabled = true;
        }
        if let Some(network) = &self.network {
            config.network.mode = network.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(seed) = self.seed {
            config.scheduler.seed = Some(seed);
        }
        if let Some(rounds) = self.rounds {
            config.scheduler.max_rounds = Some(rounds);
        }
        if let Some(interval) = &self.round_interval {
            config.scheduler.round_interval_ms = interval.as_millis() as u64;
        }

        config.validate()?;
        Ok(config)
    }

    /// The same flags, for a worker process
    fn forward(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.config {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        if self.fund {
            args.push("--fund".to_string());
        }
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        if let Some(seed) = self.seed {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        if let Some(rounds) = self.rounds {
            args.push("--rounds".to_string());
            args.push(rounds.to_string());
        }
        if let Some(interval) = &self.round_interval {
            args.push("--round-interval".to_string());
            args.push(interval.to_string());
        }
        args
    }
}

fn init_tracing(monitoring: &MonitoringConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&monitoring.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if monitoring.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_worker(index: usize, mut config: GauntletConfig, watch_stdin: bool) -> anyhow::Result<()> {
    config.scheduler.seed = config.scheduler.seed.map(|s| s.wrapping_add(index as u64));

    let shutdown = CancellationToken::new();
    let listener = spawn_listener(shutdown.clone(), watch_stdin);

    let settings = WorkerSettings::from_config(index, &config.scheduler, &config.monitoring)?;
    let engine = Arc::new(Engine::connect(&config).await?);
    let report = Worker::new(settings, engine, shutdown.clone()).run().await;

    shutdown.cancel();
    let _ = listener.await;

    let report = report?;
    tracing::info!(
        "SWARM: Worker {} done: {} rounds, {} items, peak {} in flight",
        index,
        report.rounds,
        report.dispatched,
        report.peak_in_flight
    );
    Ok(())
}

async fn run_supervisor(workers: usize, run: &RunArgs, config: &GauntletConfig) -> anyhow::Result<()> {
    let program = std::env::current_exe().context("locating the gauntlet binary")?;
    let shutdown = CancellationToken::new();
    let listener = spawn_listener(shutdown.clone(), false);

    let grace = std::time::Duration::from_millis(config.scheduler.shutdown_grace_ms);
    let exits = Supervisor::new(workers, program, run.forward(), shutdown.clone())
        .with_grace(grace)
        .run()
        .await?;

    shutdown.cancel();
    let _ = listener.await;

    let failed = exits.iter().filter(|e| !e.success()).count();
    if failed > 0 {
        bail!("{} of {} workers failed", failed, exits.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { workers, run } => {
            let config = run.load()?;
            init_tracing(&config.monitoring);

            let requested = workers.unwrap_or(config.scheduler.workers);
            let workers = bounded_workers(requested, available_cpus());
            tracing::info!("SWARM: Gauntlet starting with {} worker(s)", workers);

            if workers == 1 {
                run_worker(0, config, false).await
            } else {
                run_supervisor(workers, &run, &config).await
            }
        }

        Commands::Worker { index, run } => {
            let config = run.load()?;
            init_tracing(&config.monitoring);

            // The stdin reader blocks while the supervisor keeps the pipe
            // open, so leave without waiting for the runtime to wind down
            let result = run_worker(index, config, true).await;
            if let Err(e) = &result {
                tracing::error!("SWARM: Worker {} failed: {:#}", index, e);
            }
            std::process::exit(if result.is_ok() { 0 } else { 1 });
        }
    }
}
