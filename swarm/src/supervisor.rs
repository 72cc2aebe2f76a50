//! Multi-process supervision
//!
//! Each worker is its own OS process so a crash stays contained. The
//! supervisor starts them, forwards shutdown over their stdin, and reports
//! how each one exited.

use crate::shutdown::SHUTDOWN_MESSAGE;
use crate::SwarmError;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Extra time a child gets past its own grace period before it is killed
const KILL_MARGIN: Duration = Duration::from_secs(5);

pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// At most half the CPUs, at least one
pub fn bounded_workers(requested: usize, cpus: usize) -> usize {
    let max = (cpus / 2).max(1);
    if requested > max {
        tracing::warn!(
            "SWARM: {} workers requested, only {} allowed on {} CPUs",
            requested,
            max,
            cpus
        );
        return max;
    }
    requested.max(1)
}

/// How one worker process ended
#[derive(Debug, Clone, Copy)]
pub struct ChildExit {
    pub index: usize,
    pub status: Option<ExitStatus>,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }
}

/// Starts and watches the worker processes
pub struct Supervisor {
    workers: usize,
    program: PathBuf,
    args: Vec<String>,
    grace: Duration,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// `program worker --index I <args>` is run for every worker
    pub fn new(workers: usize, program: PathBuf, args: Vec<String>, shutdown: CancellationToken) -> Self {
        Self {
            workers,
            program,
            args,
            grace: Duration::from_secs(30),
            shutdown,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run every worker to completion
    pub async fn run(self) -> Result<Vec<ChildExit>, SwarmError> {
        tracing::info!("SWARM: Starting {} worker processes", self.workers);

        let mut watchers = Vec::with_capacity(self.workers);
        for index in 0..self.workers {
            let child = self.spawn(index)?;
            tracing::info!("SWARM: Worker {} started (pid {:?})", index, child.id());
            watchers.push(tokio::spawn(watch(
                index,
                child,
                self.shutdown.clone(),
                self.grace + KILL_MARGIN,
            )));
        }

        let mut exits = Vec::with_capacity(watchers.len());
        for (index, watcher) in watchers.into_iter().enumerate() {
            let status = match watcher.await {
                Ok(Ok(status)) => Some(status),
                Ok(Err(e)) => {
                    tracing::error!("SWARM: Lost track of worker {}: {}", index, e);
                    None
                }
                Err(e) => {
                    tracing::error!("SWARM: Watcher for worker {} failed: {}", index, e);
                    None
                }
            };

            let exit = ChildExit { index, status };
            if exit.success() {
                tracing::info!("SWARM: Worker {} exited cleanly", index);
            } else {
                tracing::error!("SWARM: Worker {} failed: {:?}", index, status);
            }
            exits.push(exit);
        }

        Ok(exits)
    }

    fn spawn(&self, index: usize) -> Result<Child, SwarmError> {
        Command::new(&self.program)
            .arg("worker")
            .arg("--index")
            .arg(index.to_string())
            .args(&self.args)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SwarmError::WorkerFailed {
                index,
                reason: format!("spawn failed: {}", e),
            })
    }
}

/// Wait for the child. On shutdown, tell it to stop and give it `grace`
/// before killing it.
async fn watch(
    index: usize,
    mut child: Child,
    shutdown: CancellationToken,
    grace: Duration,
) -> std::io::Result<ExitStatus> {
    let mut stdin = child.stdin.take();

    tokio::select! {
        status = child.wait() => return status,
        _ = shutdown.cancelled() => {}
    }

    if let Some(stdin) = stdin.as_mut() {
        let line = format!("{}\n", SHUTDOWN_MESSAGE);
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            tracing::warn!("SWARM: Could not signal worker {}: {}", index, e);
        }
        let _ = stdin.flush().await;
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!("SWARM: Worker {} ignored shutdown, killing it", index);
            child.kill().await?;
            child.wait().await
        }
    }
}
