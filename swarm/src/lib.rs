//! SWARM - Load Orchestrator
//!
//! Runs the workers that keep the protocol under concurrent load.
//! One engine per process, one or more processes per run.
//!
//! # Responsibilities
//! - Wire the engine from configuration
//! - Select work and dispatch it under the in-flight cap
//! - Advance chain time on local networks
//! - Supervise worker processes and shut them down cleanly

pub mod engine;
pub mod in_flight;
pub mod selection;
pub mod shutdown;
pub mod supervisor;
pub mod worker;

use gateway::GatewayError;
use gauntlet_config::ConfigError;
use gauntlet_types::ProtocolError;
use pathfinder::PathfinderError;
use playbook::{FatalError, PlaybookError};
use thiserror::Error;

pub use engine::Engine;
pub use in_flight::{InFlight, InFlightGuard};
pub use selection::{AccountSelector, SelectionMode};
pub use supervisor::{available_cpus, bounded_workers, ChildExit, Supervisor};
pub use worker::{DispatchStrategy, WorkItem, Worker, WorkerReport, WorkerSettings, WorkerState};

/// Swarm errors
#[derive(Error, Debug)]
pub enum SwarmError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Path error: {0}")]
    Path(#[from] PathfinderError),

    #[error("Playbook error: {0}")]
    Playbook(#[from] PlaybookError),

    #[error("Worker {worker} hit a fatal error: {error}")]
    Fatal { worker: usize, error: FatalError },

    #[error("Worker process {index} failed: {reason}")]
    WorkerFailed { index: usize, reason: String },
}
