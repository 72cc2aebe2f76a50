//! Gauntlet Config - Configuration management for the soak tester
//!
//! Provides layered configuration loading:
//! - Default values
//! - TOML configuration file
//! - `.env` file and environment variables
//! - CLI overrides (applied by the binary)

use gauntlet_types::NetworkMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    LoadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Missing required config: {0}")]
    MissingRequired(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Hardhat's default development mnemonic
pub const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Target network and account derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mode: NetworkMode,
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    /// Mnemonic the simulated accounts are derived from. Local mode falls
    /// back to the development mnemonic.
    pub mnemonic: Option<String>,
    /// First derivation index of the simulated account pool
    pub first_account: Option<u32>,
    /// Last derivation index (inclusive)
    pub last_account: Option<u32>,
    /// Derivation index of the funding source on the local node
    pub funding_source_index: u32,
    /// Private key of the funding source on a live network
    pub funding_source_key: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mode: NetworkMode::Local,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: None,
            mnemonic: None,
            first_account: None,
            last_account: None,
            funding_source_index: 2,
            funding_source_key: None,
        }
    }
}

impl NetworkConfig {
    /// Inclusive derivation index range of the account pool
    pub fn account_range(&self) -> (u32, u32) {
        let (first, last) = match self.mode {
            NetworkMode::Local => (4, 30),
            NetworkMode::Live => (0, 99),
        };
        (
            self.first_account.unwrap_or(first),
            self.last_account.unwrap_or(last),
        )
    }

    pub fn mnemonic(&self) -> Option<&str> {
        match (&self.mnemonic, self.mode) {
            (Some(m), _) => Some(m.as_str()),
            (None, NetworkMode::Local) => Some(DEV_MNEMONIC),
            (None, NetworkMode::Live) => None,
        }
    }
}

/// Protocol entry points. Everything else is discovered through the router.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub router: String,
    /// Read-only quoting contract
    pub views: String,
}

/// Worker loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub workers: usize,
    /// In-flight cap per worker
    pub max_in_flight: usize,
    /// Work items dispatched per round at most
    pub max_batch: usize,
    /// Accounts selected per round, split across the catalog
    pub selection_budget: usize,
    /// `sampled` or `contiguous`
    pub selection: String,
    /// `fan_out` or `single_flight`
    pub dispatch: String,
    pub throttle_interval_ms: u64,
    pub round_interval_ms: u64,
    pub shutdown_grace_ms: u64,
    /// Local-mode time advance bounds, seconds, half-open
    pub time_advance_min_secs: u64,
    pub time_advance_max_secs: u64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
    /// Stop after this many rounds; unset runs until shutdown
    pub max_rounds: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_in_flight: 30,
            max_batch: 50,
            selection_budget: 60,
            selection: "sampled".to_string(),
            dispatch: "fan_out".to_string(),
            throttle_interval_ms: 1000,
            round_interval_ms: 1000,
            shutdown_grace_ms: 30_000,
            time_advance_min_secs: 1,
            time_advance_max_secs: 3600,
            seed: None,
            max_rounds: None,
        }
    }
}

/// Trade path resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// `bfs` or `stitched`
    pub strategy: String,
    /// `symmetric` or `directional`
    pub cache_mode: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            strategy: "bfs".to_string(),
            cache_mode: "symmetric".to_string(),
        }
    }
}

/// Funding-on-demand configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingConfig {
    pub enabled: bool,
    /// Native balance below which an account is topped up
    pub native_floor_eth: f64,
    pub native_top_up_eth: f64,
    pub token_top_up_eth: f64,
    pub lock_poll_ms: u64,
    /// Re-read the balance after waiting for the funding lock
    pub recheck_after_wait: bool,
    pub max_nonce_retries: u32,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            native_floor_eth: 1.0,
            native_top_up_eth: 10.0,
            token_top_up_eth: 100.0,
            lock_poll_ms: 1000,
            recheck_after_wait: true,
            max_nonce_retries: 5,
        }
    }
}

/// Action mix
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Action name to number of catalog entries
    pub weights: BTreeMap<String, u32>,
    /// `random` or `oldest_claim`
    pub claim_policy: String,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert("stake".to_string(), 1);
        weights.insert("swap".to_string(), 3);
        Self {
            weights,
            claim_policy: "random".to_string(),
        }
    }
}

/// Error tolerance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    /// Extra substrings tolerated on live networks for unclassified errors
    pub live_patterns: Vec<String>,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            live_patterns: vec![
                "Too Many Requests error received from rpc.edu-chain.raas.gelato.cloud".to_string(),
            ],
        }
    }
}

/// Monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub json_logs: bool,
    pub summary_interval_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            summary_interval_ms: 30_000,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GauntletConfig {
    pub network: NetworkConfig,
    pub contracts: ContractsConfig,
    pub scheduler: SchedulerConfig,
    pub paths: PathsConfig,
    pub funding: FundingConfig,
    pub actions: ActionsConfig,
    pub errors: ErrorsConfig,
    pub monitoring: MonitoringConfig,
}

impl GauntletConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv();

        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Defaults plus `.env` and environment overrides, for runs without a file
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv();

        let mut config = Self::default();
        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(mode) = std::env::var("GAUNTLET_NETWORK") {
            self.network.mode = mode.parse().map_err(ConfigError::InvalidValue)?;
        }

        if let Ok(url) = std::env::var("GAUNTLET_RPC_URL") {
            self.network.rpc_url = url;
        }

        // Names kept from the deployment tooling
        if let Ok(mnemonic) = std::env::var("PRODUCTION_MNEMONIC") {
            self.network.mnemonic = Some(mnemonic);
        }

        if let Ok(key) = std::env::var("NEW_FEE_TO_PRIVATE_KEY") {
            self.network.funding_source_key = Some(key);
        }

        if let Ok(router) = std::env::var("GAUNTLET_ROUTER") {
            self.contracts.router = router;
        }

        if let Ok(views) = std::env::var("GAUNTLET_VIEWS") {
            self.contracts.views = views;
        }

        if let Ok(workers) = std::env::var("GAUNTLET_WORKERS") {
            self.scheduler.workers = workers
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GAUNTLET_WORKERS".to_string()))?;
        }

        if let Ok(seed) = std::env::var("GAUNTLET_SEED") {
            self.scheduler.seed = Some(
                seed.parse()
                    .map_err(|_| ConfigError::InvalidValue("GAUNTLET_SEED".to_string()))?,
            );
        }

        if let Ok(fund) = std::env::var("GAUNTLET_FUND") {
            self.funding.enabled = fund
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GAUNTLET_FUND".to_string()))?;
        }

        if let Ok(level) = std::env::var("GAUNTLET_LOG_LEVEL") {
            self.monitoring.log_level = level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.rpc_url.is_empty() {
            return Err(ConfigError::MissingRequired("network.rpc_url".to_string()));
        }

        if self.network.mnemonic().is_none() {
            return Err(ConfigError::MissingRequired(
                "network.mnemonic (PRODUCTION_MNEMONIC) for live mode".to_string(),
            ));
        }

        let (first, last) = self.network.account_range();
        if first > last {
            return Err(ConfigError::InvalidValue(format!(
                "account range {}..={} is empty",
                first, last
            )));
        }

        if self.contracts.router.is_empty() {
            return Err(ConfigError::MissingRequired("contracts.router".to_string()));
        }

        if self.contracts.views.is_empty() {
            return Err(ConfigError::MissingRequired("contracts.views".to_string()));
        }

        self.validate_scheduler()?;

        if !matches!(self.paths.strategy.as_str(), "bfs" | "stitched") {
            return Err(ConfigError::InvalidValue(format!("paths.strategy: {}", self.paths.strategy)));
        }

        if !matches!(self.paths.cache_mode.as_str(), "symmetric" | "directional") {
            return Err(ConfigError::InvalidValue(format!(
                "paths.cache_mode: {}",
                self.paths.cache_mode
            )));
        }

        if self.funding.native_floor_eth < 0.0 || self.funding.native_top_up_eth <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "funding amounts must be positive".to_string(),
            ));
        }

        if self.actions.weights.values().all(|w| *w == 0) {
            return Err(ConfigError::MissingRequired("No actions enabled".to_string()));
        }

        if !matches!(self.actions.claim_policy.as_str(), "random" | "oldest_claim") {
            return Err(ConfigError::InvalidValue(format!(
                "actions.claim_policy: {}",
                self.actions.claim_policy
            )));
        }

        Ok(())
    }

    fn validate_scheduler(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;

        if s.workers == 0 {
            return Err(ConfigError::InvalidValue("scheduler.workers must be at least 1".to_string()));
        }

        if s.max_in_flight == 0 || s.max_batch == 0 || s.selection_budget == 0 {
            return Err(ConfigError::InvalidValue(
                "scheduler limits must be positive".to_string(),
            ));
        }

        if !matches!(s.selection.as_str(), "sampled" | "contiguous") {
            return Err(ConfigError::InvalidValue(format!("scheduler.selection: {}", s.selection)));
        }

        if !matches!(s.dispatch.as_str(), "fan_out" | "single_flight") {
            return Err(ConfigError::InvalidValue(format!("scheduler.dispatch: {}", s.dispatch)));
        }

        if s.time_advance_min_secs == 0 || s.time_advance_min_secs >= s.time_advance_max_secs {
            return Err(ConfigError::InvalidValue(
                "time advance bounds must satisfy 0 < min < max".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for GauntletConfig
pub struct ConfigBuilder {
    config: GauntletConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GauntletConfig::default(),
        }
    }

    pub fn network(mut self, mode: NetworkMode, rpc_url: &str) -> Self {
        self.config.network.mode = mode;
        self.config.network.rpc_url = rpc_url.to_string();
        self
    }

    pub fn mnemonic(mut self, mnemonic: &str) -> Self {
        self.config.network.mnemonic = Some(mnemonic.to_string());
        self
    }

    pub fn contracts(mut self, router: &str, views: &str) -> Self {
        self.config.contracts.router = router.to_string();
        self.config.contracts.views = views.to_string();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.scheduler.workers = workers;
        self
    }

    pub fn fund(mut self, enabled: bool) -> Self {
        self.config.funding.enabled = enabled;
        self
    }

    pub fn action(mut self, name: &str, weight: u32) -> Self {
        self.config.actions.weights.insert(name.to_string(), weight);
        self
    }

    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.config.scheduler = scheduler;
        self
    }

    pub fn monitoring(mut self, monitoring: MonitoringConfig) -> Self {
        self.config.monitoring = monitoring;
        self
    }

    pub fn build(self) -> GauntletConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GauntletConfig::default();
        assert_eq!(config.network.mode, NetworkMode::Local);
        assert_eq!(config.network.account_range(), (4, 30));
        assert_eq!(config.scheduler.max_in_flight, 30);
        assert_eq!(config.actions.weights.get("swap"), Some(&3));
        assert!(!config.funding.enabled);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .network(NetworkMode::Live, "https://rpc.example.org")
            .mnemonic("abandon abandon abandon")
            .contracts("0x01", "0x02")
            .workers(2)
            .fund(true)
            .build();

        assert_eq!(config.network.account_range(), (0, 99));
        assert_eq!(config.scheduler.workers, 2);
        assert!(config.funding.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = GauntletConfig::from_toml(
            r#"
            [network]
            mode = "live"
            rpc_url = "https://rpc.example.org"
            mnemonic = "abandon abandon abandon"

            [contracts]
            router = "0x01"
            views = "0x02"

            [scheduler]
            max_in_flight = 10
            dispatch = "single_flight"

            [actions.weights]
            claim = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.network.mode, NetworkMode::Live);
        assert_eq!(config.scheduler.max_in_flight, 10);
        assert_eq!(config.scheduler.max_batch, 50);
        assert_eq!(config.actions.weights.get("claim"), Some(&2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_settings() {
        let config = GauntletConfig::from_toml(
            r#"
            [contracts]
            router = "0x01"
            views = "0x02"

            [paths]
            strategy = "stitched"
            cache_mode = "directional"
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.strategy, "stitched");
        assert_eq!(config.paths.cache_mode, "directional");
        assert!(config.validate().is_ok());
        assert_eq!(GauntletConfig::default().paths.strategy, "bfs");

        let mut bad = config.clone();
        bad.paths.strategy = "dijkstra".to_string();
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidValue(_))));

        let mut bad = config;
        bad.paths.cache_mode = "both".to_string();
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_live_requires_mnemonic() {
        let config = ConfigBuilder::new()
            .network(NetworkMode::Live, "https://rpc.example.org")
            .contracts("0x01", "0x02")
            .build();

        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));
    }

    #[test]
    fn test_rejects_bad_time_bounds() {
        let mut config = ConfigBuilder::new().contracts("0x01", "0x02").build();
        config.scheduler.time_advance_min_secs = 3600;

        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }
}
