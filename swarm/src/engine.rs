//! Engine wiring
//!
//! One engine per worker process. Every piece of shared state (path cache,
//! funding locks, governance queue, metrics) is owned here and handed to
//! the actions through the context.

use crate::SwarmError;
use ethers::utils::parse_ether;
use gateway::EvmGateway;
use gauntlet_config::{ConfigError, FundingConfig, GauntletConfig};
use gauntlet_metrics::GauntletMetrics;
use gauntlet_types::{Account, AccountLedger, ProtocolClient, TimeControl};
use pathfinder::{Pathfinder, PathfinderConfig};
use playbook::{ActionContext, ActionRunner, Catalog, ClaimPolicy};
use std::sync::Arc;
use std::time::Duration;
use treasurer::{FundingPolicy, Treasurer};
use triage::Classifier;

/// Collaborators a worker drives
pub struct Engine {
    pub ctx: Arc<ActionContext>,
    pub runner: Arc<ActionRunner>,
    pub catalog: Catalog,
    pub accounts: Vec<Account>,
    pub metrics: Arc<GauntletMetrics>,
}

impl Engine {
    /// Connect to the configured endpoint and wire everything over it
    pub async fn connect(config: &GauntletConfig) -> Result<Self, SwarmError> {
        let gateway = Arc::new(EvmGateway::connect(&config.network, &config.contracts).await?);
        let accounts = gateway.accounts().to_vec();
        let source = gateway.funding_source();

        Self::assemble(
            config,
            gateway.clone(),
            gateway.clone(),
            gateway,
            accounts,
            source,
        )
        .await
    }

    /// Wire an engine over any implementation of the surfaces. Pools and the
    /// wrapped-native token are read once here.
    pub async fn assemble(
        config: &GauntletConfig,
        protocol: Arc<dyn ProtocolClient>,
        ledger: Arc<dyn AccountLedger>,
        clock: Arc<dyn TimeControl>,
        accounts: Vec<Account>,
        funding_source: Account,
    ) -> Result<Self, SwarmError> {
        let metrics = Arc::new(GauntletMetrics::new());

        let pools = protocol.pools().await?;
        let wrapped_native = protocol.wrapped_native().await?;

        let path_config = PathfinderConfig::parse(&config.paths.strategy, &config.paths.cache_mode)?;
        let paths = Arc::new(Pathfinder::new(&pools, path_config).with_metrics(metrics.clone()));
        let treasurer = Arc::new(
            Treasurer::new(ledger.clone(), funding_policy(&config.funding)?)
                .with_metrics(metrics.clone()),
        );
        let classifier = Classifier::new(config.network.mode, config.errors.live_patterns.clone());
        let runner = Arc::new(ActionRunner::new(classifier).with_metrics(metrics.clone()));
        let catalog = Catalog::from_weights(&config.actions.weights)?;
        let claim_policy: ClaimPolicy = config.actions.claim_policy.parse()?;

        let mut ctx = ActionContext::new(
            protocol,
            ledger,
            clock,
            paths,
            treasurer,
            funding_source,
            wrapped_native,
        )
        .with_recipients(accounts.iter().map(|a| a.address).collect())
        .with_fund(config.funding.enabled)
        .with_mode(config.network.mode)
        .with_claim_policy(claim_policy);

        if let Some(seed) = config.scheduler.seed {
            ctx = ctx.with_seed(seed);
        }

        tracing::info!(
            "SWARM: Engine ready: {} pools, {} accounts, fund={}, mode={:?}",
            pools.len(),
            accounts.len(),
            config.funding.enabled,
            config.network.mode
        );

        Ok(Self {
            ctx: Arc::new(ctx),
            runner,
            catalog,
            accounts,
            metrics,
        })
    }
}

/// Funding amounts from their configured ether values
pub fn funding_policy(funding: &FundingConfig) -> Result<FundingPolicy, ConfigError> {
    let ether = |name: &str, value: f64| {
        parse_ether(value).map_err(|e| ConfigError::InvalidValue(format!("funding.{}: {}", name, e)))
    };

    Ok(FundingPolicy {
        native_floor: ether("native_floor_eth", funding.native_floor_eth)?,
        native_top_up: ether("native_top_up_eth", funding.native_top_up_eth)?,
        token_top_up: ether("token_top_up_eth", funding.token_top_up_eth)?,
        lock_poll: Duration::from_millis(funding.lock_poll_ms),
        recheck_after_wait: funding.recheck_after_wait,
        max_nonce_retries: funding.max_nonce_retries,
        ..FundingPolicy::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    #[test]
    fn test_funding_policy_from_config() {
        let funding = FundingConfig {
            native_floor_eth: 0.5,
            lock_poll_ms: 20,
            ..FundingConfig::default()
        };
        let policy = funding_policy(&funding).unwrap();

        assert_eq!(policy.native_floor, U256::exp10(17) * 5u64);
        assert_eq!(policy.native_top_up, U256::exp10(19));
        assert_eq!(policy.lock_poll, Duration::from_millis(20));
        assert_eq!(policy.approval_amount, FundingPolicy::default().approval_amount);
    }
}
