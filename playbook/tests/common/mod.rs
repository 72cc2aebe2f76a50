#![allow(dead_code)]

use gauntlet_testkit::{account, ether, MemoryChain};
use gauntlet_types::{NetworkMode, ProtocolClient, NATIVE};
use pathfinder::{Pathfinder, PathfinderConfig};
use playbook::ActionContext;
use std::sync::Arc;
use std::time::Duration;
use treasurer::{FundingPolicy, Treasurer};

/// Index of the account every top-up is paid from
pub const SOURCE: u32 = 0;

pub fn policy() -> FundingPolicy {
    FundingPolicy {
        lock_poll: Duration::from_millis(2),
        ..Default::default()
    }
}

/// Context over `chain` with the funding source minted. Build the pools
/// first; the graph is fixed once the context exists.
pub async fn context(chain: &Arc<MemoryChain>) -> ActionContext {
    chain.mint(account(SOURCE).address, NATIVE, ether(1_000_000));
    let pools = chain.pools().await.unwrap();
    let paths = Arc::new(Pathfinder::new(&pools, PathfinderConfig::default()));
    let treasurer = Arc::new(Treasurer::new(chain.clone(), policy()));

    ActionContext::new(
        chain.clone(),
        chain.clone(),
        chain.clone(),
        paths,
        treasurer,
        account(SOURCE),
        chain.wrapped_token(),
    )
    .with_recipients((1..=3).map(|i| account(i).address).collect())
    .with_mode(NetworkMode::Local)
    .with_seed(42)
}
