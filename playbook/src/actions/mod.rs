//! The interactions a simulated user performs

mod campaign;
mod governance;
mod positions;
mod stake;
mod swap;
mod transfer;
mod wrap;

pub use campaign::{contribution_amount, CompleteCampaign, FundCampaign};
pub use governance::{can_vote, RecallVote, Vote, LOCAL_VOTE_ADVANCE_SECS, MIN_VOTE_LOCK_EPOCHS};
pub use positions::{pick_for_claim, Claim, Unstake};
pub use stake::{path_to_native, Stake, LOCK_EPOCHS};
pub use swap::Swap;
pub use transfer::Transfer;
pub use wrap::{Delegate, Undelegate};

use crate::Action;
use std::sync::Arc;

/// Every action name, in catalog order
pub const ALL: &[&str] = &[
    "swap",
    "stake",
    "claim",
    "unstake",
    "fund_campaign",
    "complete_campaign",
    "vote",
    "recall_vote",
    "transfer",
    "delegate",
    "undelegate",
];

/// Look an action up by its config name
pub fn by_name(name: &str) -> Option<Arc<dyn Action>> {
    let action: Arc<dyn Action> = match name {
        "swap" => Arc::new(Swap),
        "stake" => Arc::new(Stake),
        "claim" => Arc::new(Claim),
        "unstake" => Arc::new(Unstake),
        "fund_campaign" => Arc::new(FundCampaign),
        "complete_campaign" => Arc::new(CompleteCampaign),
        "vote" => Arc::new(Vote),
        "recall_vote" => Arc::new(RecallVote),
        "transfer" => Arc::new(Transfer),
        "delegate" => Arc::new(Delegate),
        "undelegate" => Arc::new(Undelegate),
        _ => return None,
    };
    Some(action)
}
