use crate::amounts::{size_input, MIN_CONTRIBUTION};
use crate::{funding_failure, Action, ActionContext, Outcome};
use async_trait::async_trait;
use ethers::types::U256;
use gauntlet_types::{Account, Campaign, Contribution, ProtocolError, Spender, TokenPayment};
use rand::seq::SliceRandom;

/// Contribute to one open launch campaign
pub struct FundCampaign;

/// Settle every ended campaign the account took part in
pub struct CompleteCampaign;

/// Raise a draw below the minimum contribution to the minimum when the
/// balance covers it, otherwise give up
pub fn contribution_amount(amount: U256, balance: U256) -> Option<U256> {
    if amount >= MIN_CONTRIBUTION {
        Some(amount)
    } else if balance >= MIN_CONTRIBUTION {
        Some(MIN_CONTRIBUTION)
    } else {
        None
    }
}

#[async_trait]
impl Action for FundCampaign {
    fn name(&self) -> &'static str {
        "fund_campaign"
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let now = ctx.clock.latest_timestamp().await?;
        let open: Vec<Campaign> = ctx
            .protocol
            .active_campaigns()
            .await?
            .into_iter()
            .filter(|c| c.is_open(now))
            .collect();

        let Some(campaign) = ctx.with_rng(|rng| open.choose(rng).cloned()) else {
            return Ok(Outcome::skipped("no open campaigns"));
        };

        let sizing = size_input(ctx, account, campaign.paired_token).await?;
        let Some(amount) = contribution_amount(sizing.amount, sizing.balance) else {
            return Ok(Outcome::skipped(format!(
                "balance {} below minimum contribution",
                sizing.balance
            )));
        };

        if !sizing.native {
            let launch_pair = ctx.protocol.spender(Spender::LaunchPair).await?;
            ctx.treasurer
                .ensure_allowance(account, campaign.paired_token, launch_pair, amount)
                .await
                .map_err(funding_failure)?;
        }

        let contribution = Contribution {
            campaign_id: campaign.id,
            payment: TokenPayment::fungible(campaign.paired_token, amount),
            native_value: sizing.native.then_some(amount),
        };

        let receipt = ctx
            .submit(account, ctx.protocol.contribute(account, contribution))
            .await?;
        tracing::debug!("PLAYBOOK: {:?} funded campaign {}", account.address, campaign.id);
        Ok(Outcome::Submitted(receipt))
    }
}

#[async_trait]
impl Action for CompleteCampaign {
    fn name(&self) -> &'static str {
        "complete_campaign"
    }

    async fn execute(&self, ctx: &ActionContext, account: &Account) -> Result<Outcome, ProtocolError> {
        let now = ctx.clock.latest_timestamp().await?;
        let ended: Vec<Campaign> = ctx
            .protocol
            .user_campaigns(account.address)
            .await?
            .into_iter()
            .filter(|c| !c.is_open(now))
            .collect();

        let mut last = None;
        for campaign in &ended {
            let receipt = if campaign.reached_goal() {
                tracing::debug!("PLAYBOOK: {:?} withdrawing from campaign {}", account.address, campaign.id);
                ctx.submit(account, ctx.protocol.withdraw_campaign_tokens(account, campaign.id))
                    .await?
            } else {
                tracing::debug!("PLAYBOOK: {:?} refunding campaign {}", account.address, campaign.id);
                ctx.submit(account, ctx.protocol.refund_campaign(account, campaign.id))
                    .await?
            };
            last = Some(receipt);
        }

        Ok(match last {
            Some(receipt) => Outcome::Submitted(receipt),
            None => Outcome::skipped("no ended campaigns"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_amount_respects_minimum() {
        let two = MIN_CONTRIBUTION * 2u64;
        let half = MIN_CONTRIBUTION / 2u64;

        assert_eq!(contribution_amount(two, two), Some(two));
        assert_eq!(contribution_amount(half, two), Some(MIN_CONTRIBUTION));
        assert_eq!(contribution_amount(half, half), None);
    }
}
