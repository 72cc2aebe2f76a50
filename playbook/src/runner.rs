//! Runs one action for one account and decides what its failure means

use crate::{funding_failure, Action, ActionContext, FatalError, Outcome};
use gauntlet_metrics::GauntletMetrics;
use gauntlet_types::{Account, ErrorKind, ProtocolError};
use std::sync::Arc;
use std::time::Instant;
use triage::{Classifier, Verdict};

/// Failures that a gas top-up from the funding source can cure. Short trade
/// inputs are funded by the swap itself, which knows the token.
const FUNDABLE: &[ErrorKind] = &[ErrorKind::InsufficientFunds];

pub struct ActionRunner {
    classifier: Classifier,
    metrics: Option<Arc<GauntletMetrics>>,
}

impl ActionRunner {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GauntletMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Execute `action` for `account`. Tolerated failures come back as
    /// [`Outcome::Ignored`]; anything else is fatal for the worker.
    pub async fn run(
        &self,
        ctx: &ActionContext,
        action: &dyn Action,
        account: &Account,
    ) -> Result<Outcome, FatalError> {
        let name = action.name();
        let started = Instant::now();

        let mut result = action.execute(ctx, account).await;

        if let Err(error) = &result {
            if ctx.fund && FUNDABLE.contains(&error.kind) {
                tracing::info!(
                    account = ?account.address,
                    action = name,
                    "PLAYBOOK: {} short on funds ({}), topping up and retrying",
                    name,
                    error.kind
                );
                self.record(name, "retried");
                result = match ctx.treasurer.ensure_gas(account, &ctx.funding_source).await {
                    Ok(_) => action.execute(ctx, account).await,
                    Err(e) => Err(funding_failure(e)),
                };
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics
                .actions
                .duration
                .with_label_values(&[name])
                .observe(started.elapsed().as_secs_f64());
        }

        match result {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Submitted(receipt) => tracing::info!(
                        account = ?account.address,
                        action = name,
                        outcome = "submitted",
                        "PLAYBOOK: {} by {:?} in tx {:?}",
                        name,
                        account.address,
                        receipt.tx_hash
                    ),
                    Outcome::Skipped(reason) => tracing::info!(
                        account = ?account.address,
                        action = name,
                        outcome = "skipped",
                        "PLAYBOOK: {} skipped for {:?}: {}",
                        name,
                        account.address,
                        reason
                    ),
                    Outcome::Ignored(error) => tracing::warn!(
                        account = ?account.address,
                        action = name,
                        outcome = "ignored",
                        "PLAYBOOK: {} for {:?} ignored: {}",
                        name,
                        account.address,
                        error
                    ),
                }
                self.record(name, outcome.as_str());
                Ok(outcome)
            }
            Err(error) => self.triage(name, action.tolerates(), account, error),
        }
    }

    fn triage(
        &self,
        name: &'static str,
        tolerated: &[ErrorKind],
        account: &Account,
        error: ProtocolError,
    ) -> Result<Outcome, FatalError> {
        let verdict = self.classifier.classify(&error, tolerated);
        self.record(name, verdict.as_str());

        match verdict {
            Verdict::Ignorable => {
                tracing::warn!(
                    account = ?account.address,
                    action = name,
                    outcome = "ignored",
                    "PLAYBOOK: {} for {:?} failed, continuing: {}",
                    name,
                    account.address,
                    error
                );
                Ok(Outcome::Ignored(error))
            }
            Verdict::Fatal => {
                tracing::error!(
                    account = ?account.address,
                    action = name,
                    outcome = "fatal",
                    "PLAYBOOK: {} for {:?} failed: {}",
                    name,
                    account.address,
                    error
                );
                Err(FatalError {
                    action: name,
                    account: account.address,
                    error,
                })
            }
        }
    }

    fn record(&self, action: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.actions.record(action, outcome);
        }
    }
}
