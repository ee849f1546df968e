//! Waiting for broadcast signatures to reach a commitment level.
//!
//! The waiter polls `getSignatureStatuses` for every still-pending signature
//! in one batch per interval until each one is confirmed, fails on-chain,
//! outlives its blockhash, or the overall timeout elapses. Every query is cut
//! off at the same deadline, so a stalled endpoint cannot stretch the wait.

use crate::config::ClientConfig;
use crate::rpc::LedgerConnection;
use crate::types::Commitment;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout as deadline_bound};
use tracing::{debug, info, warn};

/// Confirmation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOptions {
    /// Poll interval (in milliseconds)
    pub poll_interval_ms: u64,
    /// Timeout (in milliseconds)
    pub timeout_ms: u64,
    /// Commitment a signature must reach
    pub commitment: Commitment,
}

impl ConfirmOptions {
    /// Create from client config
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            poll_interval_ms: config.confirm_poll_interval_ms,
            timeout_ms: config.confirm_timeout_secs.saturating_mul(1000),
            commitment: config.commitment,
        }
    }

    /// Set custom poll interval
    pub fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    /// Set required commitment
    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    /// Timeout in whole seconds, rounded up
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_ms.div_ceil(1000)
    }
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Final state of one awaited signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// Reached the required commitment without error
    Confirmed,
    /// Landed with a transaction error
    Failed(String),
    /// Blockhash expired before the signature was seen
    Expired,
    /// Still pending when the timeout elapsed
    TimedOut,
}

impl SignatureOutcome {
    /// Whether the signature confirmed successfully
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SignatureOutcome::Confirmed)
    }
}

/// Polls the ledger until signatures settle
#[derive(Clone)]
pub struct ConfirmationWaiter {
    connection: Arc<dyn LedgerConnection>,
    options: ConfirmOptions,
}

impl ConfirmationWaiter {
    /// Create a waiter over `connection`
    pub fn new(connection: Arc<dyn LedgerConnection>, options: ConfirmOptions) -> Self {
        Self {
            connection,
            options,
        }
    }

    /// Options in effect
    pub fn options(&self) -> &ConfirmOptions {
        &self.options
    }

    /// Wait for every signature and report, per position, whether it
    /// confirmed. Anything not confirmed by the timeout is `false`.
    pub async fn wait_for_confirmation(&self, signatures: &[Signature]) -> Vec<bool> {
        self.wait_for_outcomes(signatures, None)
            .await
            .iter()
            .map(SignatureOutcome::is_confirmed)
            .collect()
    }

    /// Wait for every signature and report its outcome, position for position.
    ///
    /// With `last_valid_block_height`, signatures still unseen once the chain
    /// passes that height are reported as [`SignatureOutcome::Expired`]
    /// instead of being polled until the timeout.
    pub async fn wait_for_outcomes(
        &self,
        signatures: &[Signature],
        last_valid_block_height: Option<u64>,
    ) -> Vec<SignatureOutcome> {
        let mut outcomes: Vec<Option<SignatureOutcome>> = vec![None; signatures.len()];
        if signatures.is_empty() {
            return Vec::new();
        }

        info!(
            "Waiting for {} signature(s) to reach {} (timeout: {}ms)",
            signatures.len(),
            self.options.commitment,
            self.options.timeout_ms
        );

        let start = Instant::now();
        let timeout = Duration::from_millis(self.options.timeout_ms);
        let poll_interval = Duration::from_millis(self.options.poll_interval_ms);
        let remaining = || timeout.saturating_sub(start.elapsed());

        loop {
            if outcomes.iter().all(Option::is_some) {
                break;
            }

            if start.elapsed() >= timeout {
                warn!("Confirmation timed out after {:?}", start.elapsed());
                settle_pending(&mut outcomes, SignatureOutcome::TimedOut);
                break;
            }

            self.poll(signatures, &mut outcomes, remaining()).await;
            if outcomes.iter().all(Option::is_some) {
                break;
            }

            if let Some(limit) = last_valid_block_height {
                if self.block_height_passed(limit, remaining()).await {
                    // a transaction may have landed just before the window closed
                    self.poll(signatures, &mut outcomes, remaining()).await;
                    warn!("Blockhash expired at block height {}", limit);
                    settle_pending(&mut outcomes, SignatureOutcome::Expired);
                    break;
                }
            }

            sleep(poll_interval.min(remaining())).await;
        }

        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or(SignatureOutcome::TimedOut))
            .collect()
    }

    /// One batched status query for every pending signature, abandoned after `budget`
    async fn poll(
        &self,
        signatures: &[Signature],
        outcomes: &mut [Option<SignatureOutcome>],
        budget: Duration,
    ) {
        let pending: Vec<usize> = (0..signatures.len())
            .filter(|&i| outcomes[i].is_none())
            .collect();
        let batch: Vec<Signature> = pending.iter().map(|&i| signatures[i]).collect();

        let statuses =
            match deadline_bound(budget, self.connection.get_signature_statuses(&batch)).await {
                Ok(Ok(statuses)) => statuses,
                Ok(Err(e)) => {
                    warn!("Error fetching signature statuses: {}", e);
                    return;
                }
                Err(_) => {
                    warn!("Signature status query still running at the confirmation deadline");
                    return;
                }
            };

        for (&i, status) in pending.iter().zip(statuses) {
            let signature = &signatures[i];
            match status {
                Some(status) if status.err.is_some() => {
                    let message = status
                        .err
                        .as_ref()
                        .map(|err| err.to_string())
                        .unwrap_or_default();
                    warn!("Transaction {} failed: {}", signature, message);
                    outcomes[i] = Some(SignatureOutcome::Failed(message));
                }
                Some(status) if status.reached(self.options.commitment) => {
                    info!("Transaction {} confirmed in slot {}", signature, status.slot);
                    outcomes[i] = Some(SignatureOutcome::Confirmed);
                }
                Some(status) => {
                    debug!(
                        "Transaction {} at {:?}, waiting for {}",
                        signature, status.confirmation_status, self.options.commitment
                    );
                }
                None => {
                    debug!("Transaction not yet seen: {}", signature);
                }
            }
        }
    }

    async fn block_height_passed(&self, limit: u64, budget: Duration) -> bool {
        match deadline_bound(budget, self.connection.get_block_height()).await {
            Ok(Ok(height)) => height > limit,
            Ok(Err(e)) => {
                warn!("Error fetching block height: {}", e);
                false
            }
            Err(_) => {
                warn!("Block height query still running at the confirmation deadline");
                false
            }
        }
    }
}

fn settle_pending(outcomes: &mut [Option<SignatureOutcome>], outcome: SignatureOutcome) {
    for slot in outcomes.iter_mut().filter(|o| o.is_none()) {
        *slot = Some(outcome.clone());
    }
}
