//! Proposal approval submission.
//!
//! [`TransactionSubmitter::approve`] composes the instructions for the
//! proposal's current status into one transaction, simulates it, has the
//! wallet sign it, broadcasts it and waits for confirmation. Progress is
//! modelled as an explicit [`SubmissionPhase`] machine; every transition can
//! be observed through a channel of [`SubmissionUpdate`]s.

use crate::cache::CacheInvalidator;
use crate::confirmation::{ConfirmOptions, ConfirmationWaiter, SignatureOutcome};
use crate::error::{ClientError, FailureKind, Result};
use crate::instructions::InstructionComposer;
use crate::proposal::ProposalStatus;
use crate::rpc::{encode_transaction, LedgerConnection};
use crate::types::{Commitment, SendOptions};
use crate::wallet::WalletAdapter;
use chrono::{DateTime, Utc};
use futures::channel::mpsc::UnboundedSender;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stage of one approval submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionPhase {
    /// Guard passed and instructions composed
    BuildingTx,
    /// Blockhash attached and simulation attempted
    Simulated,
    /// Wallet signed the transaction
    Signed,
    /// Node accepted the transaction
    Broadcast,
    /// Waiting for the required commitment
    Confirming,
    /// Confirmed and cache invalidated
    Done,
    /// Stopped with the given failure
    Failed(FailureKind),
}

impl SubmissionPhase {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionPhase::Done | SubmissionPhase::Failed(_))
    }

    /// Phase that follows this one on success
    pub fn next(&self) -> Option<SubmissionPhase> {
        use SubmissionPhase::*;
        match self {
            BuildingTx => Some(Simulated),
            Simulated => Some(Signed),
            Signed => Some(Broadcast),
            Broadcast => Some(Confirming),
            Confirming => Some(Done),
            Done | Failed(_) => None,
        }
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: SubmissionPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(next, SubmissionPhase::Failed(_)) || self.next() == Some(next)
    }
}

impl fmt::Display for SubmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionPhase::BuildingTx => write!(f, "building"),
            SubmissionPhase::Simulated => write!(f, "simulated"),
            SubmissionPhase::Signed => write!(f, "signed"),
            SubmissionPhase::Broadcast => write!(f, "broadcast"),
            SubmissionPhase::Confirming => write!(f, "confirming"),
            SubmissionPhase::Done => write!(f, "done"),
            SubmissionPhase::Failed(kind) => write!(f, "failed ({:?})", kind),
        }
    }
}

/// Coarse status carried by each update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// Still in flight
    Pending,
    /// Confirmed on-chain
    Confirmed,
    /// Stopped with a failure
    Failed(FailureKind),
}

/// One observed phase transition
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionUpdate {
    /// Phase entered
    pub phase: SubmissionPhase,
    /// Status at this phase
    pub status: SubmissionStatus,
    /// Transaction signature, once broadcast
    pub signature: Option<Signature>,
    /// Human-readable detail
    pub detail: Option<String>,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
}

/// Current phase plus the optional update sink
struct Progress {
    phase: Option<SubmissionPhase>,
    signature: Option<Signature>,
    sender: Option<UnboundedSender<SubmissionUpdate>>,
}

impl Progress {
    fn new(sender: Option<UnboundedSender<SubmissionUpdate>>) -> Self {
        Self {
            phase: None,
            signature: None,
            sender,
        }
    }

    fn advance(&mut self, next: SubmissionPhase, detail: Option<String>) {
        let allowed = match self.phase {
            None => matches!(next, SubmissionPhase::BuildingTx | SubmissionPhase::Failed(_)),
            Some(current) => current.can_transition_to(next),
        };
        if !allowed {
            error!("Rejected submission transition {:?} -> {}", self.phase, next);
            return;
        }

        debug!("Submission phase: {}", next);
        self.phase = Some(next);

        let status = match next {
            SubmissionPhase::Done => SubmissionStatus::Confirmed,
            SubmissionPhase::Failed(kind) => SubmissionStatus::Failed(kind),
            _ => SubmissionStatus::Pending,
        };

        if let Some(sender) = &self.sender {
            // a dropped receiver only means nobody is watching
            let _ = sender.unbounded_send(SubmissionUpdate {
                phase: next,
                status,
                signature: self.signature,
                detail,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Builds, signs, broadcasts and confirms proposal approvals
#[derive(Clone)]
pub struct TransactionSubmitter {
    connection: Arc<dyn LedgerConnection>,
    wallet: Arc<dyn WalletAdapter>,
    invalidator: Arc<dyn CacheInvalidator>,
    composer: InstructionComposer,
    waiter: ConfirmationWaiter,
}

impl TransactionSubmitter {
    /// Create a submitter
    pub fn new(
        connection: Arc<dyn LedgerConnection>,
        wallet: Arc<dyn WalletAdapter>,
        invalidator: Arc<dyn CacheInvalidator>,
        composer: InstructionComposer,
        options: ConfirmOptions,
    ) -> Self {
        let waiter = ConfirmationWaiter::new(connection.clone(), options);
        Self {
            connection,
            wallet,
            invalidator,
            composer,
            waiter,
        }
    }

    /// Approve `transaction_index` of `multisig` as the connected wallet.
    ///
    /// Depending on `status` the transaction also creates or activates the
    /// proposal, so a single signature covers the whole step.
    ///
    /// Calls are not serialized: the caller must keep a second approval from
    /// starting while one is in flight, or the same vote may be broadcast twice.
    pub async fn approve(
        &self,
        multisig: &Pubkey,
        transaction_index: u64,
        status: ProposalStatus,
        program_id: &Pubkey,
    ) -> Result<Signature> {
        self.submit(multisig, transaction_index, status, program_id, None)
            .await
    }

    /// Same as [`approve`](Self::approve), reporting every phase to `updates`
    pub async fn approve_with_progress(
        &self,
        multisig: &Pubkey,
        transaction_index: u64,
        status: ProposalStatus,
        program_id: &Pubkey,
        updates: UnboundedSender<SubmissionUpdate>,
    ) -> Result<Signature> {
        self.submit(multisig, transaction_index, status, program_id, Some(updates))
            .await
    }

    async fn submit(
        &self,
        multisig: &Pubkey,
        transaction_index: u64,
        status: ProposalStatus,
        program_id: &Pubkey,
        updates: Option<UnboundedSender<SubmissionUpdate>>,
    ) -> Result<Signature> {
        let mut progress = Progress::new(updates);

        match self
            .run(multisig, transaction_index, status, program_id, &mut progress)
            .await
        {
            Ok(signature) => Ok(signature),
            Err(e) => {
                warn!("{}", e.notification());
                progress.advance(SubmissionPhase::Failed(e.kind()), Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        multisig: &Pubkey,
        transaction_index: u64,
        status: ProposalStatus,
        program_id: &Pubkey,
        progress: &mut Progress,
    ) -> Result<Signature> {
        if !status.is_approvable() {
            return Err(ClientError::InvalidProposalState(status));
        }

        let actor = match self.wallet.public_key() {
            Some(actor) => actor,
            None => {
                self.wallet.request_connect();
                return Err(ClientError::WalletNotConnected);
            }
        };

        let instructions =
            self.composer
                .compose(status, multisig, &actor, transaction_index, program_id);
        info!(
            "Approving transaction {} of multisig {} as {} via {} (program {}, status {}, {} instruction(s))",
            transaction_index,
            multisig,
            actor,
            self.connection.endpoint(),
            program_id,
            status,
            instructions.len()
        );
        progress.advance(
            SubmissionPhase::BuildingTx,
            Some(format!("{} instruction(s)", instructions.len())),
        );

        let latest = self.connection.get_latest_blockhash().await?;
        let mut transaction = Transaction::new_with_payer(&instructions, Some(&actor));
        transaction.message.recent_blockhash = latest.blockhash;
        debug!(
            "Using blockhash {} (valid until block height {})",
            latest.blockhash, latest.last_valid_block_height
        );

        let simulation_note = self.simulate(&transaction).await;
        progress.advance(SubmissionPhase::Simulated, simulation_note);

        let signed = self
            .wallet
            .sign_transaction(transaction)
            .await
            .map_err(|e| match e {
                ClientError::SigningRejected(_) | ClientError::WalletNotConnected => e,
                other => ClientError::SigningRejected(other.to_string()),
            })?;
        if !signed.is_signed() {
            return Err(ClientError::SigningRejected(
                "wallet returned an unsigned transaction".to_string(),
            ));
        }
        progress.advance(SubmissionPhase::Signed, None);

        let raw = encode_transaction(&signed)?;
        let options = SendOptions {
            skip_preflight: true,
            preflight_commitment: Commitment::Confirmed,
        };
        let signature = self
            .connection
            .send_raw_transaction(&raw, options)
            .await
            .map_err(|e| ClientError::BroadcastFailed(e.to_string()))?;
        info!("Transaction broadcast: {}", signature);
        progress.signature = Some(signature);
        progress.advance(SubmissionPhase::Broadcast, None);

        progress.advance(SubmissionPhase::Confirming, None);
        let outcome = self
            .waiter
            .wait_for_outcomes(&[signature], Some(latest.last_valid_block_height))
            .await
            .into_iter()
            .next()
            .unwrap_or(SignatureOutcome::TimedOut);

        match outcome {
            SignatureOutcome::Confirmed => {}
            SignatureOutcome::Failed(message) => {
                return Err(ClientError::ConfirmationFailed {
                    signature: signature.to_string(),
                    message,
                })
            }
            SignatureOutcome::Expired => {
                return Err(ClientError::BlockhashExpired {
                    signature: signature.to_string(),
                })
            }
            SignatureOutcome::TimedOut => {
                return Err(ClientError::ConfirmationTimeout {
                    signature: signature.to_string(),
                    timeout_secs: self.waiter.options().timeout_secs(),
                })
            }
        }

        self.invalidator.invalidate_transactions().await;
        progress.advance(SubmissionPhase::Done, None);
        info!("Approval confirmed: {}", signature);

        Ok(signature)
    }

    /// Simulate before signing. A failure here never stops the submission;
    /// it is returned as a note for the progress stream.
    async fn simulate(&self, transaction: &Transaction) -> Option<String> {
        let (failure, logs) = match self.connection.simulate_transaction(transaction).await {
            Ok(simulation) if simulation.is_ok() => {
                debug!(
                    "Simulation succeeded ({} compute units)",
                    simulation.units_consumed.unwrap_or_default()
                );
                return None;
            }
            Ok(simulation) => {
                for line in &simulation.logs {
                    debug!("simulation log: {}", line);
                }
                let err = simulation.err.map(|e| e.to_string()).unwrap_or_default();
                (ClientError::SimulationFailed(err), simulation.logs)
            }
            Err(e) => (ClientError::SimulationFailed(e.to_string()), Vec::new()),
        };

        warn!("{}; submitting anyway", failure);
        if logs.is_empty() {
            Some(failure.to_string())
        } else {
            Some(format!("{}\n{}", failure, logs.join("\n")))
        }
    }
}
