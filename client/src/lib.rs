//! Squads v4 multisig client core
//!
//! This library moves a multisig proposal through approval from a connected
//! wallet and resolves which network, RPC endpoint, program and multisig the
//! client operates against.
//!
//! # Features
//!
//! - **Instruction Composition**: Create, activate and approve a proposal in one transaction
//! - **Submission Pipeline**: Blockhash, advisory simulation, wallet signing, broadcast
//! - **Confirmation Polling**: Batched signature status polling with timeout and blockhash expiry
//! - **Progress Updates**: Explicit submission phases streamed over a channel
//! - **Settings Resolution**: URL parameters, durable storage and defaults with fixed precedence
//! - **Address Resolution**: Multisig from URL or storage, vault derived from it
//! - **Retry Logic**: Exponential backoff for transient read failures
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use squads_client::{ClientConfig, FileStore, KeypairWallet, MultisigClient, ProposalStatus, StaticLocation};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tracing_subscriber::fmt::init();
//!
//!     let client = MultisigClient::new(
//!         ClientConfig::default(),
//!         Arc::new(FileStore::open("settings.json")?),
//!         Arc::new(StaticLocation::parse("https://app.example/?network=devnet")?),
//!         Arc::new(KeypairWallet::from_file("id.json")?),
//!     )?;
//!
//!     client.health_check().await?;
//!
//!     let signature = client.approve_proposal(7, ProposalStatus::Active).await?;
//!     println!("Approved: {}", client.settings().resolve()?.explorer_tx_url(&signature));
//!     Ok(())
//! }
//! ```
//!
//! # Examples
//!
//! ## Watch submission progress
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use squads_client::{MultisigClient, ProposalStatus};
//!
//! # async fn run(client: MultisigClient) -> squads_client::Result<()> {
//! let (tx, mut rx) = futures::channel::mpsc::unbounded::<squads_client::SubmissionUpdate>();
//! let watcher = tokio::spawn(async move {
//!     while let Some(update) = rx.next().await {
//!         println!("{} {:?}", update.phase, update.status);
//!     }
//! });
//!
//! client
//!     .approve_proposal_with_progress(7, ProposalStatus::None, tx)
//!     .await?;
//! let _ = watcher.await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod address;
pub mod cache;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod instructions;
pub mod location;
pub mod pda;
pub mod proposal;
pub mod retry;
pub mod rpc;
pub mod settings;
pub mod storage;
pub mod submitter;
pub mod types;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use address::{AddressResolver, ResolvedAddresses};
pub use cache::{CacheInvalidator, NoopInvalidator, WatchInvalidator};
pub use config::ClientConfig;
pub use confirmation::{ConfirmOptions, ConfirmationWaiter, SignatureOutcome};
pub use error::{ClientError, FailureKind, Result};
pub use instructions::{
    InstructionComposer, ProposalInstructionArgs, ProposalInstructionBuilder,
    ProposalInstructionKind, SquadsInstructions,
};
pub use location::{StaticLocation, UrlSource};
pub use proposal::ProposalStatus;
pub use retry::RetryStrategy;
pub use rpc::{LedgerConnection, RpcClient};
pub use settings::{Settings, SettingsResolver};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use submitter::{SubmissionPhase, SubmissionStatus, SubmissionUpdate, TransactionSubmitter};
pub use types::{Commitment, Network};
pub use wallet::{KeypairWallet, WalletAdapter};

use futures::channel::mpsc::UnboundedSender;
use solana_sdk::signature::Signature;
use std::sync::{Arc, RwLock};
use tracing::info;
use url::Url;

/// Main client wiring settings, addresses, the ledger connection and the
/// submission pipeline together.
///
/// Settings are re-resolved on every operation, so a changed RPC endpoint or
/// program id takes effect on the next call.
#[derive(Clone)]
pub struct MultisigClient {
    /// Configuration
    config: Arc<ClientConfig>,
    /// Settings resolver
    settings: SettingsResolver,
    /// Address resolver
    addresses: AddressResolver,
    /// Connected wallet
    wallet: Arc<dyn WalletAdapter>,
    /// Transaction cache to refresh after approvals
    invalidator: Arc<dyn CacheInvalidator>,
    /// Instruction composer
    composer: InstructionComposer,
    /// RPC client for the last resolved endpoint
    connection: Arc<RwLock<Option<(Url, Arc<RpcClient>)>>>,
}

impl MultisigClient {
    /// Create a new client and run the one-time settings reconciliation
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration
    /// * `store` - Durable settings storage
    /// * `location` - Source of the current URL
    /// * `wallet` - Wallet that signs approvals
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        location: Arc<dyn UrlSource>,
        wallet: Arc<dyn WalletAdapter>,
    ) -> Result<Self> {
        config.validate()?;

        let settings = SettingsResolver::new(store.clone(), location.clone());
        settings.bootstrap()?;

        let addresses = AddressResolver::new(store, location, config.default_vault_index);

        info!(
            "Initializing multisig client for network: {}",
            settings.network()?
        );

        Ok(Self {
            config: Arc::new(config),
            settings,
            addresses,
            wallet,
            invalidator: Arc::new(NoopInvalidator),
            composer: InstructionComposer::squads(),
            connection: Arc::new(RwLock::new(None)),
        })
    }

    /// Refresh `invalidator` after each confirmed approval
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    /// Encode proposal instructions with `builder`
    pub fn with_instruction_builder(mut self, builder: Arc<dyn ProposalInstructionBuilder>) -> Self {
        self.composer = InstructionComposer::new(builder);
        self
    }

    /// Get the settings resolver
    pub fn settings(&self) -> &SettingsResolver {
        &self.settings
    }

    /// Get the address resolver
    pub fn addresses(&self) -> &AddressResolver {
        &self.addresses
    }

    /// Get configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// RPC client for the currently resolved endpoint, reused while the
    /// endpoint stays the same
    pub fn connection(&self) -> Result<Arc<RpcClient>> {
        let rpc_url = self.settings.rpc_url()?;

        {
            let cached = self.connection.read().unwrap_or_else(|p| p.into_inner());
            if let Some((url, client)) = cached.as_ref() {
                if *url == rpc_url {
                    return Ok(client.clone());
                }
            }
        }

        info!("Connecting to {}", rpc_url);
        let client = Arc::new(RpcClient::new(rpc_url.as_str(), &self.config)?);
        let mut cached = self.connection.write().unwrap_or_else(|p| p.into_inner());
        *cached = Some((rpc_url, client.clone()));
        Ok(client)
    }

    /// Submitter bound to the current connection
    pub fn submitter(&self) -> Result<TransactionSubmitter> {
        Ok(TransactionSubmitter::new(
            self.connection()?,
            self.wallet.clone(),
            self.invalidator.clone(),
            self.composer.clone(),
            ConfirmOptions::from_config(&self.config),
        ))
    }

    /// Approve `transaction_index` of the selected multisig.
    ///
    /// Fails with [`ClientError::NoMultisigSelected`] before any network
    /// call when no multisig is selected.
    pub async fn approve_proposal(
        &self,
        transaction_index: u64,
        status: ProposalStatus,
    ) -> Result<Signature> {
        let settings = self.settings.resolve()?;
        let multisig = self
            .addresses
            .multisig_address()?
            .ok_or(ClientError::NoMultisigSelected)?;

        self.submitter()?
            .approve(&multisig, transaction_index, status, &settings.program_id)
            .await
    }

    /// Same as [`approve_proposal`](Self::approve_proposal), streaming progress to `updates`
    pub async fn approve_proposal_with_progress(
        &self,
        transaction_index: u64,
        status: ProposalStatus,
        updates: UnboundedSender<SubmissionUpdate>,
    ) -> Result<Signature> {
        let settings = self.settings.resolve()?;
        let multisig = self
            .addresses
            .multisig_address()?
            .ok_or(ClientError::NoMultisigSelected)?;

        self.submitter()?
            .approve_with_progress(
                &multisig,
                transaction_index,
                status,
                &settings.program_id,
                updates,
            )
            .await
    }

    /// Health check - verify the resolved RPC endpoint answers
    pub async fn health_check(&self) -> Result<bool> {
        self.connection()?.health_check().await
    }
}
