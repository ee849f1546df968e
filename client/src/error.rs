//! Error types for the proposal approval pipeline.
//!
//! This module defines all error types that can occur while resolving settings,
//! composing proposal instructions, and submitting or confirming transactions.

use crate::proposal::ProposalStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// No wallet is connected; the connect affordance has been triggered
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// The proposal is in a state that cannot be approved
    #[error("Proposal cannot be approved in state {0}")]
    InvalidProposalState(ProposalStatus),

    /// No multisig address could be resolved
    #[error("No multisig selected")]
    NoMultisigSelected,

    /// Simulation reported an error (advisory only)
    #[error("Transaction simulation failed: {0}")]
    SimulationFailed(String),

    /// The wallet declined to sign
    #[error("Wallet rejected signing: {0}")]
    SigningRejected(String),

    /// The node rejected the raw transaction
    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    /// Signature never reached the required commitment
    #[error("Transaction {signature} not confirmed after {timeout_secs} seconds")]
    ConfirmationTimeout {
        /// Submitted signature
        signature: String,
        /// Timeout that elapsed
        timeout_secs: u64,
    },

    /// Ledger reports a program error for the signature
    #[error("Transaction {signature} failed: {message}")]
    ConfirmationFailed {
        /// Submitted signature
        signature: String,
        /// Error reported by the ledger
        message: String,
    },

    /// Blockhash validity window passed before the signature landed
    #[error("Blockhash expired before transaction {signature} landed")]
    BlockhashExpired {
        /// Submitted signature
        signature: String,
    },

    /// Durable storage unavailable or rejected the write
    #[error("Settings persistence failed: {0}")]
    SettingsPersistenceFailed(String),

    /// Malformed account address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// JSON-RPC error returned by the node
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Transaction could not be encoded for the wire
    #[error("Transaction encoding error: {0}")]
    TransactionEncoding(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimitExceeded(u64),

    /// Max retries exceeded
    #[error("Max retries ({0}) exceeded")]
    MaxRetriesExceeded(usize),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Flat classification of a failure, carried by progress updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// No wallet connected
    WalletNotConnected,
    /// Guard rejected the proposal status
    InvalidProposalState,
    /// No multisig selected
    NoMultisigSelected,
    /// Advisory simulation failure
    SimulationFailed,
    /// Wallet declined
    SigningRejected,
    /// Node rejected the broadcast
    BroadcastFailed,
    /// Confirmation wait elapsed
    ConfirmationTimeout,
    /// Ledger reported an error
    ConfirmationFailed,
    /// Blockhash window passed
    BlockhashExpired,
    /// Storage write failed
    SettingsPersistenceFailed,
    /// Transport, config or parsing problem
    Other,
}

impl ClientError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::WalletNotConnected => FailureKind::WalletNotConnected,
            ClientError::InvalidProposalState(_) => FailureKind::InvalidProposalState,
            ClientError::NoMultisigSelected => FailureKind::NoMultisigSelected,
            ClientError::SimulationFailed(_) => FailureKind::SimulationFailed,
            ClientError::SigningRejected(_) => FailureKind::SigningRejected,
            ClientError::BroadcastFailed(_) => FailureKind::BroadcastFailed,
            ClientError::ConfirmationTimeout { .. } => FailureKind::ConfirmationTimeout,
            ClientError::ConfirmationFailed { .. } => FailureKind::ConfirmationFailed,
            ClientError::BlockhashExpired { .. } => FailureKind::BlockhashExpired,
            ClientError::SettingsPersistenceFailed(_) => FailureKind::SettingsPersistenceFailed,
            _ => FailureKind::Other,
        }
    }

    /// Stage label for a user-facing notification
    pub fn stage(&self) -> &'static str {
        match self.kind() {
            FailureKind::WalletNotConnected => "wallet connection",
            FailureKind::InvalidProposalState | FailureKind::NoMultisigSelected => "validation",
            FailureKind::SimulationFailed => "simulation",
            FailureKind::SigningRejected => "signing",
            FailureKind::BroadcastFailed => "broadcast",
            FailureKind::ConfirmationTimeout
            | FailureKind::ConfirmationFailed
            | FailureKind::BlockhashExpired => "confirmation",
            FailureKind::SettingsPersistenceFailed => "settings",
            FailureKind::Other => "request",
        }
    }

    /// Single-line notification text, e.g. `Failed to approve (signing): ...`
    pub fn notification(&self) -> String {
        format!("Failed to approve ({}): {}", self.stage(), self)
    }
}
