//! Common types used across the client.
//!
//! This module defines networks, commitment levels, and the response shapes
//! returned by the ledger connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::hash::Hash;
use std::fmt;
use std::str::FromStr;

/// Default devnet RPC endpoint
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";

/// Default mainnet-beta RPC endpoint
pub const MAINNET_BETA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Cluster the client operates against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    /// Solana devnet
    Devnet,
    /// Solana mainnet-beta
    MainnetBeta,
}

impl Network {
    /// Map a URL `network` parameter value.
    ///
    /// `mainnet` and `mainnet-beta` select mainnet-beta; anything else is devnet.
    pub fn from_param(value: &str) -> Self {
        match value {
            "mainnet" | "mainnet-beta" => Network::MainnetBeta,
            _ => Network::Devnet,
        }
    }

    /// Classify an RPC endpoint by its host naming
    pub fn from_rpc_url(rpc_url: &str) -> Self {
        if rpc_url.contains("devnet") {
            Network::Devnet
        } else {
            Network::MainnetBeta
        }
    }

    /// Get the default RPC URL for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Devnet => DEVNET_RPC_URL,
            Network::MainnetBeta => MAINNET_BETA_RPC_URL,
        }
    }

    /// Cluster name as used in URLs and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::MainnetBeta => "mainnet-beta",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "devnet" => Ok(Network::Devnet),
            "mainnet" | "mainnet-beta" => Ok(Network::MainnetBeta),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// Ledger confidence level, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Seen by the connected node
    Processed,
    /// Voted on by a supermajority
    Confirmed,
    /// Rooted
    Finalized,
}

impl Commitment {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blockhash plus the last block height at which it is still valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    /// Recent blockhash
    pub blockhash: Hash,
    /// Last block height the blockhash is accepted at
    pub last_valid_block_height: u64,
}

/// Outcome of `simulateTransaction`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Transaction error, if any
    pub err: Option<Value>,
    /// Program logs
    #[serde(default)]
    pub logs: Vec<String>,
    /// Compute units consumed
    pub units_consumed: Option<u64>,
}

impl SimulationResult {
    /// Whether the simulation completed without a transaction error
    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// One entry of `getSignatureStatuses`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    /// Slot the transaction was processed in
    pub slot: u64,
    /// Blocks since confirmation; `None` once rooted
    pub confirmations: Option<u64>,
    /// Transaction error, if any
    pub err: Option<Value>,
    /// Commitment reached so far
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Whether this status has reached `required`
    pub fn reached(&self, required: Commitment) -> bool {
        match self.confirmation_status {
            Some(level) => level >= required,
            // older nodes omit the level; null confirmations means rooted
            None => self.confirmations.is_none(),
        }
    }
}

/// Options for `sendTransaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Skip the node's preflight simulation
    pub skip_preflight: bool,
    /// Commitment used for any preflight the node performs
    pub preflight_commitment: Commitment,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
        }
    }
}
