//! Wallet capability: the acting member's public key and transaction signing.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;
use std::path::Path;
use tracing::{debug, info};

/// A connected (or connectable) wallet
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Public key of the connected account, if any
    fn public_key(&self) -> Option<Pubkey>;

    /// Sign a fully assembled transaction.
    ///
    /// A refusal is reported as [`ClientError::SigningRejected`].
    async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction>;

    /// Ask the user to connect a wallet
    fn request_connect(&self);
}

/// Wallet backed by a local keypair
pub struct KeypairWallet {
    keypair: Option<Keypair>,
}

impl KeypairWallet {
    /// Wallet holding `keypair`
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Some(keypair),
        }
    }

    /// Wallet with no account connected
    pub fn disconnected() -> Self {
        Self { keypair: None }
    }

    /// Load a JSON keypair file as written by `solana-keygen`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::ConfigError(format!("cannot read keypair {}: {}", path.display(), e))
        })?;
        let bytes: Vec<u8> = serde_json::from_str(&contents)?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| ClientError::ConfigError(format!("invalid keypair: {}", e)))?;

        info!("Loaded keypair {}", keypair.pubkey());
        Ok(Self::new(keypair))
    }
}

#[async_trait]
impl WalletAdapter for KeypairWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(|k| k.pubkey())
    }

    async fn sign_transaction(&self, mut transaction: Transaction) -> Result<Transaction> {
        let keypair = self.keypair.as_ref().ok_or(ClientError::WalletNotConnected)?;
        let blockhash = transaction.message.recent_blockhash;

        transaction
            .try_partial_sign(&[keypair], blockhash)
            .map_err(|e| ClientError::SigningRejected(e.to_string()))?;

        debug!("Signed transaction as {}", keypair.pubkey());
        Ok(transaction)
    }

    fn request_connect(&self) {
        info!("No keypair loaded; provide one to connect a wallet");
    }
}
