//! In-process fakes for the external capabilities, shared by unit tests.

use crate::cache::CacheInvalidator;
use crate::error::{ClientError, Result};
use crate::rpc::LedgerConnection;
use crate::types::{Commitment, LatestBlockhash, SendOptions, SignatureStatus, SimulationResult};
use crate::wallet::WalletAdapter;
use async_trait::async_trait;
use serde_json::json;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Distinct signature per seed
pub(crate) fn signature(seed: u8) -> Signature {
    Signature::from([seed; 64])
}

pub(crate) fn confirmed_status() -> SignatureStatus {
    SignatureStatus {
        slot: 100,
        confirmations: Some(1),
        err: None,
        confirmation_status: Some(Commitment::Confirmed),
    }
}

pub(crate) fn failed_status() -> SignatureStatus {
    SignatureStatus {
        err: Some(json!({"InstructionError": [0, {"Custom": 6001}]})),
        ..confirmed_status()
    }
}

/// Scriptable ledger that records every call
pub(crate) struct MockLedger {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    pub block_height: AtomicU64,
    pub simulation: Mutex<Result<SimulationResult>>,
    pub send_error: Mutex<Option<String>>,
    pub statuses: Mutex<HashMap<Signature, SignatureStatus>>,
    pub status_on_send: Mutex<Option<SignatureStatus>>,
    pub failing_status_polls: AtomicUsize,
    pub read_delay: Mutex<Option<Duration>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub sent: Mutex<Vec<(Transaction, SendOptions)>>,
    pub status_batches: Mutex<Vec<usize>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 1_000,
            block_height: AtomicU64::new(900),
            simulation: Mutex::new(Ok(SimulationResult::default())),
            send_error: Mutex::new(None),
            statuses: Mutex::new(HashMap::new()),
            status_on_send: Mutex::new(Some(confirmed_status())),
            failing_status_polls: AtomicUsize::new(0),
            read_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            status_batches: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(Transaction, SendOptions)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_status(&self, signature: Signature, status: SignatureStatus) {
        self.statuses.lock().unwrap().insert(signature, status);
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    async fn stall(&self) {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LedgerConnection for MockLedger {
    fn endpoint(&self) -> &str {
        "mock://ledger"
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash> {
        self.record("getLatestBlockhash");
        Ok(LatestBlockhash {
            blockhash: self.blockhash,
            last_valid_block_height: self.last_valid_block_height,
        })
    }

    async fn simulate_transaction(&self, _transaction: &Transaction) -> Result<SimulationResult> {
        self.record("simulateTransaction");
        match &*self.simulation.lock().unwrap() {
            Ok(result) => Ok(result.clone()),
            Err(e) => Err(ClientError::RpcError(e.to_string())),
        }
    }

    async fn send_raw_transaction(&self, raw: &[u8], options: SendOptions) -> Result<Signature> {
        self.record("sendTransaction");
        if let Some(message) = self.send_error.lock().unwrap().clone() {
            return Err(ClientError::RpcError(message));
        }

        let transaction: Transaction = bincode::deserialize(raw)
            .map_err(|e| ClientError::TransactionEncoding(e.to_string()))?;
        let signature = transaction.signatures[0];
        self.sent.lock().unwrap().push((transaction, options));

        if let Some(status) = self.status_on_send.lock().unwrap().clone() {
            self.set_status(signature, status);
        }
        Ok(signature)
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>> {
        self.record("getSignatureStatuses");
        self.status_batches.lock().unwrap().push(signatures.len());
        self.stall().await;

        if self
            .failing_status_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ClientError::RpcError("HTTP 503: unavailable".to_string()));
        }

        let statuses = self.statuses.lock().unwrap();
        Ok(signatures.iter().map(|s| statuses.get(s).cloned()).collect())
    }

    async fn get_block_height(&self) -> Result<u64> {
        self.record("getBlockHeight");
        self.stall().await;
        Ok(self.block_height.load(Ordering::SeqCst))
    }
}

/// Keypair wallet that can be told to refuse and counts connect requests
pub(crate) struct MockWallet {
    pub keypair: Option<Keypair>,
    pub refuse: AtomicBool,
    pub connect_requests: AtomicUsize,
}

impl MockWallet {
    pub fn connected() -> Self {
        Self {
            keypair: Some(Keypair::new()),
            refuse: AtomicBool::new(false),
            connect_requests: AtomicUsize::new(0),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            keypair: None,
            ..Self::connected()
        }
    }
}

#[async_trait]
impl WalletAdapter for MockWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(|k| k.pubkey())
    }

    async fn sign_transaction(&self, mut transaction: Transaction) -> Result<Transaction> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::SigningRejected("User rejected the request".to_string()));
        }
        let keypair = self.keypair.as_ref().ok_or(ClientError::WalletNotConnected)?;
        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_partial_sign(&[keypair], blockhash)
            .map_err(|e| ClientError::SigningRejected(e.to_string()))?;
        Ok(transaction)
    }

    fn request_connect(&self) {
        self.connect_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts invalidations
#[derive(Default)]
pub(crate) struct CountingInvalidator {
    pub count: AtomicUsize,
}

impl CountingInvalidator {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheInvalidator for CountingInvalidator {
    async fn invalidate_transactions(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
