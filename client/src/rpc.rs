//! Ledger connection over Solana JSON-RPC.
//!
//! [`LedgerConnection`] is the capability the submitter and the confirmation
//! waiter depend on; [`RpcClient`] implements it against an HTTP endpoint.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::retry::RetryStrategy;
use crate::types::{Commitment, LatestBlockhash, SendOptions, SignatureStatus, SimulationResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// JSON-RPC request ID type
type RequestId = u64;

/// Read/write access to the ledger
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// Endpoint this connection talks to
    fn endpoint(&self) -> &str;

    /// Latest blockhash and its validity bound
    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash>;

    /// Simulate a transaction against current ledger state
    async fn simulate_transaction(&self, transaction: &Transaction) -> Result<SimulationResult>;

    /// Broadcast a signed, serialized transaction
    async fn send_raw_transaction(&self, raw: &[u8], options: SendOptions) -> Result<Signature>;

    /// Statuses for a batch of signatures, one entry per input, in order
    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>>;

    /// Current block height
    async fn get_block_height(&self) -> Result<u64>;
}

/// Serialize a transaction to wire bytes
pub fn encode_transaction(transaction: &Transaction) -> Result<Vec<u8>> {
    bincode::serialize(transaction).map_err(|e| ClientError::TransactionEncoding(e.to_string()))
}

/// Solana JSON-RPC client
#[derive(Clone)]
pub struct RpcClient {
    /// HTTP client
    client: Client,
    /// RPC endpoint
    endpoint: String,
    /// Retry strategy for reads
    retry_strategy: RetryStrategy,
    /// Request ID counter
    request_id: Arc<AtomicU64>,
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: RequestId,
    method: String,
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: RequestId,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl RpcClient {
    /// Create a new RPC client for `endpoint`
    pub fn new(endpoint: &str, config: &ClientConfig) -> Result<Self> {
        url::Url::parse(endpoint)?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::NetworkError)?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            retry_strategy: RetryStrategy::from_config(config),
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    fn next_request_id(&self) -> RequestId {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(ClientError::NetworkError)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(ClientError::RateLimitExceeded(retry_after));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::RpcError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            error!("RPC error: {} (code: {})", error.message, error.code);
            return Err(ClientError::RpcError(format!(
                "{} (code: {})",
                error.message, error.code
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| ClientError::RpcError("Missing result in response".to_string()))
    }

    fn request(&self, method: &str, params: Value) -> JsonRpcRequest {
        let request_id = self.next_request_id();
        debug!("RPC request: {} (id: {})", method, request_id);

        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: request_id,
            method: method.to_string(),
            params,
        }
    }

    /// Make a JSON-RPC call, retrying transient failures
    async fn call_rpc(&self, method: &str, params: Value) -> Result<Value> {
        let request = self.request(method, params);
        self.retry_strategy.retry(|| self.post(&request)).await
    }

    /// Make a JSON-RPC call exactly once
    async fn call_rpc_once(&self, method: &str, params: Value) -> Result<Value> {
        let request = self.request(method, params);
        self.post(&request).await
    }

    /// Health check - `getHealth` answers `"ok"` on a healthy node
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Performing RPC health check");

        match self.call_rpc("getHealth", json!([])).await {
            Ok(result) if result.as_str() == Some("ok") => {
                info!("RPC health check passed");
                Ok(true)
            }
            Ok(other) => Err(ClientError::InvalidResponse(format!(
                "Unexpected health response: {}",
                other
            ))),
            Err(e) => {
                error!("RPC health check failed: {:?}", e);
                Err(e)
            }
        }
    }

    /// Current slot
    pub async fn get_slot(&self) -> Result<u64> {
        let result = self
            .call_rpc("getSlot", json!([{ "commitment": "confirmed" }]))
            .await?;

        result
            .as_u64()
            .ok_or_else(|| ClientError::InvalidResponse("Slot is not a number".to_string()))
    }
}

#[async_trait]
impl LedgerConnection for RpcClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash> {
        info!("Fetching latest blockhash from {}", self.endpoint);

        let result = self
            .call_rpc(
                "getLatestBlockhash",
                json!([{ "commitment": Commitment::Finalized.as_str() }]),
            )
            .await?;

        let value = &result["value"];
        let blockhash = value["blockhash"].as_str().ok_or_else(|| {
            ClientError::InvalidResponse("Missing blockhash in response".to_string())
        })?;
        let blockhash = Hash::from_str(blockhash)
            .map_err(|e| ClientError::InvalidResponse(format!("Bad blockhash: {}", e)))?;
        let last_valid_block_height = value["lastValidBlockHeight"].as_u64().ok_or_else(|| {
            ClientError::InvalidResponse("Missing lastValidBlockHeight in response".to_string())
        })?;

        debug!(
            "Latest blockhash: {} (valid until height {})",
            blockhash, last_valid_block_height
        );

        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn simulate_transaction(&self, transaction: &Transaction) -> Result<SimulationResult> {
        info!("Simulating transaction");

        let encoded = BASE64_STANDARD.encode(encode_transaction(transaction)?);
        let params = json!([
            encoded,
            {
                "encoding": "base64",
                "sigVerify": false,
                "commitment": Commitment::Confirmed.as_str(),
            }
        ]);

        let result = self.call_rpc("simulateTransaction", params).await?;
        let simulation: SimulationResult = serde_json::from_value(result["value"].clone())?;

        debug!(
            "Simulation completed. Success: {}, units: {:?}",
            simulation.is_ok(),
            simulation.units_consumed
        );

        Ok(simulation)
    }

    async fn send_raw_transaction(&self, raw: &[u8], options: SendOptions) -> Result<Signature> {
        info!("Sending transaction to {}", self.endpoint);

        let params = json!([
            BASE64_STANDARD.encode(raw),
            {
                "encoding": "base64",
                "skipPreflight": options.skip_preflight,
                "preflightCommitment": options.preflight_commitment.as_str(),
            }
        ]);

        let result = self.call_rpc_once("sendTransaction", params).await?;

        let signature = result.as_str().ok_or_else(|| {
            ClientError::InvalidResponse("Missing signature in send response".to_string())
        })?;
        let signature = Signature::from_str(signature)
            .map_err(|e| ClientError::InvalidResponse(format!("Bad signature: {}", e)))?;

        info!("Transaction sent: {}", signature);
        Ok(signature)
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>> {
        debug!("Fetching statuses for {} signatures", signatures.len());

        let encoded: Vec<String> = signatures.iter().map(|s| s.to_string()).collect();
        let result = self
            .call_rpc(
                "getSignatureStatuses",
                json!([encoded, { "searchTransactionHistory": false }]),
            )
            .await?;

        let statuses: Vec<Option<SignatureStatus>> =
            serde_json::from_value(result["value"].clone())?;

        if statuses.len() != signatures.len() {
            return Err(ClientError::InvalidResponse(format!(
                "Expected {} statuses, got {}",
                signatures.len(),
                statuses.len()
            )));
        }

        Ok(statuses)
    }

    async fn get_block_height(&self) -> Result<u64> {
        let result = self
            .call_rpc(
                "getBlockHeight",
                json!([{ "commitment": Commitment::Confirmed.as_str() }]),
            )
            .await?;

        result
            .as_u64()
            .ok_or_else(|| ClientError::InvalidResponse("Block height is not a number".to_string()))
    }
}
