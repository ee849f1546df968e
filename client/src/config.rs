//! Client tuning: transport timeouts, retry policy and confirmation polling.
//!
//! Which network and endpoint to talk to is not configured here; that is
//! resolved at runtime by [`crate::settings::SettingsResolver`].

use crate::error::{ClientError, Result};
use crate::types::Commitment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// HTTP request timeout
    pub request_timeout: Duration,

    /// Maximum number of retries for failed read requests
    pub max_retries: usize,

    /// Initial retry delay (in milliseconds)
    pub retry_initial_delay_ms: u64,

    /// Maximum retry delay (in milliseconds)
    pub retry_max_delay_ms: u64,

    /// Retry backoff multiplier
    pub retry_multiplier: f64,

    /// Signature status polling interval (in milliseconds)
    pub confirm_poll_interval_ms: u64,

    /// Overall confirmation timeout (in seconds)
    pub confirm_timeout_secs: u64,

    /// Commitment a signature must reach to count as confirmed
    pub commitment: Commitment,

    /// Vault index used when none has been stored
    pub default_vault_index: u8,
}

impl ClientConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 5000,
            retry_multiplier: 2.0,
            confirm_poll_interval_ms: 1000,
            confirm_timeout_secs: 30,
            commitment: Commitment::Confirmed,
            default_vault_index: 0,
        }
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set retry delays
    pub fn with_retry_config(
        mut self,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        self.retry_initial_delay_ms = initial_delay_ms;
        self.retry_max_delay_ms = max_delay_ms;
        self.retry_multiplier = multiplier;
        self
    }

    /// Set confirmation polling configuration
    pub fn with_confirm_config(mut self, poll_interval_ms: u64, timeout_secs: u64) -> Self {
        self.confirm_poll_interval_ms = poll_interval_ms;
        self.confirm_timeout_secs = timeout_secs;
        self
    }

    /// Set required commitment
    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    /// Set the fallback vault index
    pub fn with_default_vault_index(mut self, index: u8) -> Self {
        self.default_vault_index = index;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(ClientError::ConfigError(
                "Max retries must be greater than 0".to_string(),
            ));
        }
        if self.retry_initial_delay_ms == 0 {
            return Err(ClientError::ConfigError(
                "Retry initial delay must be greater than 0".to_string(),
            ));
        }
        if self.retry_multiplier <= 1.0 {
            return Err(ClientError::ConfigError(
                "Retry multiplier must be greater than 1.0".to_string(),
            ));
        }
        if self.confirm_poll_interval_ms == 0 {
            return Err(ClientError::ConfigError(
                "Confirmation poll interval must be greater than 0".to_string(),
            ));
        }
        if self.confirm_timeout_secs == 0 {
            return Err(ClientError::ConfigError(
                "Confirmation timeout must be greater than 0".to_string(),
            ));
        }
        if self.confirm_poll_interval_ms >= self.confirm_timeout_secs * 1000 {
            return Err(ClientError::ConfigError(
                "Confirmation poll interval must be shorter than the timeout".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
