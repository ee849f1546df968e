//! Settings resolution: network, RPC endpoint, program id and explorer URL.
//!
//! Every read is resolved independently with the precedence
//! URL `network` parameter, then persisted value, then compiled-in default.
//! An explicit `network` parameter always wins over a persisted RPC endpoint,
//! and a conflicting persisted endpoint is deleted when it is read.

use crate::error::{ClientError, Result};
use crate::location::{url_param, UrlSource};
use crate::storage::{
    KeyValueStore, EXPLORER_URL_KEY, NETWORK_KEY, PROGRAM_ID_KEY, RPC_URL_KEY,
};
use crate::types::Network;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Squads v4 program id
pub const DEFAULT_PROGRAM_ID: &str = "SQDS4ep65T869zMMBKyuUq6aD6EgTu8psMjkvj52pCf";

/// Squads v4 program id as a key
pub const SQUADS_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("SQDS4ep65T869zMMBKyuUq6aD6EgTu8psMjkvj52pCf");

/// Default block explorer
pub const DEFAULT_EXPLORER_URL: &str = "https://explorer.solana.com";

/// Name of the URL parameter selecting the network
pub const NETWORK_PARAM: &str = "network";

/// Immutable snapshot of resolved settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Cluster
    pub network: Network,
    /// RPC endpoint
    pub rpc_url: Url,
    /// Multisig program id
    pub program_id: Pubkey,
    /// Block explorer base URL
    pub explorer_url: String,
}

impl Settings {
    fn explorer_link(&self, path: &str) -> String {
        let base = self.explorer_url.trim_end_matches('/');
        match self.network {
            Network::MainnetBeta => format!("{}/{}", base, path),
            Network::Devnet => format!("{}/{}?cluster=devnet", base, path),
        }
    }

    /// Explorer link for a transaction signature
    pub fn explorer_tx_url(&self, signature: &Signature) -> String {
        self.explorer_link(&format!("tx/{}", signature))
    }

    /// Explorer link for an account
    pub fn explorer_address_url(&self, address: &Pubkey) -> String {
        self.explorer_link(&format!("address/{}", address))
    }
}

/// Resolves settings from the current URL, durable storage and defaults
#[derive(Clone)]
pub struct SettingsResolver {
    store: Arc<dyn KeyValueStore>,
    location: Arc<dyn UrlSource>,
}

impl SettingsResolver {
    /// Create a resolver over the injected storage and URL source
    pub fn new(store: Arc<dyn KeyValueStore>, location: Arc<dyn UrlSource>) -> Self {
        Self { store, location }
    }

    /// Network named by an explicit URL parameter, if one is present.
    ///
    /// Unrecognised values still count as explicit and select devnet.
    pub fn url_network(&self) -> Option<Network> {
        let url = self.location.current()?;
        url_param(&url, NETWORK_PARAM).map(|value| Network::from_param(&value))
    }

    /// One-time startup reconciliation.
    ///
    /// With a `network` URL parameter present, a stored RPC endpoint that looks
    /// like the other cluster is deleted.
    pub fn bootstrap(&self) -> Result<()> {
        let raw_param = self
            .location
            .current()
            .and_then(|url| url_param(&url, NETWORK_PARAM));

        match raw_param {
            Some(param) => {
                let url_is_devnet = param == "devnet";
                if let Some(stored) = self.store.get(RPC_URL_KEY)? {
                    let stored_is_devnet = stored.contains("devnet");
                    if url_is_devnet != stored_is_devnet {
                        info!(
                            "Network mismatch: URL={}, stored RPC={}. Clearing stored RPC",
                            param, stored
                        );
                        self.store.remove(RPC_URL_KEY)?;
                    }
                }
                info!("Network from URL: {}", param);
            }
            None => info!("No network param in URL, using stored/default settings"),
        }

        for key in [RPC_URL_KEY, NETWORK_KEY, PROGRAM_ID_KEY, EXPLORER_URL_KEY] {
            let value = self.store.get(key)?;
            debug!("  {}: {}", key, value.as_deref().unwrap_or("(not set)"));
        }

        Ok(())
    }

    /// Resolve the network.
    ///
    /// Without a URL parameter or a stored choice, a stored RPC endpoint
    /// decides; otherwise devnet.
    pub fn network(&self) -> Result<Network> {
        if let Some(network) = self.url_network() {
            return Ok(network);
        }

        if let Some(stored) = self.store.get(NETWORK_KEY)? {
            match stored.parse::<Network>() {
                Ok(network) => return Ok(network),
                Err(e) => warn!("Ignoring stored network: {}", e),
            }
        }

        // keep the network in step with a stored endpoint
        match self.store.get(RPC_URL_KEY)? {
            Some(stored) if Url::parse(&stored).is_ok() => Ok(Network::from_rpc_url(&stored)),
            _ => Ok(Network::Devnet),
        }
    }

    /// Resolve the RPC endpoint
    pub fn rpc_url(&self) -> Result<Url> {
        let stored = self.store.get(RPC_URL_KEY)?;

        if let Some(network) = self.url_network() {
            let target = network.default_rpc_url();
            if let Some(stored) = stored.filter(|s| s != target) {
                info!(
                    "Clearing conflicting stored RPC. URL network: {}, clearing stored: {}",
                    network, stored
                );
                self.store.remove(RPC_URL_KEY)?;
            }
            debug!("Using network from URL: {}, RPC: {}", network, target);
            return Ok(Url::parse(target)?);
        }

        if let Some(stored) = stored {
            match Url::parse(&stored) {
                Ok(url) => {
                    debug!("Using stored RPC: {}", url);
                    return Ok(url);
                }
                Err(e) => warn!("Ignoring malformed stored RPC {}: {}", stored, e),
            }
        }

        let network = self.network()?;
        debug!("Using default RPC for network: {}", network);
        Ok(Url::parse(network.default_rpc_url())?)
    }

    /// Resolve the program id
    pub fn program_id(&self) -> Result<Pubkey> {
        match self.store.get(PROGRAM_ID_KEY)? {
            Some(stored) => match Pubkey::from_str(&stored) {
                Ok(program_id) => Ok(program_id),
                Err(e) => {
                    warn!("Ignoring malformed stored program id {}: {}", stored, e);
                    Ok(SQUADS_PROGRAM_ID)
                }
            },
            None => Ok(SQUADS_PROGRAM_ID),
        }
    }

    /// Resolve the explorer base URL
    pub fn explorer_url(&self) -> Result<String> {
        Ok(self
            .store
            .get(EXPLORER_URL_KEY)?
            .unwrap_or_else(|| DEFAULT_EXPLORER_URL.to_string()))
    }

    /// Resolve all settings into one snapshot
    pub fn resolve(&self) -> Result<Settings> {
        let rpc_url = self.rpc_url()?;

        Ok(Settings {
            network: self.network()?,
            rpc_url,
            program_id: self.program_id()?,
            explorer_url: self.explorer_url()?,
        })
    }

    /// Persist a network choice.
    ///
    /// A stored RPC endpoint that belongs to the other cluster is deleted.
    pub fn set_network(&self, network: Network) -> Result<()> {
        self.store.set(NETWORK_KEY, network.as_str())?;

        if let Some(stored) = self.store.get(RPC_URL_KEY)? {
            if Network::from_rpc_url(&stored) != network {
                info!("Clearing stored RPC {} after switching to {}", stored, network);
                self.store.remove(RPC_URL_KEY)?;
            }
        }

        info!("Network set to {}", network);
        Ok(())
    }

    /// Persist an RPC endpoint
    pub fn set_rpc_url(&self, rpc_url: &str) -> Result<Url> {
        let url = Url::parse(rpc_url)?;

        if let Some(network) = self.url_network() {
            if url.as_str() != Url::parse(network.default_rpc_url())?.as_str() {
                warn!(
                    "URL selects {}; stored RPC {} will be cleared on next read",
                    network, url
                );
            }
        }

        self.store.set(RPC_URL_KEY, rpc_url)?;
        info!("RPC URL set to {}", rpc_url);
        Ok(url)
    }

    /// Persist a program id
    pub fn set_program_id(&self, program_id: &str) -> Result<Pubkey> {
        let parsed = Pubkey::from_str(program_id)
            .map_err(|e| ClientError::InvalidAddress(format!("{}: {}", program_id, e)))?;

        self.store.set(PROGRAM_ID_KEY, &parsed.to_string())?;
        info!("Program id set to {}", parsed);
        Ok(parsed)
    }

    /// Persist an explorer base URL
    pub fn set_explorer_url(&self, explorer_url: &str) -> Result<()> {
        Url::parse(explorer_url)?;

        self.store.set(EXPLORER_URL_KEY, explorer_url)?;
        info!("Explorer URL set to {}", explorer_url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::StaticLocation;
    use crate::storage::MemoryStore;
    use crate::types::{DEVNET_RPC_URL, MAINNET_BETA_RPC_URL};
    use assert_matches::assert_matches;

    fn resolver(url: Option<&str>, store: Arc<MemoryStore>) -> SettingsResolver {
        let location = match url {
            Some(u) => StaticLocation::parse(u).unwrap(),
            None => StaticLocation::empty(),
        };
        SettingsResolver::new(store, Arc::new(location))
    }

    #[test]
    fn test_program_id_constants_agree() {
        assert_eq!(SQUADS_PROGRAM_ID.to_string(), DEFAULT_PROGRAM_ID);
    }

    #[test]
    fn test_defaults() {
        let settings = resolver(None, Arc::new(MemoryStore::new())).resolve().unwrap();

        assert_eq!(settings.network, Network::Devnet);
        assert_eq!(settings.rpc_url.as_str(), "https://api.devnet.solana.com/");
        assert_eq!(settings.program_id.to_string(), DEFAULT_PROGRAM_ID);
        assert_eq!(settings.explorer_url, DEFAULT_EXPLORER_URL);
    }

    #[test]
    fn test_url_network_clears_conflicting_rpc() {
        let store = Arc::new(MemoryStore::with_values([(RPC_URL_KEY, DEVNET_RPC_URL)]));
        let resolver = resolver(Some("https://app.example/?network=mainnet"), store.clone());

        let rpc = resolver.rpc_url().unwrap();
        assert_eq!(rpc, Url::parse(MAINNET_BETA_RPC_URL).unwrap());
        assert_eq!(store.get(RPC_URL_KEY).unwrap(), None);
        assert_eq!(store.mutations(), 1);

        // second read: same answer, nothing left to delete
        assert_eq!(resolver.rpc_url().unwrap(), rpc);
        assert_eq!(store.mutations(), 1);
    }

    #[test]
    fn test_url_network_keeps_matching_rpc() {
        let store = Arc::new(MemoryStore::with_values([(RPC_URL_KEY, MAINNET_BETA_RPC_URL)]));
        let resolver = resolver(Some("https://app.example/?network=mainnet-beta"), store.clone());

        resolver.rpc_url().unwrap();
        assert_eq!(
            store.get(RPC_URL_KEY).unwrap().as_deref(),
            Some(MAINNET_BETA_RPC_URL)
        );
    }

    #[test]
    fn test_url_network_overrides_custom_rpc() {
        let store = Arc::new(MemoryStore::with_values([(
            RPC_URL_KEY,
            "https://my-devnet-node.example",
        )]));
        let resolver = resolver(Some("https://app.example/#/?network=devnet"), store.clone());

        assert_eq!(resolver.rpc_url().unwrap().as_str(), "https://api.devnet.solana.com/");
        assert_eq!(store.get(RPC_URL_KEY).unwrap(), None);
    }

    #[test]
    fn test_unknown_network_param_means_devnet() {
        let store = Arc::new(MemoryStore::with_values([(RPC_URL_KEY, MAINNET_BETA_RPC_URL)]));
        let resolver = resolver(Some("https://app.example/?network=testnet"), store.clone());

        assert_eq!(resolver.network().unwrap(), Network::Devnet);
        assert_eq!(resolver.rpc_url().unwrap().as_str(), "https://api.devnet.solana.com/");
        assert_eq!(store.get(RPC_URL_KEY).unwrap(), None);
    }

    #[test]
    fn test_stored_rpc_without_url_param() {
        let store = Arc::new(MemoryStore::with_values([(
            RPC_URL_KEY,
            "https://rpc.example.org/",
        )]));
        let resolver = resolver(Some("https://app.example/"), store);

        assert_eq!(resolver.rpc_url().unwrap().as_str(), "https://rpc.example.org/");
    }

    #[test]
    fn test_malformed_stored_values_fall_back() {
        let store = Arc::new(MemoryStore::with_values([
            (RPC_URL_KEY, "not a url"),
            (PROGRAM_ID_KEY, "zzz"),
            (NETWORK_KEY, "localnet"),
        ]));
        let settings = resolver(None, store).resolve().unwrap();

        assert_eq!(settings.network, Network::Devnet);
        assert_eq!(settings.rpc_url.as_str(), "https://api.devnet.solana.com/");
        assert_eq!(settings.program_id.to_string(), DEFAULT_PROGRAM_ID);
    }

    #[test]
    fn test_stored_network_selects_default_rpc() {
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver(None, store);

        resolver.set_network(Network::MainnetBeta).unwrap();
        let settings = resolver.resolve().unwrap();
        assert_eq!(settings.network, Network::MainnetBeta);
        assert_eq!(settings.rpc_url, Url::parse(MAINNET_BETA_RPC_URL).unwrap());
    }

    #[test]
    fn test_stored_rpc_decides_network() {
        let resolver = resolver(None, Arc::new(MemoryStore::new()));

        resolver.set_rpc_url(MAINNET_BETA_RPC_URL).unwrap();
        let settings = resolver.resolve().unwrap();
        assert_eq!(settings.network, Network::MainnetBeta);
        assert_eq!(settings.rpc_url, Url::parse(MAINNET_BETA_RPC_URL).unwrap());

        let signature = Signature::default();
        assert_eq!(
            settings.explorer_tx_url(&signature),
            format!("https://explorer.solana.com/tx/{}", signature)
        );
    }

    #[test]
    fn test_stored_network_beats_stored_rpc() {
        let store = Arc::new(MemoryStore::with_values([
            (NETWORK_KEY, "devnet"),
            (RPC_URL_KEY, "https://my-devnet-node.example"),
        ]));
        let settings = resolver(None, store).resolve().unwrap();

        assert_eq!(settings.network, Network::Devnet);
        assert_eq!(settings.rpc_url.as_str(), "https://my-devnet-node.example/");
    }

    #[test]
    fn test_set_network_drops_other_cluster_rpc() {
        let store = Arc::new(MemoryStore::with_values([(RPC_URL_KEY, DEVNET_RPC_URL)]));
        let resolver = resolver(None, store.clone());

        resolver.set_network(Network::MainnetBeta).unwrap();
        assert_eq!(store.get(RPC_URL_KEY).unwrap(), None);
    }

    #[test]
    fn test_writes_visible_immediately() {
        let resolver = resolver(None, Arc::new(MemoryStore::new()));

        resolver.set_rpc_url("https://rpc.example.org").unwrap();
        let program_id = Pubkey::new_unique();
        resolver.set_program_id(&program_id.to_string()).unwrap();
        resolver.set_explorer_url("https://solscan.io").unwrap();

        let settings = resolver.resolve().unwrap();
        assert_eq!(settings.rpc_url.as_str(), "https://rpc.example.org/");
        assert_eq!(settings.program_id, program_id);
        assert_eq!(settings.explorer_url, "https://solscan.io");
    }

    #[test]
    fn test_invalid_writes_rejected() {
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver(None, store.clone());

        assert_matches!(
            resolver.set_rpc_url("ftp//broken"),
            Err(ClientError::UrlParseError(_))
        );
        assert_matches!(
            resolver.set_program_id("not-a-key"),
            Err(ClientError::InvalidAddress(_))
        );
        assert_eq!(store.mutations(), 0);
    }

    #[test]
    fn test_bootstrap_reconciles_once() {
        let store = Arc::new(MemoryStore::with_values([(
            RPC_URL_KEY,
            "https://my-devnet-node.example",
        )]));
        let resolver = resolver(Some("https://app.example/?network=mainnet"), store.clone());

        resolver.bootstrap().unwrap();
        assert_eq!(store.get(RPC_URL_KEY).unwrap(), None);
    }

    #[test]
    fn test_bootstrap_keeps_consistent_rpc() {
        let store = Arc::new(MemoryStore::with_values([(
            RPC_URL_KEY,
            "https://my-devnet-node.example",
        )]));
        let resolver = resolver(Some("https://app.example/?network=devnet"), store.clone());

        resolver.bootstrap().unwrap();
        assert!(store.get(RPC_URL_KEY).unwrap().is_some());
    }

    #[test]
    fn test_bootstrap_ignores_empty_network_param() {
        let store = Arc::new(MemoryStore::with_values([(RPC_URL_KEY, MAINNET_BETA_RPC_URL)]));
        let resolver = resolver(Some("https://app.example/?network="), store.clone());

        resolver.bootstrap().unwrap();
        assert_eq!(
            store.get(RPC_URL_KEY).unwrap().as_deref(),
            Some(MAINNET_BETA_RPC_URL)
        );
        assert_eq!(resolver.url_network(), None);
        assert_eq!(resolver.resolve().unwrap().network, Network::MainnetBeta);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let store = Arc::new(MemoryStore::with_values([(EXPLORER_URL_KEY, "https://solscan.io")]));
        let resolver = resolver(Some("https://app.example/?network=mainnet"), store.clone());

        let first = resolver.resolve().unwrap();
        let second = resolver.resolve().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.mutations(), 0);
    }

    #[test]
    fn test_explorer_links() {
        let mut settings = resolver(None, Arc::new(MemoryStore::new())).resolve().unwrap();
        let signature = Signature::default();

        assert_eq!(
            settings.explorer_tx_url(&signature),
            format!("https://explorer.solana.com/tx/{}?cluster=devnet", signature)
        );

        settings.network = Network::MainnetBeta;
        settings.explorer_url = "https://solscan.io/".to_string();
        let address = Pubkey::new_unique();
        assert_eq!(
            settings.explorer_address_url(&address),
            format!("https://solscan.io/address/{}", address)
        );
    }
}
