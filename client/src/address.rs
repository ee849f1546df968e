//! Active multisig and vault resolution.

use crate::error::{ClientError, Result};
use crate::location::{url_param, UrlSource};
use crate::pda::vault_address;
use crate::settings::Settings;
use crate::storage::{KeyValueStore, MULTISIG_KEY, VAULT_INDEX_KEY};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Name of the URL parameter carrying the multisig address
pub const MULTISIG_PARAM: &str = "multisig";

/// Path segment preceding an address in `/squads/{address}` links
pub const SQUADS_PATH_SEGMENT: &str = "squads";

/// Resolved multisig and its vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedAddresses {
    /// Selected multisig
    pub multisig: Pubkey,
    /// Vault derived from the multisig
    pub vault: Pubkey,
    /// Index the vault was derived at
    pub vault_index: u8,
}

/// Resolves the selected multisig from the URL and durable storage
#[derive(Clone)]
pub struct AddressResolver {
    store: Arc<dyn KeyValueStore>,
    location: Arc<dyn UrlSource>,
    default_vault_index: u8,
}

impl AddressResolver {
    /// Create a resolver
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        location: Arc<dyn UrlSource>,
        default_vault_index: u8,
    ) -> Self {
        Self {
            store,
            location,
            default_vault_index,
        }
    }

    /// Address carried by the current URL, as a `multisig` parameter or a
    /// `/squads/{address}` path
    pub fn url_multisig(&self) -> Option<Pubkey> {
        let url = self.location.current()?;

        if let Some(param) = url_param(&url, MULTISIG_PARAM).filter(|p| !p.is_empty()) {
            match Pubkey::from_str(&param) {
                Ok(address) => return Some(address),
                Err(e) => warn!("Ignoring multisig parameter {}: {}", param, e),
            }
        }

        squads_path_address(&url)
    }

    /// Selected multisig, or `None` when nothing is selected.
    ///
    /// An address found in the URL is persisted so it survives navigation.
    pub fn multisig_address(&self) -> Result<Option<Pubkey>> {
        if let Some(address) = self.url_multisig() {
            let encoded = address.to_string();
            if self.store.get(MULTISIG_KEY)?.as_deref() != Some(encoded.as_str()) {
                info!("Multisig {} selected from URL", address);
                self.store.set(MULTISIG_KEY, &encoded)?;
            }
            return Ok(Some(address));
        }

        match self.store.get(MULTISIG_KEY)? {
            Some(stored) => match Pubkey::from_str(&stored) {
                Ok(address) => Ok(Some(address)),
                Err(e) => {
                    warn!("Ignoring malformed stored multisig {}: {}", stored, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Select a multisig, or clear the selection with `None`
    pub fn set_multisig_address(&self, address: Option<Pubkey>) -> Result<()> {
        match address {
            Some(address) => {
                self.store.set(MULTISIG_KEY, &address.to_string())?;
                info!("Multisig set to {}", address);
            }
            None => {
                self.store.remove(MULTISIG_KEY)?;
                info!("Multisig selection cleared");
            }
        }
        Ok(())
    }

    /// Vault index, falling back to the configured default
    pub fn vault_index(&self) -> Result<u8> {
        match self.store.get(VAULT_INDEX_KEY)? {
            Some(stored) => match stored.parse::<u8>() {
                Ok(index) => Ok(index),
                Err(e) => {
                    warn!("Ignoring stored vault index {}: {}", stored, e);
                    Ok(self.default_vault_index)
                }
            },
            None => Ok(self.default_vault_index),
        }
    }

    /// Persist a vault index
    pub fn set_vault_index(&self, index: u8) -> Result<()> {
        self.store.set(VAULT_INDEX_KEY, &index.to_string())?;
        info!("Vault index set to {}", index);
        Ok(())
    }

    /// Resolve the multisig and derive its vault under `settings`
    pub fn resolve(&self, settings: &Settings) -> Result<Option<ResolvedAddresses>> {
        let Some(multisig) = self.multisig_address()? else {
            debug!("No multisig selected");
            return Ok(None);
        };

        let vault_index = self.vault_index()?;
        let vault = vault_address(&multisig, vault_index, &settings.program_id);
        debug!("Vault {} (index {}) for multisig {}", vault, vault_index, multisig);

        Ok(Some(ResolvedAddresses {
            multisig,
            vault,
            vault_index,
        }))
    }

    /// Like [`resolve`](Self::resolve), failing when nothing is selected
    pub fn require(&self, settings: &Settings) -> Result<ResolvedAddresses> {
        self.resolve(settings)?.ok_or(ClientError::NoMultisigSelected)
    }
}

/// Address in a `/squads/{address}` path; the token is 32 to 44 alphanumerics.
///
/// Every `/squads/` occurrence is tried in order until one carries a long
/// enough token.
fn squads_path_address(url: &Url) -> Option<Pubkey> {
    let path = url.path();
    let marker = "/squads/";

    let token: String = path.match_indices(marker).find_map(|(at, _)| {
        let token: String = path[at + marker.len()..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .take(44)
            .collect();
        (token.len() >= 32).then_some(token)
    })?;

    match Pubkey::from_str(&token) {
        Ok(address) => Some(address),
        Err(e) => {
            warn!("Ignoring /{}/ path token {}: {}", SQUADS_PATH_SEGMENT, token, e);
            None
        }
    }
}
