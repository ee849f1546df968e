//! Durable key-value storage for settings.
//!
//! Values are plain strings. Both stores keep an in-memory map that is updated
//! before the call returns, so reads issued right after a write observe it.

use crate::error::{ClientError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Storage key for the selected multisig
pub const MULTISIG_KEY: &str = "x-multisig-v4";
/// Storage key for the RPC endpoint
pub const RPC_URL_KEY: &str = "x-rpc-url";
/// Storage key for the program id
pub const PROGRAM_ID_KEY: &str = "x-program-id-v4";
/// Storage key for the explorer base URL
pub const EXPLORER_URL_KEY: &str = "x-explorer-url";
/// Storage key for the network choice
pub const NETWORK_KEY: &str = "x-network";
/// Storage key for the vault index
pub const VAULT_INDEX_KEY: &str = "x-vault-index";

/// Durable string storage
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; deleting a missing key is a no-op
    fn remove(&self, key: &str) -> Result<()>;
}

fn poisoned<T>(_: PoisonError<T>) -> ClientError {
    ClientError::SettingsPersistenceFailed("storage lock poisoned".to_string())
}

/// Process-local store, mostly for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
    mutations: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial values
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            mutations: AtomicU64::new(0),
        }
    }

    /// Number of writes and deletes that changed the contents
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let previous = self
            .values
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.values.write().map_err(poisoned)?.remove(key).is_some() {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// JSON file backed store that survives restarts
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty when the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(ClientError::SettingsPersistenceFailed(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        debug!("Opened settings store at {}", path.display());

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let write = || -> io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_vec_pretty(values)?;
            let tmp = self.path.with_extension("tmp");
            fs::write(&tmp, contents)?;
            fs::rename(&tmp, &self.path)
        };

        write().map_err(|e| {
            warn!("Failed to persist settings to {}: {}", self.path.display(), e);
            ClientError::SettingsPersistenceFailed(format!("{}: {}", self.path.display(), e))
        })
    }

    fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let mut values = self.values.write().map_err(poisoned)?;
        let mut next = values.clone();
        if !apply(&mut next) {
            return Ok(());
        }
        // memory only moves forward once the file has been written
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| values.remove(key).is_some())
    }
}
