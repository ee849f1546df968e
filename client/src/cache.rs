//! Invalidation of the externally owned transaction-listing cache.

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

/// Refreshes whatever displays the transaction list
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Mark the transaction listing stale
    async fn invalidate_transactions(&self);
}

/// Invalidator that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidator;

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn invalidate_transactions(&self) {}
}

/// Publishes a generation counter that readers watch for changes
#[derive(Debug)]
pub struct WatchInvalidator {
    generation: watch::Sender<u64>,
}

impl WatchInvalidator {
    /// Start at generation 0
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    /// Receiver that wakes on every invalidation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }
}

impl Default for WatchInvalidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheInvalidator for WatchInvalidator {
    async fn invalidate_transactions(&self) {
        self.generation.send_modify(|generation| *generation += 1);
        debug!("Transaction cache invalidated (generation {})", self.generation());
    }
}
