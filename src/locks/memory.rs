// ABOUTME: In-memory lock store with LRU capacity bounds and TTL expiry
// ABOUTME: Includes a background sweeper task for lapsed locks
//
// Licensed under either of Apache License, Version 2.0 or MIT License at
// your option.

use super::LockStore;
use crate::constants::limits;
use crate::errors::{AppError, AppResult};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// In-memory lock store for single-process deployments
///
/// Holds lock expiry instants in an `Arc<RwLock<LruCache>>`. Acquisition
/// checks and inserts under one write guard, which makes the
/// check-and-set atomic. The Arc is shared with the background sweeper
/// task that drops lapsed locks so the LRU does not fill with dead keys.
#[derive(Clone)]
pub struct MemoryLockStore {
    store: Arc<RwLock<LruCache<String, Instant>>>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl MemoryLockStore {
    /// Fallback capacity when the configured bound is zero
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create a lock store with default capacity and a background sweeper
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(
            limits::LOCK_STORE_MAX_ENTRIES,
            Duration::from_secs(limits::LOCK_SWEEP_INTERVAL_SECS),
            true,
        )
    }

    /// Create a lock store without the background sweeper
    ///
    /// Expired locks are still released lazily on acquisition; only the
    /// proactive sweep is skipped.
    #[must_use]
    pub fn without_sweeper() -> Self {
        Self::with_options(
            limits::LOCK_STORE_MAX_ENTRIES,
            Duration::from_secs(limits::LOCK_SWEEP_INTERVAL_SECS),
            false,
        )
    }

    fn with_options(max_entries: usize, sweep_interval: Duration, background_sweep: bool) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(Self::DEFAULT_CAPACITY);
        let store = Arc::new(RwLock::new(LruCache::new(capacity)));

        let shutdown_tx = if background_sweep {
            let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
            let store_clone = Arc::clone(&store);

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::sweep_expired(&store_clone).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("Lock sweeper received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Some(Arc::new(shutdown_tx))
        } else {
            None
        };

        Self { store, shutdown_tx }
    }

    /// Drop all locks whose TTL has lapsed
    async fn sweep_expired(store: &Arc<RwLock<LruCache<String, Instant>>>) {
        let now = Instant::now();
        let mut guard = store.write().await;

        let lapsed: Vec<String> = guard
            .iter()
            .filter_map(|(key, expires_at)| (*expires_at <= now).then(|| key.clone()))
            .collect();

        for key in &lapsed {
            guard.pop(key);
        }

        let removed = lapsed.len();
        drop(guard);
        if removed > 0 {
            tracing::debug!("Swept {} expired suggestion locks", removed);
        }
    }
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let mut store = self.store.write().await;

        if let Some(expires_at) = store.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }

        // A full cache must never evict a live lock to make room; sweep
        // lapsed entries inline and refuse when every slot is still held
        if !store.contains(key) && store.len() == store.cap().get() {
            let lapsed: Vec<String> = store
                .iter()
                .filter_map(|(held, expires_at)| (*expires_at <= now).then(|| held.clone()))
                .collect();
            for held in &lapsed {
                store.pop(held);
            }
            if store.len() == store.cap().get() {
                return Err(AppError::internal("Suggestion lock store is at capacity"));
            }
        }

        store.push(key.to_owned(), now + ttl);
        Ok(true)
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        self.store.write().await.pop(key);
        Ok(())
    }
}

impl Drop for MemoryLockStore {
    fn drop(&mut self) {
        // The sweeper exits once every sender clone is gone; the explicit
        // signal just shortens the wait
        if let Some(tx) = &self.shutdown_tx {
            if let Err(e) = tx.try_send(()) {
                tracing::debug!(error = ?e, "Lock sweeper shutdown signal send failed");
            }
        }
    }
}
