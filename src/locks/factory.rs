// ABOUTME: Lock store factory selecting a backend from configuration
// ABOUTME: Redis when REDIS_URL is set, in-memory otherwise
//
// Licensed under either of Apache License, Version 2.0 or MIT License at
// your option.

use super::{memory::MemoryLockStore, redis::RedisLockStore, LockStore};
use crate::config::LockConfig;
use crate::errors::AppResult;
use std::sync::Arc;

/// Create the lock store described by `config`
///
/// With a Redis URL the store coordinates across server instances; the
/// in-memory fallback only guards a single process.
///
/// # Errors
///
/// Returns an error if the Redis connection cannot be established
pub async fn create_lock_store(config: &LockConfig) -> AppResult<Arc<dyn LockStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisLockStore::connect(url).await?;
            tracing::info!("Using Redis lock store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Using in-memory lock store");
            Ok(Arc::new(MemoryLockStore::new()))
        }
    }
}
