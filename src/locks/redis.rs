// ABOUTME: Redis-backed lock store for multi-instance deployments
// ABOUTME: SET NX EX gives the atomic check-and-set with expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::LockStore;
use crate::errors::{AppError, AppResult};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};

/// Namespace prefix for lock keys
const LOCK_KEY_PREFIX: &str = "apuntador:lock:";

/// Connection timeout for the initial Redis handshake
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Per-command response timeout
const RESPONSE_TIMEOUT_SECS: u64 = 2;

/// Initial connection attempts before giving up at startup
const INITIAL_CONNECTION_RETRIES: u32 = 3;

/// Delay between initial connection attempts
const INITIAL_RETRY_DELAY_MS: u64 = 500;

/// Redis lock store
///
/// Uses `ConnectionManager` for automatic reconnection. Acquisition maps
/// to `SET key 1 NX EX ttl`, which checks and sets in one atomic server
/// operation, so instances sharing the Redis coordinate correctly.
#[derive(Clone)]
pub struct RedisLockStore {
    manager: ConnectionManager,
}

impl RedisLockStore {
    /// Connect to Redis at `redis_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established after
    /// retries
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        info!("Connecting to Redis lock store at {}", redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::config(format!("Invalid Redis URL: {e}")))?;

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .set_response_timeout(Duration::from_secs(RESPONSE_TIMEOUT_SECS));

        let mut last_error = None;
        for attempt in 0..=INITIAL_CONNECTION_RETRIES {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(Self { manager });
                }
                Err(e) => {
                    if attempt < INITIAL_CONNECTION_RETRIES {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying: {}",
                            attempt + 1,
                            INITIAL_CONNECTION_RETRIES + 1,
                            e
                        );
                        tokio::time::sleep(Duration::from_millis(INITIAL_RETRY_DELAY_MS)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::config(format!(
            "Failed to connect to Redis after {} attempts: {}",
            INITIAL_CONNECTION_RETRIES + 1,
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
        )))
    }

    fn build_key(key: &str) -> String {
        format!("{LOCK_KEY_PREFIX}{key}")
    }
}

#[async_trait::async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        // SET NX EX returns OK when the key was set, Nil when it existed
        let outcome: Option<String> = redis::cmd("SET")
            .arg(&redis_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::internal(format!("Redis lock acquire failed: {e}")))?;

        Ok(outcome.is_some())
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        conn.del::<_, ()>(&redis_key)
            .await
            .map_err(|e| AppError::internal(format!("Redis lock release failed: {e}")))?;

        Ok(())
    }
}
