// ABOUTME: Lock store abstraction guarding concurrent suggestion generation
// ABOUTME: Pluggable backends (in-memory, Redis) behind one atomic contract
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Suggestion Locks
//!
//! Streaming caption requests race when a client submits captions faster
//! than suggestions generate. A short-lived lock per conversation ensures
//! at most one in-flight suggestion; contenders skip generation silently.
//!
//! The contract is an atomic check-and-set with expiry. The in-memory
//! backend covers single-process deployments; Redis covers multi-instance
//! ones. Locks always carry a TTL so a crashed holder cannot wedge a
//! conversation.

/// Backend selection from configuration
pub mod factory;
/// In-memory lock store
pub mod memory;
/// Redis-backed lock store
pub mod redis;

pub use factory::create_lock_store;
pub use memory::MemoryLockStore;
pub use redis::RedisLockStore;

use crate::errors::AppResult;
use std::time::Duration;

/// Lock store contract
///
/// `try_acquire` must be atomic: two concurrent calls for the same key
/// may both see the key absent, but only one may win.
#[async_trait::async_trait]
pub trait LockStore: Send + Sync {
    /// Attempt to take the lock for `key` with the given TTL
    ///
    /// Returns `true` if this caller now holds the lock, `false` if
    /// another holder has it and its TTL has not lapsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable
    async fn try_acquire(&self, key: &str, ttl: Duration) -> AppResult<bool>;

    /// Release the lock for `key`
    ///
    /// Releasing an unheld or expired lock is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable
    async fn release(&self, key: &str) -> AppResult<()>;
}

/// Lock key scoping suggestion generation to one conversation
#[must_use]
pub fn suggestion_lock_key(conversation_id: &str) -> String {
    format!("suggest:conversation:{conversation_id}")
}
