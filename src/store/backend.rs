//! Pluggable backend trait for key-value storage.
//!
//! Allows swapping between in-memory (single process, tests) and Redis
//! (persistent across restarts) for both the post cache and the bot state.

use async_trait::async_trait;
use std::time::Duration;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from store backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Stored bot state exists but cannot be decoded.
    #[error("Corrupted bot state under key {key}: {source}")]
    CorruptedState {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

/// Trait for string-keyed storage backends.
///
/// Every write replaces the whole value under a key. Concurrent writers on
/// the same key race; the last write wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key` without expiration.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Store `value` under `key`, expiring after `ttl` (whole seconds).
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// TTL rounded to whole seconds, never below one.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
