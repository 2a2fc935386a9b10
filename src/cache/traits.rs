//! Cache backend trait definition
//!
//! `CacheBackend` is the pluggable byte store behind the cache manager. Keys
//! are cache-key strings and values are encoded entry records; a backend
//! never interprets either.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use super::error::CacheError;
use super::stats::CacheStats;

/// Byte store for encoded cache records (memory, redis, none)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the record stored under `key`
    /// Returns None if the key is not present
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `value` under `key`, replacing any previous record
    /// `ttl` is a hint; backends with their own expiry policy may ignore it
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove the record under `key`
    /// Returns true if a record was removed
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Short backend name for logs and metrics labels
    fn name(&self) -> &'static str;

    /// Get backend statistics
    async fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    /// Run pending maintenance synchronously (used by tests)
    /// Default implementation is a no-op
    async fn run_pending_tasks(&self) {}

    /// Stop background work owned by the backend
    async fn shutdown(&self) {}
}
