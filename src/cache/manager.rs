//! Typed cache facade
//!
//! `CacheManager` turns a byte-oriented [`CacheBackend`] into `CachedEntry`
//! operations. Backend failures and undecodable records are logged and
//! reported as misses; nothing here returns an error to the resolver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::codec::{deserialize_entry, serialize_entry};
use super::config::{CacheBackendKind, CacheConfig};
use super::entry::{CacheKey, CachedEntry};
use super::error::CacheError;
use super::memory::{BoundedMemoryCache, NullCache};
use super::redis::RedisBackend;
use super::stats::{CacheStats, CacheStatsTracker};
use super::traits::CacheBackend;
use crate::cancel::Cancellation;
use crate::metrics::{cache_metrics, CacheMetrics, NoopMetrics};

/// Build the backend selected by configuration
///
/// # Errors
/// Returns CacheError::ConfigurationError if the selected backend's
/// settings are invalid. Connectivity is not checked here; an unreachable
/// Redis degrades to misses at request time.
pub fn build_backend(
    config: &CacheConfig,
    metrics: Arc<dyn CacheMetrics>,
) -> Result<Arc<dyn CacheBackend>, CacheError> {
    let backend: Arc<dyn CacheBackend> = match config.backend {
        CacheBackendKind::Memory => Arc::new(BoundedMemoryCache::with_metrics(
            &config.memory,
            metrics,
        )),
        CacheBackendKind::Redis => Arc::new(RedisBackend::new(config.redis.clone(), metrics)?),
        CacheBackendKind::None => Arc::new(NullCache),
    };
    tracing::info!(backend = backend.name(), "Cache backend selected");
    Ok(backend)
}

/// Cache facade used by the resolver
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
    metrics: Arc<dyn CacheMetrics>,
    stats: CacheStatsTracker,
    ttl: Option<Duration>,
}

impl CacheManager {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        metrics: Arc<dyn CacheMetrics>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            metrics,
            stats: CacheStatsTracker::new(),
            ttl,
        }
    }

    /// Build the configured backend and metrics sink
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let metrics = cache_metrics(config.metrics_enabled);
        let backend = build_backend(config, metrics.clone())?;
        Ok(Self::new(backend, metrics, config.entry_ttl()))
    }

    /// Manager with caching disabled
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullCache), Arc::new(NoopMetrics), None)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Look up an entry
    ///
    /// Returns None on a miss, a backend failure, a corrupt record, or when
    /// `cancel` is already set. Corrupt records are removed best-effort.
    pub async fn get_entry(&self, key: &CacheKey, cancel: &Cancellation) -> Option<CachedEntry> {
        if cancel.is_cancelled() {
            return None;
        }

        let started = Instant::now();
        let result = self.backend.get(key.as_str()).await;
        self.metrics.observe_operation("get", started.elapsed());

        let record = match result {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.record_miss();
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    key = %key,
                    error = %e,
                    "Cache lookup failed, treating as miss"
                );
                self.metrics.record_backend_error(self.backend.name());
                self.record_miss();
                return None;
            }
        };

        match deserialize_entry(&record) {
            Ok(entry) => {
                self.stats.increment_hits();
                self.metrics.record_hit();
                Some(entry)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding corrupt cache record");
                self.record_miss();
                if let Err(e) = self.backend.remove(key.as_str()).await {
                    tracing::debug!(key = %key, error = %e, "Failed to remove corrupt record");
                }
                None
            }
        }
    }

    /// Store an entry; returns whether the backend accepted it
    pub async fn set_entry(
        &self,
        key: &CacheKey,
        entry: &CachedEntry,
        cancel: &Cancellation,
    ) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        let record = match serialize_entry(entry) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Entry not cacheable");
                return false;
            }
        };
        let len = record.len();

        let started = Instant::now();
        let result = self.backend.set(key.as_str(), record, self.ttl).await;
        self.metrics.observe_operation("set", started.elapsed());

        match result {
            Ok(()) => {
                self.metrics.record_store(len);
                true
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    key = %key,
                    error = %e,
                    "Cache store failed"
                );
                self.metrics.record_backend_error(self.backend.name());
                false
            }
        }
    }

    /// Remove an entry; returns whether one was removed
    pub async fn remove(&self, key: &CacheKey, cancel: &Cancellation) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        let started = Instant::now();
        let result = self.backend.remove(key.as_str()).await;
        self.metrics.observe_operation("remove", started.elapsed());

        match result {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    key = %key,
                    error = %e,
                    "Cache remove failed"
                );
                self.metrics.record_backend_error(self.backend.name());
                false
            }
        }
    }

    /// Remove an entry whose origin copy changed
    pub async fn invalidate(&self, key: &CacheKey, cancel: &Cancellation) -> bool {
        let removed = self.remove(key, cancel).await;
        if removed {
            self.metrics.record_invalidation();
            tracing::debug!(key = %key, "Invalidated stale cache entry");
        }
        removed
    }

    /// Hit/miss counts seen by the manager plus backend occupancy
    pub async fn stats(&self) -> CacheStats {
        let backend = self.backend.stats().await;
        let mut stats = self.stats.snapshot(
            backend.current_size_bytes,
            backend.current_item_count,
            backend.max_size_bytes,
        );
        stats.evictions = backend.evictions;
        stats
    }

    /// Run pending backend maintenance synchronously
    pub async fn run_pending_tasks(&self) {
        self.backend.run_pending_tasks().await;
    }

    /// Stop background work owned by the backend
    pub async fn shutdown(&self) {
        self.backend.shutdown().await;
    }

    fn record_miss(&self) {
        self.stats.increment_misses();
        self.metrics.record_miss();
    }
}
