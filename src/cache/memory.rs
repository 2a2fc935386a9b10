//! Memory cache implementation
//!
//! This module provides in-memory cache backends:
//! - `BoundedMemoryCache`: size-capped, age-expiring LRU store with two
//!   background maintenance workers
//! - `NullCache`: No-op implementation for disabled caching
//!
//! # Maintenance
//!
//! Foreground calls never wait for maintenance; they only signal it.
//!
//! - Compaction runs whenever a write pushes the total stored bytes over
//!   `max_size_bytes`, removing the least recently accessed entries until
//!   the total is back within budget.
//! - Purging sleeps until the least recently accessed entry reaches
//!   `max_age_seconds`, then drops everything at least that old. It idles
//!   while the map is empty and is woken by the next insert.
//!
//! Both workers are started on the first write and stopped by
//! [`BoundedMemoryCache::shutdown`] (or when the cache is dropped). Repeated
//! triggers coalesce into a single extra pass. Limits are read on every
//! decision, so [`BoundedMemoryCache::update_limits`] takes effect at once.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::MemoryCacheConfig;
use super::error::CacheError;
use super::stats::{CacheStats, CacheStatsTracker};
use super::traits::CacheBackend;
use crate::constants::WORKER_SHUTDOWN_GRACE_MS;
use crate::metrics::{CacheMetrics, NoopMetrics};

/// One stored value with its recency bookkeeping
struct Slot {
    value: Bytes,
    /// Position in the global access order (higher is more recent)
    seq: AtomicU64,
    /// Last access, in milliseconds since the cache was created
    at_ms: AtomicU64,
}

/// State shared between the cache handle and its workers
struct Inner {
    map: RwLock<HashMap<String, Slot>>,
    size_bytes: AtomicU64,
    access_clock: AtomicU64,
    created_at: Instant,
    limits: ArcSwap<MemoryCacheConfig>,
    compact_signal: Notify,
    purge_signal: Notify,
    stats: CacheStatsTracker,
    metrics: Arc<dyn CacheMetrics>,
}

impl Inner {
    fn now_ms(&self) -> u64 {
        self.created_at.elapsed().as_millis() as u64
    }

    fn next_seq(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn over_budget(&self) -> bool {
        self.size_bytes.load(Ordering::Acquire) > self.limits.load().max_size_bytes
    }

    fn get(&self, key: &str) -> Option<Bytes> {
        let map = self.map.read();
        let slot = map.get(key)?;
        slot.seq.store(self.next_seq(), Ordering::Relaxed);
        slot.at_ms.store(self.now_ms(), Ordering::Relaxed);
        Some(slot.value.clone())
    }

    /// Insert or replace; returns true when the map was empty before
    fn set(&self, key: &str, value: Bytes) -> bool {
        let len = value.len() as u64;
        let slot = Slot {
            value,
            seq: AtomicU64::new(self.next_seq()),
            at_ms: AtomicU64::new(self.now_ms()),
        };

        let mut map = self.map.write();
        let was_empty = map.is_empty();
        if let Some(previous) = map.insert(key.to_string(), slot) {
            self.size_bytes
                .fetch_sub(previous.value.len() as u64, Ordering::AcqRel);
        }
        self.size_bytes.fetch_add(len, Ordering::AcqRel);
        was_empty
    }

    fn remove(&self, key: &str) -> bool {
        let mut map = self.map.write();
        match map.remove(key) {
            Some(slot) => {
                self.size_bytes
                    .fetch_sub(slot.value.len() as u64, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    /// Remove `key` only if nothing touched it since the snapshot
    fn evict_if<F>(&self, key: &str, unchanged: F) -> bool
    where
        F: FnOnce(&Slot) -> bool,
    {
        let mut map = self.map.write();
        if !map.get(key).map(unchanged).unwrap_or(false) {
            return false;
        }
        match map.remove(key) {
            Some(slot) => {
                self.size_bytes
                    .fetch_sub(slot.value.len() as u64, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    /// Evict least recently accessed entries until within budget
    fn compact(&self) -> u64 {
        let mut evicted = 0;
        while self.over_budget() {
            let mut order: Vec<(u64, String)> = {
                let map = self.map.read();
                map.iter()
                    .map(|(key, slot)| (slot.seq.load(Ordering::Relaxed), key.clone()))
                    .collect()
            };
            if order.is_empty() {
                break;
            }
            order.sort_unstable_by_key(|(seq, _)| *seq);

            for (seq, key) in order {
                if !self.over_budget() {
                    break;
                }
                // A failed removal means the entry was touched or is gone.
                if self.evict_if(&key, |slot| slot.seq.load(Ordering::Relaxed) == seq) {
                    evicted += 1;
                }
            }
        }
        self.record_evictions(evicted, "compaction");
        evicted
    }

    /// Drop entries idle for at least `max_age`
    ///
    /// Returns the instant at which the oldest survivor expires, or None
    /// when the map is empty.
    fn purge(&self, max_age: Duration) -> Option<Instant> {
        let max_age_ms = max_age.as_millis() as u64;
        let now = self.now_ms();

        let expired: Vec<(String, u64)> = {
            let map = self.map.read();
            map.iter()
                .map(|(key, slot)| (key.clone(), slot.at_ms.load(Ordering::Relaxed)))
                .filter(|(_, at)| now.saturating_sub(*at) >= max_age_ms)
                .collect()
        };

        let mut purged = 0;
        for (key, at) in expired {
            if self.evict_if(&key, |slot| slot.at_ms.load(Ordering::Relaxed) == at) {
                purged += 1;
            }
        }
        self.record_evictions(purged, "purge");

        let oldest = {
            let map = self.map.read();
            map.values()
                .map(|slot| slot.at_ms.load(Ordering::Relaxed))
                .min()
        }?;
        Some(self.created_at + Duration::from_millis(oldest.saturating_add(max_age_ms)))
    }

    fn record_evictions(&self, count: u64, reason: &'static str) {
        if count == 0 {
            return;
        }
        self.stats.add_evictions(count);
        self.metrics.record_evictions(count);
        tracing::debug!(
            evicted = count,
            reason = reason,
            size_bytes = self.size_bytes.load(Ordering::Relaxed),
            "Memory cache maintenance pass"
        );
    }
}

async fn compaction_worker(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = inner.compact_signal.notified() => {}
            _ = shutdown.changed() => break,
        }
        inner.compact();
    }
    tracing::debug!("Memory cache compaction worker stopped");
}

async fn purge_worker(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let deadline = inner
            .limits
            .load()
            .max_age()
            .and_then(|max_age| inner.purge(max_age));

        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = inner.purge_signal.notified() => {}
                    _ = shutdown.changed() => break,
                }
            }
            None => {
                tokio::select! {
                    _ = inner.purge_signal.notified() => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }
    tracing::debug!("Memory cache purge worker stopped");
}

struct Workers {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Size- and age-bounded in-memory cache backend
pub struct BoundedMemoryCache {
    inner: Arc<Inner>,
    workers: Mutex<Option<Workers>>,
    closed: AtomicBool,
}

impl BoundedMemoryCache {
    /// Create a new cache from configuration
    pub fn new(config: &MemoryCacheConfig) -> Self {
        Self::with_metrics(config, Arc::new(NoopMetrics))
    }

    /// Create a new cache reporting evictions to `metrics`
    pub fn with_metrics(config: &MemoryCacheConfig, metrics: Arc<dyn CacheMetrics>) -> Self {
        Self {
            inner: Arc::new(Inner {
                map: RwLock::new(HashMap::new()),
                size_bytes: AtomicU64::new(0),
                access_clock: AtomicU64::new(0),
                created_at: Instant::now(),
                limits: ArcSwap::from_pointee(config.clone()),
                compact_signal: Notify::new(),
                purge_signal: Notify::new(),
                stats: CacheStatsTracker::new(),
                metrics,
            }),
            workers: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the size and age limits; workers re-evaluate immediately
    pub fn update_limits(&self, config: MemoryCacheConfig) {
        tracing::info!(
            max_size_bytes = config.max_size_bytes,
            max_age_seconds = config.max_age_seconds,
            "Memory cache limits updated"
        );
        self.inner.limits.store(Arc::new(config));
        if !self.ensure_workers() && self.inner.over_budget() {
            self.inner.compact();
        }
        self.inner.compact_signal.notify_one();
        self.inner.purge_signal.notify_one();
    }

    /// Current limits
    pub fn limits(&self) -> MemoryCacheConfig {
        self.inner.limits.load().as_ref().clone()
    }

    /// Sum of stored value lengths
    pub fn size_bytes(&self) -> u64 {
        self.inner.size_bytes.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.map.read().is_empty()
    }

    /// Get a value and refresh its recency
    pub fn get_value(&self, key: &str) -> Option<Bytes> {
        match self.inner.get(key) {
            Some(value) => {
                self.inner.stats.increment_hits();
                Some(value)
            }
            None => {
                self.inner.stats.increment_misses();
                None
            }
        }
    }

    /// Insert or replace a value and signal maintenance
    pub fn set_value(&self, key: &str, value: Bytes) {
        let was_empty = self.inner.set(key, value);
        let running = self.ensure_workers();

        if self.inner.over_budget() {
            if running {
                self.inner.compact_signal.notify_one();
            } else {
                self.inner.compact();
            }
        }
        if was_empty {
            self.inner.purge_signal.notify_one();
        }
    }

    /// Remove a value immediately
    pub fn remove_value(&self, key: &str) -> bool {
        self.inner.remove(key)
    }

    /// Start both workers if needed; returns whether they are running
    fn ensure_workers(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let mut workers = self.workers.lock();
        if workers.is_some() {
            return true;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return false;
        };

        let (shutdown, rx) = watch::channel(false);
        let handles = vec![
            runtime.spawn(compaction_worker(self.inner.clone(), rx.clone())),
            runtime.spawn(purge_worker(self.inner.clone(), rx)),
        ];
        *workers = Some(Workers { shutdown, handles });
        tracing::debug!("Memory cache workers started");
        true
    }

    /// Stop both workers, waiting briefly for them to exit
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let Some(workers) = self.workers.lock().take() else {
            return;
        };
        workers.shutdown.send_replace(true);

        let grace = Duration::from_millis(WORKER_SHUTDOWN_GRACE_MS);
        for mut handle in workers.handles {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                tracing::warn!("Memory cache worker did not stop within grace period");
                handle.abort();
            }
        }
    }

    /// Run one synchronous compaction and purge pass
    pub fn run_maintenance(&self) {
        self.inner.compact();
        if let Some(max_age) = self.inner.limits.load().max_age() {
            self.inner.purge(max_age);
        }
    }

    /// Get cache statistics snapshot
    pub fn stats_snapshot(&self) -> CacheStats {
        self.inner.stats.snapshot(
            self.size_bytes(),
            self.len() as u64,
            self.inner.limits.load().max_size_bytes,
        )
    }
}

impl Drop for BoundedMemoryCache {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.get_mut().take() {
            workers.shutdown.send_replace(true);
        }
    }
}

#[async_trait]
impl CacheBackend for BoundedMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.get_value(key))
    }

    async fn set(&self, key: &str, value: Bytes, _ttl: Option<Duration>) -> Result<(), CacheError> {
        self.set_value(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.remove_value(key))
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn stats(&self) -> CacheStats {
        self.stats_snapshot()
    }

    async fn run_pending_tasks(&self) {
        self.run_maintenance();
    }

    async fn shutdown(&self) {
        BoundedMemoryCache::shutdown(self).await;
    }
}

/// NullCache is a no-op cache backend used when caching is disabled
pub struct NullCache;

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
