// Metrics module - cache observability sidecar
//
// The cache tier writes to a `CacheMetrics` sink unconditionally. Production
// builds without metrics use `NoopMetrics`; `PrometheusMetrics` exports
// counters and histograms through the default Prometheus registry.

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounter, IntGauge,
};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Sink for cache tier measurements
///
/// Every method defaults to a no-op so sinks only implement what they record.
pub trait CacheMetrics: Send + Sync {
    /// A lookup returned a usable entry
    fn record_hit(&self) {}

    /// A lookup found nothing usable
    fn record_miss(&self) {}

    /// An entry of `bytes` encoded bytes was stored
    fn record_store(&self, _bytes: usize) {}

    /// A stale entry was removed because the origin changed
    fn record_invalidation(&self) {}

    /// Entries dropped by compaction or purge
    fn record_evictions(&self, _count: u64) {}

    /// A backend call failed and was treated as a miss
    fn record_backend_error(&self, _backend: &str) {}

    /// Duration of one backend operation (`get`, `set`, `remove`)
    fn observe_operation(&self, _operation: &str, _elapsed: Duration) {}

    /// Current size of a connection pool
    fn set_pool_size(&self, _size: usize) {}
}

/// Discards every measurement
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {}

/// Prometheus-backed cache metrics
///
/// Handles are reference-counted, so clones share the registered series.
#[derive(Clone)]
pub struct PrometheusMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub stores: IntCounter,
    pub invalidations: IntCounter,
    pub evictions: IntCounter,
    /// Backend failures by backend name
    backend_errors: prometheus::IntCounterVec,
    /// Operation duration histogram (in seconds)
    operation_duration: HistogramVec,
    /// Live connection count of the remote backend pool
    pub pool_size: IntGauge,
    /// Bytes written to the cache
    pub stored_bytes: IntCounter,
}

/// Global singleton instance of metrics
static METRICS: OnceLock<Option<PrometheusMetrics>> = OnceLock::new();

impl PrometheusMetrics {
    /// Register (once) and return the global metrics instance
    ///
    /// Returns None if registration with the default registry failed; the
    /// failure is logged once.
    pub fn global() -> Option<&'static Self> {
        METRICS
            .get_or_init(|| match Self::register() {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to register cache metrics");
                    None
                }
            })
            .as_ref()
    }

    fn register() -> Result<Self, prometheus::Error> {
        let cache_ops = register_int_counter_vec!(
            "cdn_origin_cache_operations_total",
            "Total number of cache operations by outcome",
            &["operation"] // hit, miss, store, invalidate, eviction
        )?;

        let backend_errors = register_int_counter_vec!(
            "cdn_origin_cache_backend_errors_total",
            "Backend failures absorbed as cache misses",
            &["backend"]
        )?;

        let stored_bytes = register_int_counter_vec!(
            "cdn_origin_cache_stored_bytes_total",
            "Encoded bytes written to the cache",
            &["tier"]
        )?;

        let operation_duration = register_histogram_vec!(
            "cdn_origin_cache_operation_duration_seconds",
            "Duration of cache backend operations in seconds",
            &["operation"], // get, set, remove
            vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0] // 0.1ms to 1s
        )?;

        let pool_size = register_int_gauge!(
            "cdn_origin_cache_pool_connections",
            "Current number of pooled backend connections"
        )?;

        Ok(PrometheusMetrics {
            hits: cache_ops.with_label_values(&["hit"]),
            misses: cache_ops.with_label_values(&["miss"]),
            stores: cache_ops.with_label_values(&["store"]),
            invalidations: cache_ops.with_label_values(&["invalidate"]),
            evictions: cache_ops.with_label_values(&["eviction"]),
            backend_errors,
            operation_duration,
            pool_size,
            stored_bytes: stored_bytes.with_label_values(&["all"]),
        })
    }
}

impl CacheMetrics for PrometheusMetrics {
    fn record_hit(&self) {
        self.hits.inc();
    }

    fn record_miss(&self) {
        self.misses.inc();
    }

    fn record_store(&self, bytes: usize) {
        self.stores.inc();
        self.stored_bytes.inc_by(bytes as u64);
    }

    fn record_invalidation(&self) {
        self.invalidations.inc();
    }

    fn record_evictions(&self, count: u64) {
        self.evictions.inc_by(count);
    }

    fn record_backend_error(&self, backend: &str) {
        self.backend_errors.with_label_values(&[backend]).inc();
    }

    fn observe_operation(&self, operation: &str, elapsed: Duration) {
        self.operation_duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    fn set_pool_size(&self, size: usize) {
        self.pool_size.set(size as i64);
    }
}

/// Metrics sink selected by configuration
pub fn cache_metrics(enabled: bool) -> Arc<dyn CacheMetrics> {
    if enabled {
        if let Some(metrics) = PrometheusMetrics::global() {
            return Arc::new(metrics.clone());
        }
    }
    Arc::new(NoopMetrics)
}
