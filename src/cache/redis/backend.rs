// Redis cache backend
//
// Stores encoded cache records under prefixed keys. Connections come from a
// ConnectionBalancer sized by an AdaptiveScaler: slow commands grow the
// pool, quiet periods shrink it. Each operation is attempted up to
// `max_attempts` times; a connection that fails or times out is marked
// broken and replaced on the next pick.

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::config::RedisConfig;
use super::key::{format_key, validate_key};
use crate::balancer::{AdaptiveScaler, ConnectionBalancer, InstanceFactory, ScalingPolicy};
use crate::cache::error::CacheError;
use crate::cache::traits::CacheBackend;
use crate::metrics::CacheMetrics;

/// Pooled connection plus a broken flag shared by its clones
#[derive(Clone)]
pub struct RedisConnection {
    inner: MultiplexedConnection,
    broken: Arc<AtomicBool>,
}

impl RedisConnection {
    fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }
}

struct RedisConnectionFactory {
    client: Client,
    connect_timeout: Duration,
}

#[async_trait]
impl InstanceFactory<RedisConnection> for RedisConnectionFactory {
    async fn create(&self) -> Result<RedisConnection, CacheError> {
        let connect = self.client.get_multiplexed_async_connection();
        let inner = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                CacheError::RedisConnectionFailed(format!(
                    "connection timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| CacheError::RedisConnectionFailed(e.to_string()))?;

        tracing::debug!("Opened Redis connection");
        Ok(RedisConnection {
            inner,
            broken: Arc::new(AtomicBool::new(false)),
        })
    }

    fn is_healthy(&self, connection: &RedisConnection) -> bool {
        !connection.broken.load(Ordering::Acquire)
    }

    async fn dispose(&self, _connection: RedisConnection) {
        // Multiplexed connections close when the last clone drops.
        tracing::debug!("Disposed Redis connection");
    }
}

/// Redis-backed [`CacheBackend`]
pub struct RedisBackend {
    scaler: Arc<AdaptiveScaler<RedisConnection>>,
    key_prefix: String,
    operation_timeout: Duration,
    max_attempts: u32,
    metrics: Arc<dyn CacheMetrics>,
}

impl RedisBackend {
    /// Create a backend from configuration
    ///
    /// Connections are opened lazily on the first operation, so an
    /// unreachable server is not an error here.
    ///
    /// # Errors
    ///
    /// Returns CacheError::ConfigurationError if the configuration is
    /// invalid or the URL cannot be parsed
    pub fn new(config: RedisConfig, metrics: Arc<dyn CacheMetrics>) -> Result<Self, CacheError> {
        config.validate().map_err(CacheError::ConfigurationError)?;

        let url = config.connection_url().ok_or_else(|| {
            CacheError::ConfigurationError("redis_url is required".to_string())
        })?;
        let client = Client::open(url.as_str())
            .map_err(|e| CacheError::ConfigurationError(format!("Invalid Redis URL: {}", e)))?;

        let factory = Arc::new(RedisConnectionFactory {
            client,
            connect_timeout: Duration::from_millis(config.connection_timeout_ms),
        });
        let balancer = Arc::new(ConnectionBalancer::new(factory));
        let scaler = AdaptiveScaler::new(
            balancer,
            ScalingPolicy {
                slow_threshold: Duration::from_millis(config.slow_operation_ms),
                quiet_window: Duration::from_secs(config.scale_down_window_secs),
                min_size: config.min_pool_size,
                max_size: config.max_pool_size,
            },
        )
        .with_metrics(metrics.clone());

        Ok(Self {
            scaler: Arc::new(scaler),
            key_prefix: config.redis_key_prefix,
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
            max_attempts: config.max_attempts.max(1),
            metrics,
        })
    }

    /// Open the configured minimum number of connections
    pub async fn warm_up(&self) -> Result<(), CacheError> {
        self.scaler.warm_up().await
    }

    /// Current number of pooled connections
    pub fn pool_size(&self) -> usize {
        self.scaler.balancer().len()
    }

    fn redis_key(&self, key: &str) -> Result<String, CacheError> {
        validate_key(key).map_err(CacheError::ConfigurationError)?;
        Ok(format_key(&self.key_prefix, key))
    }

    /// Run `cmd` with retries on fresh connections
    async fn execute<T>(&self, operation: &str, cmd: redis::Cmd) -> Result<T, CacheError>
    where
        T: redis::FromRedisValue,
    {
        let mut last_error = CacheError::RedisError(format!("{} not attempted", operation));

        for attempt in 1..=self.max_attempts {
            let connection = match self.scaler.balancer().next().await {
                Ok(connection) => connection,
                Err(e) => {
                    tracing::debug!(operation = operation, attempt = attempt, error = %e, "No Redis connection");
                    last_error = e;
                    continue;
                }
            };

            let mut conn = connection.inner.clone();
            let started = Instant::now();
            let result =
                tokio::time::timeout(self.operation_timeout, cmd.query_async::<T>(&mut conn)).await;
            let elapsed = started.elapsed();
            self.metrics.observe_operation(operation, elapsed);
            self.scaler.observe(elapsed);

            match result {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    connection.mark_broken();
                    tracing::debug!(operation = operation, attempt = attempt, error = %e, "Redis command failed");
                    last_error = CacheError::from(e);
                }
                Err(_) => {
                    connection.mark_broken();
                    tracing::debug!(
                        operation = operation,
                        attempt = attempt,
                        timeout_ms = self.operation_timeout.as_millis() as u64,
                        "Redis command timed out"
                    );
                    last_error = CacheError::RedisError(format!(
                        "{} timed out after {}ms",
                        operation,
                        self.operation_timeout.as_millis()
                    ));
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let key = self.redis_key(key)?;
        let mut cmd = redis::cmd("GET");
        cmd.arg(&key);
        let value: Option<Vec<u8>> = self.execute("get", cmd).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError> {
        let key = self.redis_key(key)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(value.as_ref());
        if let Some(ttl) = ttl {
            // Redis rejects EX 0.
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        self.execute::<()>("set", cmd).await
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let key = self.redis_key(key)?;
        let mut cmd = redis::cmd("DEL");
        cmd.arg(&key);
        let removed: i64 = self.execute("remove", cmd).await?;
        Ok(removed > 0)
    }

    fn name(&self) -> &'static str {
        "redis"
    }

    async fn shutdown(&self) {
        self.scaler.balancer().clear().await;
    }
}
