// Connection Balancer module for network-attached cache backends
//
// Manages a pool of interchangeable instances (e.g. Redis connections):
// - `next()` hands out instances round-robin, dropping unhealthy ones
// - `add_instance()` / `remove_one_instance()` grow and shrink the pool
// - Removal is soft: the last removed instance is parked and reused by
//   the next `add_instance()`, and only disposed when replaced
//
// `AdaptiveScaler` sits on top and sizes the pool from observed latency:
// - A slow operation adds an instance (up to the configured maximum) on a
//   background task, so the caller that observed it is not delayed
// - A quiet window with no slow operation lowers the target by one
//   (floor: the configured minimum) and shrinks the pool toward it

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::CacheError;
use crate::metrics::{CacheMetrics, NoopMetrics};

/// Creates, checks and disposes pool instances
#[async_trait]
pub trait InstanceFactory<T: Send + 'static>: Send + Sync {
    /// Open a new instance
    async fn create(&self) -> Result<T, CacheError>;

    /// Whether `instance` may still be handed out
    fn is_healthy(&self, _instance: &T) -> bool {
        true
    }

    /// Release an instance that left the pool for good
    async fn dispose(&self, _instance: T) {}
}

struct Pool<T> {
    instances: Vec<T>,
    cursor: usize,
    /// Most recently removed instance, kept for one generation
    retired: Option<T>,
}

impl<T> Pool<T> {
    /// Round-robin pick, pulling unhealthy instances out as they are met
    fn pick<F>(&mut self, healthy: F, unhealthy: &mut Vec<T>) -> Option<usize>
    where
        F: Fn(&T) -> bool,
    {
        while !self.instances.is_empty() {
            let index = self.cursor % self.instances.len();
            if healthy(&self.instances[index]) {
                self.cursor = index + 1;
                return Some(index);
            }
            unhealthy.push(self.instances.remove(index));
        }
        None
    }
}

/// Round-robin pool of backend instances
pub struct ConnectionBalancer<T: Send + 'static> {
    factory: Arc<dyn InstanceFactory<T>>,
    pool: Mutex<Pool<T>>,
    /// Serializes structural changes (create/add/remove)
    structure: tokio::sync::Mutex<()>,
}

impl<T> ConnectionBalancer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty balancer; instances are opened on demand
    pub fn new(factory: Arc<dyn InstanceFactory<T>>) -> Self {
        Self {
            factory,
            pool: Mutex::new(Pool {
                instances: Vec::new(),
                cursor: 0,
                retired: None,
            }),
            structure: tokio::sync::Mutex::new(()),
        }
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.pool.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.lock().instances.is_empty()
    }

    /// Next healthy instance in round-robin order
    ///
    /// Unhealthy instances met on the way are removed and disposed. When no
    /// healthy instance remains a new one is created.
    ///
    /// # Errors
    /// Returns the factory's error if a replacement could not be created
    pub async fn next(&self) -> Result<T, CacheError> {
        loop {
            let mut unhealthy = Vec::new();
            let picked = {
                let mut pool = self.pool.lock();
                let factory = &self.factory;
                pool.pick(|instance| factory.is_healthy(instance), &mut unhealthy)
                    .map(|index| pool.instances[index].clone())
            };
            self.dispose_all(unhealthy).await;
            if let Some(instance) = picked {
                return Ok(instance);
            }

            let _guard = self.structure.lock().await;
            if !self.is_empty() {
                // Another caller refilled the pool while we waited.
                continue;
            }
            let instance = self.factory.create().await?;
            self.pool.lock().instances.push(instance.clone());
            tracing::debug!("Connection balancer created instance for empty pool");
            return Ok(instance);
        }
    }

    /// Grow the pool by one, reusing the parked instance when possible
    ///
    /// Returns the new pool size.
    pub async fn add_instance(&self) -> Result<usize, CacheError> {
        let _guard = self.structure.lock().await;

        let parked = self.pool.lock().retired.take();
        let instance = match parked {
            Some(instance) if self.factory.is_healthy(&instance) => instance,
            Some(instance) => {
                self.factory.dispose(instance).await;
                self.factory.create().await?
            }
            None => self.factory.create().await?,
        };

        let mut pool = self.pool.lock();
        pool.instances.push(instance);
        Ok(pool.instances.len())
    }

    /// Shrink the pool by one, never below a single instance
    ///
    /// The removed instance is parked; the previously parked one is
    /// disposed. Returns the new pool size.
    pub async fn remove_one_instance(&self) -> usize {
        let _guard = self.structure.lock().await;

        let (evicted, len) = {
            let mut pool = self.pool.lock();
            if pool.instances.len() <= 1 {
                return pool.instances.len();
            }
            let removed = pool.instances.pop();
            let evicted = std::mem::replace(&mut pool.retired, removed);
            (evicted, pool.instances.len())
        };

        if let Some(instance) = evicted {
            self.factory.dispose(instance).await;
        }
        len
    }

    /// Dispose every instance, parked one included
    pub async fn clear(&self) {
        let _guard = self.structure.lock().await;
        let drained: Vec<T> = {
            let mut pool = self.pool.lock();
            let mut drained: Vec<T> = pool.instances.drain(..).collect();
            drained.extend(pool.retired.take());
            pool.cursor = 0;
            drained
        };
        self.dispose_all(drained).await;
    }

    async fn dispose_all(&self, instances: Vec<T>) {
        for instance in instances {
            self.factory.dispose(instance).await;
        }
    }
}

/// Pool sizing policy for [`AdaptiveScaler`]
#[derive(Debug, Clone)]
pub struct ScalingPolicy {
    /// Operations at least this slow grow the pool
    pub slow_threshold: Duration,
    /// Quiet period before the target shrinks by one
    pub quiet_window: Duration,
    pub min_size: usize,
    pub max_size: usize,
}

/// Latency-driven sizing for a [`ConnectionBalancer`]
pub struct AdaptiveScaler<T: Send + 'static> {
    balancer: Arc<ConnectionBalancer<T>>,
    policy: ScalingPolicy,
    target: AtomicUsize,
    /// Last slow operation or shrink step
    quiet_since: Mutex<Instant>,
    /// Held by the single in-flight grow step
    growing: Arc<tokio::sync::Mutex<()>>,
    /// Held by the single in-flight shrink evaluation
    shrinking: Arc<tokio::sync::Mutex<()>>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<T> AdaptiveScaler<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(balancer: Arc<ConnectionBalancer<T>>, mut policy: ScalingPolicy) -> Self {
        policy.min_size = policy.min_size.max(1);
        policy.max_size = policy.max_size.max(policy.min_size);
        Self {
            balancer,
            target: AtomicUsize::new(policy.min_size),
            policy,
            quiet_since: Mutex::new(Instant::now()),
            growing: Arc::new(tokio::sync::Mutex::new(())),
            shrinking: Arc::new(tokio::sync::Mutex::new(())),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn balancer(&self) -> &Arc<ConnectionBalancer<T>> {
        &self.balancer
    }

    /// Current target pool size
    pub fn target(&self) -> usize {
        self.target.load(Ordering::Acquire)
    }

    /// Open the minimum number of instances
    pub async fn warm_up(&self) -> Result<(), CacheError> {
        while self.balancer.len() < self.policy.min_size {
            self.balancer.add_instance().await?;
        }
        self.metrics.set_pool_size(self.balancer.len());
        Ok(())
    }

    /// Feed one operation's latency into the policy
    ///
    /// Failed and timed-out operations count too. Never waits for the
    /// pool to change.
    pub fn observe(self: &Arc<Self>, elapsed: Duration) {
        if elapsed >= self.policy.slow_threshold {
            self.maybe_grow(elapsed);
        } else {
            self.maybe_shrink();
        }
    }

    /// Spawn a grow step unless the pool is full or one is in flight
    fn maybe_grow(self: &Arc<Self>, elapsed: Duration) {
        *self.quiet_since.lock() = Instant::now();

        if self.balancer.len() >= self.policy.max_size {
            return;
        }
        let Ok(guard) = self.growing.clone().try_lock_owned() else {
            return;
        };

        let scaler = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            scaler.grow(elapsed).await;
        });
    }

    /// Add one instance if the pool is below its maximum
    pub async fn grow(&self, elapsed: Duration) {
        if self.balancer.len() >= self.policy.max_size {
            return;
        }
        match self.balancer.add_instance().await {
            Ok(size) => {
                self.target.store(size, Ordering::Release);
                self.metrics.set_pool_size(size);
                tracing::info!(
                    pool_size = size,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Slow backend operation, connection pool grown"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to grow connection pool");
            }
        }
    }

    /// Spawn a shrink evaluation if the quiet window has passed
    ///
    /// Skipped when another evaluation is still running.
    fn maybe_shrink(self: &Arc<Self>) {
        if self.quiet_since.lock().elapsed() < self.policy.quiet_window {
            return;
        }
        if self.balancer.len() <= self.policy.min_size && self.target() <= self.policy.min_size {
            return;
        }
        let Ok(guard) = self.shrinking.clone().try_lock_owned() else {
            return;
        };

        let scaler = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            scaler.shrink().await;
        });
    }

    /// Lower the target by one and converge the pool toward it
    pub async fn shrink(&self) {
        {
            let mut quiet_since = self.quiet_since.lock();
            if quiet_since.elapsed() < self.policy.quiet_window {
                return;
            }
            *quiet_since = Instant::now();
        }

        let target = self
            .target()
            .min(self.balancer.len())
            .saturating_sub(1)
            .max(self.policy.min_size);
        self.target.store(target, Ordering::Release);

        let mut size = self.balancer.len();
        while size > target {
            let after = self.balancer.remove_one_instance().await;
            if after == size {
                break;
            }
            size = after;
        }
        self.metrics.set_pool_size(size);
        tracing::debug!(pool_size = size, target = target, "Connection pool shrunk");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct FakeFactory {
        next_id: AtomicU32,
        broken: Mutex<HashSet<u32>>,
        disposed: Mutex<Vec<u32>>,
        fail_create: std::sync::atomic::AtomicBool,
        create_delay: Mutex<Duration>,
    }

    #[async_trait]
    impl InstanceFactory<u32> for FakeFactory {
        async fn create(&self) -> Result<u32, CacheError> {
            if self.fail_create.load(Ordering::Relaxed) {
                return Err(CacheError::RedisConnectionFailed("refused".to_string()));
            }
            let delay = *self.create_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
        }

        fn is_healthy(&self, instance: &u32) -> bool {
            !self.broken.lock().contains(instance)
        }

        async fn dispose(&self, instance: u32) {
            self.disposed.lock().push(instance);
        }
    }

    fn balancer() -> (Arc<FakeFactory>, Arc<ConnectionBalancer<u32>>) {
        let factory = Arc::new(FakeFactory::default());
        let balancer = Arc::new(ConnectionBalancer::new(factory.clone()));
        (factory, balancer)
    }

    #[tokio::test]
    async fn test_next_creates_on_empty_pool() {
        let (_, balancer) = balancer();
        assert!(balancer.is_empty());
        assert_eq!(balancer.next().await.unwrap(), 1);
        assert_eq!(balancer.len(), 1);
        assert_eq!(balancer.next().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_next_is_round_robin() {
        let (_, balancer) = balancer();
        for _ in 0..3 {
            balancer.add_instance().await.unwrap();
        }
        let picks: Vec<u32> = {
            let mut picks = Vec::new();
            for _ in 0..6 {
                picks.push(balancer.next().await.unwrap());
            }
            picks
        };
        assert_eq!(picks, vec![1, 2, 3, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unhealthy_instances_are_skipped_and_disposed() {
        let (factory, balancer) = balancer();
        for _ in 0..3 {
            balancer.add_instance().await.unwrap();
        }
        factory.broken.lock().insert(2);

        assert_eq!(balancer.next().await.unwrap(), 1);
        assert_eq!(balancer.next().await.unwrap(), 3);
        assert_eq!(balancer.len(), 2);
        assert_eq!(*factory.disposed.lock(), vec![2]);
    }

    #[tokio::test]
    async fn test_all_unhealthy_creates_replacement() {
        let (factory, balancer) = balancer();
        balancer.add_instance().await.unwrap();
        balancer.add_instance().await.unwrap();
        factory.broken.lock().extend([1, 2]);

        assert_eq!(balancer.next().await.unwrap(), 3);
        assert_eq!(balancer.len(), 1);
        assert_eq!(factory.disposed.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_create_failure_surfaces() {
        let (factory, balancer) = balancer();
        factory.fail_create.store(true, Ordering::Relaxed);
        assert!(matches!(
            balancer.next().await,
            Err(CacheError::RedisConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_removal_is_soft() {
        let (factory, balancer) = balancer();
        for _ in 0..3 {
            balancer.add_instance().await.unwrap();
        }

        assert_eq!(balancer.remove_one_instance().await, 2);
        assert!(factory.disposed.lock().is_empty());

        // The parked instance comes back instead of a new one.
        assert_eq!(balancer.add_instance().await.unwrap(), 3);
        assert_eq!(factory.next_id.load(Ordering::Relaxed), 3);

        balancer.remove_one_instance().await;
        balancer.remove_one_instance().await;
        assert_eq!(*factory.disposed.lock(), vec![3]);
        assert_eq!(balancer.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_keeps_last_instance() {
        let (_, balancer) = balancer();
        balancer.add_instance().await.unwrap();
        assert_eq!(balancer.remove_one_instance().await, 1);
        assert_eq!(balancer.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_disposes_everything() {
        let (factory, balancer) = balancer();
        for _ in 0..3 {
            balancer.add_instance().await.unwrap();
        }
        balancer.remove_one_instance().await;
        balancer.clear().await;
        assert!(balancer.is_empty());
        let mut disposed = factory.disposed.lock().clone();
        disposed.sort_unstable();
        assert_eq!(disposed, vec![1, 2, 3]);
    }

    /// Let spawned pool changes run
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn scaler(balancer: Arc<ConnectionBalancer<u32>>) -> Arc<AdaptiveScaler<u32>> {
        Arc::new(AdaptiveScaler::new(
            balancer,
            ScalingPolicy {
                slow_threshold: Duration::from_millis(100),
                quiet_window: Duration::from_secs(60),
                min_size: 1,
                max_size: 3,
            },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operations_grow_pool_up_to_max() {
        let (_, balancer) = balancer();
        let scaler = scaler(balancer.clone());
        scaler.warm_up().await.unwrap();
        assert_eq!(balancer.len(), 1);

        for _ in 0..5 {
            scaler.observe(Duration::from_millis(250));
            settle().await;
        }
        assert_eq!(balancer.len(), 3);
        assert_eq!(scaler.target(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_window_shrinks_one_step_at_a_time() {
        let (_, balancer) = balancer();
        let scaler = scaler(balancer.clone());
        scaler.warm_up().await.unwrap();
        scaler.observe(Duration::from_millis(250));
        settle().await;
        scaler.observe(Duration::from_millis(250));
        settle().await;
        assert_eq!(balancer.len(), 3);

        // Fast operations inside the window change nothing.
        tokio::time::sleep(Duration::from_secs(30)).await;
        scaler.observe(Duration::from_millis(1));
        tokio::task::yield_now().await;
        assert_eq!(balancer.len(), 3);

        tokio::time::sleep(Duration::from_secs(31)).await;
        scaler.observe(Duration::from_millis(1));
        settle().await;
        assert_eq!(balancer.len(), 2);
        assert_eq!(scaler.target(), 2);

        // The next step needs another full quiet window.
        scaler.observe(Duration::from_millis(1));
        settle().await;
        assert_eq!(balancer.len(), 2);

        tokio::time::sleep(Duration::from_secs(61)).await;
        scaler.observe(Duration::from_millis(1));
        settle().await;
        assert_eq!(balancer.len(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        scaler.observe(Duration::from_millis(1));
        settle().await;
        assert_eq!(balancer.len(), 1);
        assert_eq!(scaler.target(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_resets_quiet_window() {
        let (_, balancer) = balancer();
        let scaler = scaler(balancer.clone());
        scaler.warm_up().await.unwrap();
        scaler.observe(Duration::from_millis(250));
        settle().await;

        tokio::time::sleep(Duration::from_secs(50)).await;
        scaler.observe(Duration::from_millis(500));
        settle().await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        scaler.observe(Duration::from_millis(1));
        settle().await;
        assert_eq!(balancer.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_operation_grows_pool_in_background() {
        let (factory, balancer) = balancer();
        let scaler = scaler(balancer.clone());
        scaler.warm_up().await.unwrap();
        *factory.create_delay.lock() = Duration::from_secs(5);

        let started = Instant::now();
        let hung = tokio::time::timeout(Duration::from_secs(2), std::future::pending::<()>()).await;
        assert!(hung.is_err());
        scaler.observe(started.elapsed());

        // The caller is not held up by the slow connect.
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(balancer.len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(balancer.len(), 2);
        assert_eq!(scaler.target(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operations_during_growth_coalesce() {
        let (factory, balancer) = balancer();
        let scaler = scaler(balancer.clone());
        scaler.warm_up().await.unwrap();
        *factory.create_delay.lock() = Duration::from_secs(1);

        for _ in 0..3 {
            scaler.observe(Duration::from_millis(250));
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(balancer.len(), 2);
    }
}
