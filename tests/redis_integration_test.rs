// Integration tests for the Redis cache backend
//
// These tests require a real Redis instance via testcontainers (Docker).
// Run with: cargo test --test redis_integration_test -- --ignored

use bytes::Bytes;
use cdn_origin::cache::{
    CacheBackend, CacheKey, CacheManager, CachedEntry, RedisBackend, RedisConfig,
};
use cdn_origin::cancel::Cancellation;
use cdn_origin::metrics::NoopMetrics;
use cdn_origin::mime::MimeType;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{clients::Cli, RunnableImage};
use testcontainers_modules::redis::Redis;

fn config(port: u16) -> RedisConfig {
    RedisConfig {
        redis_url: Some(format!("redis://127.0.0.1:{}", port)),
        redis_key_prefix: "it".to_string(),
        min_pool_size: 2,
        max_pool_size: 4,
        ..RedisConfig::default()
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_set_get_remove_round_trip() {
    let docker = Cli::default();
    let container = docker.run(RunnableImage::from(Redis::default()));
    let port = container.get_host_port_ipv4(6379);

    let backend = RedisBackend::new(config(port), Arc::new(NoopMetrics)).unwrap();
    backend.warm_up().await.unwrap();
    assert_eq!(backend.pool_size(), 2);

    assert!(backend.get("/a").await.unwrap().is_none());
    backend
        .set("/a", Bytes::from_static(b"record"), Some(Duration::from_secs(60)))
        .await
        .unwrap();
    assert_eq!(
        backend.get("/a").await.unwrap(),
        Some(Bytes::from_static(b"record"))
    );
    assert!(backend.remove("/a").await.unwrap());
    assert!(!backend.remove("/a").await.unwrap());
    backend.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_manager_over_redis() {
    let docker = Cli::default();
    let container = docker.run(RunnableImage::from(Redis::default()));
    let port = container.get_host_port_ipv4(6379);

    let backend = Arc::new(RedisBackend::new(config(port), Arc::new(NoopMetrics)).unwrap());
    let manager = CacheManager::new(backend, Arc::new(NoopMetrics), Some(Duration::from_secs(60)));
    let key = CacheKey::from_normalized("docs/index.html");
    let entry = CachedEntry::new(Bytes::from_static(b"<html>"), MimeType::Html, Utc::now());
    let cancel = Cancellation::never();

    assert!(manager.set_entry(&key, &entry, &cancel).await);
    assert_eq!(manager.get_entry(&key, &cancel).await, Some(entry));
    assert!(manager.invalidate(&key, &cancel).await);
    assert!(manager.get_entry(&key, &cancel).await.is_none());
    manager.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_long_keys_are_hashed_but_usable() {
    let docker = Cli::default();
    let container = docker.run(RunnableImage::from(Redis::default()));
    let port = container.get_host_port_ipv4(6379);

    let backend = RedisBackend::new(config(port), Arc::new(NoopMetrics)).unwrap();
    let key = format!("/{}", "deep/".repeat(100));
    backend
        .set(&key, Bytes::from_static(b"x"), None)
        .await
        .unwrap();
    assert_eq!(
        backend.get(&key).await.unwrap(),
        Some(Bytes::from_static(b"x"))
    );
    backend.shutdown().await;
}
