// Redis cache configuration module

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKEND_ATTEMPTS, DEFAULT_MAX_POOL_SIZE, DEFAULT_REDIS_KEY_PREFIX,
    DEFAULT_SCALE_DOWN_WINDOW_SECS, DEFAULT_SLOW_OPERATION_MS,
};

/// Redis-specific cache configuration
///
/// Besides the connection details this carries the tuning knobs of the
/// adaptive connection pool: a slow operation grows the pool, a quiet
/// window shrinks it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Optional password for Redis authentication
    #[serde(default)]
    pub redis_password: Option<String>,

    /// Redis database number (default: 0)
    #[serde(default)]
    pub redis_db: u32,

    /// Key prefix for cache records (default: "cdn-origin")
    #[serde(default = "default_redis_key_prefix")]
    pub redis_key_prefix: String,

    /// Connection timeout in milliseconds (default: 5000 = 5 seconds)
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Operation timeout in milliseconds (default: 2000 = 2 seconds)
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Connections opened up front (default: 1)
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: usize,

    /// Upper bound for adaptive growth (default: 16)
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,

    /// Attempts per operation before reporting failure (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Operations slower than this add a connection (default: 100ms)
    #[serde(default = "default_slow_operation_ms")]
    pub slow_operation_ms: u64,

    /// Quiet period before the pool target shrinks by one (default: 60s)
    #[serde(default = "default_scale_down_window_secs")]
    pub scale_down_window_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_password: None,
            redis_db: 0,
            redis_key_prefix: default_redis_key_prefix(),
            connection_timeout_ms: default_connection_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            min_pool_size: default_min_pool_size(),
            max_pool_size: default_max_pool_size(),
            max_attempts: default_max_attempts(),
            slow_operation_ms: default_slow_operation_ms(),
            scale_down_window_secs: default_scale_down_window_secs(),
        }
    }
}

fn default_redis_key_prefix() -> String {
    DEFAULT_REDIS_KEY_PREFIX.to_string()
}

fn default_connection_timeout_ms() -> u64 {
    5000 // 5 seconds
}

fn default_operation_timeout_ms() -> u64 {
    2000 // 2 seconds
}

fn default_min_pool_size() -> usize {
    1
}

fn default_max_pool_size() -> usize {
    DEFAULT_MAX_POOL_SIZE
}

fn default_max_attempts() -> u32 {
    DEFAULT_BACKEND_ATTEMPTS
}

fn default_slow_operation_ms() -> u64 {
    DEFAULT_SLOW_OPERATION_MS
}

fn default_scale_down_window_secs() -> u64 {
    DEFAULT_SCALE_DOWN_WINDOW_SECS
}

impl RedisConfig {
    /// Validate redis configuration
    pub fn validate(&self) -> Result<(), String> {
        let url = self
            .redis_url
            .as_deref()
            .ok_or_else(|| "redis_url is required when the redis backend is selected".to_string())?;
        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err("redis_url must start with redis:// or rediss:// (for TLS)".to_string());
        }
        if self.min_pool_size == 0 {
            return Err("min_pool_size must be at least 1".to_string());
        }
        if self.max_pool_size < self.min_pool_size {
            return Err(format!(
                "max_pool_size ({}) cannot be less than min_pool_size ({})",
                self.max_pool_size, self.min_pool_size
            ));
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Connection URL with password and database applied
    ///
    /// Credentials or a database path already present in `redis_url` win
    /// over the separate fields.
    pub fn connection_url(&self) -> Option<String> {
        let url = self.redis_url.as_deref()?;
        let (scheme, rest) = url.split_once("://")?;

        let rest = match (&self.redis_password, rest.contains('@')) {
            (Some(password), false) => {
                format!(":{}@{}", urlencoding::encode(password), rest)
            }
            _ => rest.to_string(),
        };

        let has_db_path = rest
            .split_once('/')
            .map(|(_, path)| !path.is_empty())
            .unwrap_or(false);
        let rest = if has_db_path || self.redis_db == 0 {
            rest
        } else {
            format!("{}/{}", rest.trim_end_matches('/'), self.redis_db)
        };

        Some(format!("{}://{}", scheme, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_create_redis_config_from_yaml() {
        let yaml = r#"
redis_url: "redis://localhost:6379"
redis_password: "secret"
redis_db: 1
redis_key_prefix: "test"
connection_timeout_ms: 3000
operation_timeout_ms: 1000
min_pool_size: 2
max_pool_size: 20
max_attempts: 5
slow_operation_ms: 50
scale_down_window_secs: 30
"#;

        let config: RedisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.redis_url, Some("redis://localhost:6379".to_string()));
        assert_eq!(config.redis_password, Some("secret".to_string()));
        assert_eq!(config.redis_db, 1);
        assert_eq!(config.redis_key_prefix, "test");
        assert_eq!(config.min_pool_size, 2);
        assert_eq!(config.max_pool_size, 20);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.slow_operation_ms, 50);
        assert_eq!(config.scale_down_window_secs, 30);
    }

    #[test]
    fn test_defaults() {
        let config = RedisConfig::default();
        assert_eq!(config.redis_key_prefix, "cdn-origin");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.min_pool_size, 1);
    }

    #[test]
    fn test_validate_rejects_bad_url_and_pool_bounds() {
        let mut config = RedisConfig {
            redis_url: Some("http://localhost".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.redis_url = Some("redis://localhost".to_string());
        assert!(config.validate().is_ok());

        config.max_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connection_url_applies_password_and_db() {
        let config = RedisConfig {
            redis_url: Some("redis://cache:6379".to_string()),
            redis_password: Some("p@ss".to_string()),
            redis_db: 2,
            ..Default::default()
        };
        assert_eq!(
            config.connection_url().unwrap(),
            "redis://:p%40ss@cache:6379/2"
        );
    }

    #[test]
    fn test_connection_url_keeps_explicit_parts() {
        let config = RedisConfig {
            redis_url: Some("redis://:inline@cache:6379/5".to_string()),
            redis_password: Some("ignored".to_string()),
            redis_db: 2,
            ..Default::default()
        };
        assert_eq!(
            config.connection_url().unwrap(),
            "redis://:inline@cache:6379/5"
        );
    }
}
