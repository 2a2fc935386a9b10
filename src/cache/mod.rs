// Cache module
//
// Entries are encoded to a compact binary record (codec) and stored in a
// pluggable byte backend: the bounded in-process memory cache, Redis, or
// nothing at all. CacheManager is the typed facade the resolver talks to.

pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod manager;
pub mod memory;
pub mod redis;
pub mod stats;
pub mod traits;

pub use codec::{deserialize_entry, encoded_len, serialize_entry, RECORD_OVERHEAD};
pub use config::{CacheBackendKind, CacheConfig, MemoryCacheConfig};
pub use entry::{from_ticks, to_ticks, CacheKey, CachedEntry};
pub use error::CacheError;
pub use manager::{build_backend, CacheManager};
pub use memory::{BoundedMemoryCache, NullCache};
pub use redis::{RedisBackend, RedisConfig};
pub use stats::{CacheStats, CacheStatsTracker};
pub use traits::CacheBackend;
