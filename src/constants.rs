// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Origin defaults
// =============================================================================

/// Default data root served by the origin
pub const DEFAULT_DATA_ROOT: &str = "/var/lib/cdn-origin/data";

/// Files larger than this are streamed instead of buffered (8 MB)
pub const DEFAULT_MAX_BUFFERED_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Reserved first path segment for built-in assets
pub const DEFAULT_SYSTEM_PREFIX: &str = "_cdn";

/// Directory index file looked up before generating a listing
pub const DEFAULT_INDEX_FILE: &str = "index.html";

/// Maximum request path length accepted by the resolver (8 KB)
pub const DEFAULT_MAX_PATH_LENGTH: usize = 8192;

/// Longest request path written to logs before truncation
pub const MAX_LOGGED_PATH_LEN: usize = 256;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default memory cache budget in bytes (256 MB)
pub const DEFAULT_MAX_CACHE_SIZE_BYTES: u64 = 256 * 1024 * 1024;

/// Default sliding expiry for memory cache entries in seconds (1 hour)
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 3600;

/// Default TTL hint passed to backends that expire entries themselves
pub const DEFAULT_ENTRY_TTL_SECONDS: u64 = 3600;

/// Grace period granted to background workers on shutdown
pub const WORKER_SHUTDOWN_GRACE_MS: u64 = 500;

// =============================================================================
// Redis defaults
// =============================================================================

/// Default key prefix for records stored in Redis
pub const DEFAULT_REDIS_KEY_PREFIX: &str = "cdn-origin";

/// Attempts per Redis operation before it is reported as failed
pub const DEFAULT_BACKEND_ATTEMPTS: u32 = 3;

/// Operations slower than this grow the connection pool (ms)
pub const DEFAULT_SLOW_OPERATION_MS: u64 = 100;

/// Quiet period after which the pool target shrinks by one (seconds)
pub const DEFAULT_SCALE_DOWN_WINDOW_SECS: u64 = 60;

/// Upper bound for the Redis connection pool
pub const DEFAULT_MAX_POOL_SIZE: usize = 16;

// =============================================================================
// Compression defaults
// =============================================================================

/// Default compression level (1-11, meaning varies by algorithm)
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Inputs smaller than this are never compressed
pub const MIN_COMPRESSIBLE_SIZE: usize = 1024;

/// Buffer size used by streaming encoders/decoders
pub const STREAM_BUFFER_SIZE: usize = 4096;

// =============================================================================
// Logging defaults
// =============================================================================

/// Default log level when RUST_LOG is not set
pub const DEFAULT_LOG_LEVEL: &str = "info";
