// Redis cache backend module
//
// Distributed cache tier: encoded records under prefixed keys, served over
// an adaptively sized pool of multiplexed connections.

pub mod backend;
pub mod config;
pub mod key;

pub use backend::RedisBackend;
pub use config::RedisConfig;
