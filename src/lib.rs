// cdn-origin library
//
// Origin-serving core: path normalization, request resolution, layered
// caching and compression negotiation.

pub mod balancer;
pub mod cache;
pub mod cancel;
pub mod compression;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod mime;
pub mod origin;
pub mod path;
pub mod security;
