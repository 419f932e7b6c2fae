//! Cache Proxy - A read-through caching proxy for an upstream HTTP API
//!
//! Stores successful GET/HEAD responses compressed and encrypted in SQLite
//! and serves them until their TTL lapses.

pub mod api;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;

pub use api::AppState;
pub use config::Config;
pub use error::{CacheError, Result};
pub use proxy::{CacheProxy, CacheStatus};
