//! API Module
//!
//! HTTP handlers and routing for the caching proxy.
//!
//! # Endpoints
//! - `GET /_cache/health` - Health check endpoint
//! - `GET /_cache/stats` - Cache statistics
//! - everything else - Proxied to the upstream API through the cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
