//! Cache Module
//!
//! Entry pipeline for the proxy: eligibility, key derivation, TTL resolution,
//! persistence backends, and the encoding store adapter.

pub mod backend;
pub mod entry;
pub mod key;
pub mod policy;
pub mod sqlite;
mod stats;
mod store;
pub mod ttl;

// Re-export public types
pub use backend::{CacheBackend, MemoryBackend};
pub use entry::CacheEntry;
pub use key::{cache_identity, derive_key};
pub use policy::{EligibilityDecision, EligibilityPolicy, RejectReason};
pub use sqlite::SqliteBackend;
pub use stats::{CacheMetrics, CacheStats};
pub use store::CacheStore;
pub use ttl::{resolve_ttl, DEFAULT_TTL_SECS};
