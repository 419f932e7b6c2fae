//! Proxy Module
//!
//! The outbound fetch capability and the read-through orchestrator built on it.

pub mod orchestrator;
pub mod upstream;

pub use orchestrator::{CacheProxy, CacheStatus, ProxyOutcome};
pub use upstream::{
    to_upstream_request, HttpUpstream, Upstream, UpstreamRequest, UpstreamResponse,
    HOP_BY_HOP_HEADERS, SERVICE_KEY_HEADER,
};
