//! Response models for the proxy's own endpoints
//!
//! Proxied responses are passed through untouched; these DTOs only cover
//! `/_cache/*` routes and error bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{ErrorResponse, HealthResponse, StatsResponse};
