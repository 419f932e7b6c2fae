//! Cache key derivation.
//!
//! SHA-256 over the canonical request string, hex encoded. Query strings are
//! hashed verbatim; parameter order is not normalised.

use axum::http::Method;
use sha2::{Digest, Sha256};

/// Derives the storage key for a canonical URL.
pub fn derive_key(canonical_url: &str) -> String {
    hex::encode(Sha256::digest(canonical_url.as_bytes()))
}

/// Builds the string hashed for a request. `GET` uses the bare URL; `HEAD`
/// is namespaced so its empty body is never served to a `GET`.
pub fn cache_identity(method: &Method, canonical_url: &str) -> String {
    if *method == Method::HEAD {
        format!("HEAD {canonical_url}")
    } else {
        canonical_url.to_string()
    }
}
