//! Eligibility Policy
//!
//! Pure decisions about whether a request may touch the cache at all and
//! whether an upstream response may be written to it.

use std::fmt;

use axum::http::{header::CACHE_CONTROL, Method};
use reqwest::Url;

use crate::proxy::UpstreamResponse;

/// Path segment marking the query-string data API.
pub const REST_SEGMENT: &str = "/rest/";

/// Query string opening that marks a REST call as a read.
pub const SELECT_MARKER: &str = "?select=";

// == Decision ==
/// Why a response was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Status outside 200..=299
    Status(u16),
    /// Response carried `Cache-Control: no-store`
    NoStore,
    /// Method other than GET or HEAD
    Method(Method),
    /// REST call whose query does not open with `select=`
    MissingSelect,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Status(code) => write!(f, "status {code} is not 2xx"),
            RejectReason::NoStore => f.write_str("cache-control: no-store"),
            RejectReason::Method(method) => write!(f, "method {method} is not cacheable"),
            RejectReason::MissingSelect => f.write_str("rest call without select parameter"),
        }
    }
}

/// Outcome of the post-fetch check: cacheable, or refused for exactly one reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityDecision {
    Cacheable,
    Rejected(RejectReason),
}

impl EligibilityDecision {
    pub fn is_cacheable(&self) -> bool {
        matches!(self, EligibilityDecision::Cacheable)
    }
}

// == Policy ==
#[derive(Debug, Clone)]
pub struct EligibilityPolicy {
    bypass_paths: Vec<String>,
}

impl EligibilityPolicy {
    /// Empty entries are dropped; an empty pattern would match every path.
    pub fn new(bypass_paths: impl IntoIterator<Item = String>) -> Self {
        Self {
            bypass_paths: bypass_paths
                .into_iter()
                .filter(|path| !path.is_empty())
                .collect(),
        }
    }

    // == Bypass ==
    /// True when the path contains any configured bypass pattern. Such
    /// requests are proxied with no cache read or write.
    pub fn is_bypass_route(&self, url: &Url) -> bool {
        let path = url.path();
        self.bypass_paths
            .iter()
            .any(|pattern| path.contains(pattern.as_str()))
    }

    /// Only GET and HEAD are ever read from or written to the cache.
    pub fn is_cacheable_method(method: &Method) -> bool {
        *method == Method::GET || *method == Method::HEAD
    }

    // == Response Check ==
    /// Applies every condition; the first failing one is reported.
    pub fn evaluate_response(
        &self,
        method: &Method,
        url: &Url,
        response: &UpstreamResponse,
    ) -> EligibilityDecision {
        let status = response.status.as_u16();
        if !(200..=299).contains(&status) || !response.is_ok() {
            return EligibilityDecision::Rejected(RejectReason::Status(status));
        }

        let no_store = response
            .headers
            .get_all(CACHE_CONTROL)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.to_ascii_lowercase().contains("no-store"));
        if no_store {
            return EligibilityDecision::Rejected(RejectReason::NoStore);
        }

        if !Self::is_cacheable_method(method) {
            return EligibilityDecision::Rejected(RejectReason::Method(method.clone()));
        }

        // Coarse read check on the URL text; query semantics are not parsed.
        let target = url.as_str();
        if target.contains(REST_SEGMENT) && !target.contains(SELECT_MARKER) {
            return EligibilityDecision::Rejected(RejectReason::MissingSelect);
        }

        EligibilityDecision::Cacheable
    }

    pub fn is_cacheable_response(
        &self,
        method: &Method,
        url: &Url,
        response: &UpstreamResponse,
    ) -> bool {
        self.evaluate_response(method, url, response).is_cacheable()
    }
}
