//! Cache Orchestrator
//!
//! Per-request control flow:
//!
//! 1. Service key check. Failure ends the request before any I/O.
//! 2. Bypass routes and non-GET/HEAD methods go straight upstream.
//! 3. Lookup. A hit is answered from the cache.
//! 4. Miss: fetch upstream, run the response check, write through if eligible,
//!    and return the upstream response either way.
//!
//! Cache read/write failures never fail the request. Concurrent misses on the
//! same key may both fetch and both write; the last write wins.

use std::sync::Arc;

use axum::http::{HeaderMap, Request};
use bytes::Bytes;
use reqwest::Url;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::cache::{
    cache_identity, derive_key, resolve_ttl, CacheMetrics, CacheStats, CacheStore,
    EligibilityDecision, EligibilityPolicy,
};
use crate::error::{CacheError, Result};
use crate::proxy::upstream::{
    to_upstream_request, Upstream, UpstreamResponse, SERVICE_KEY_HEADER,
};

// == Outcome ==
/// How a request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache
    Hit,
    /// Fetched upstream and written to the cache
    Miss,
    /// Fetched upstream; the response was not cacheable or the write failed
    Uncached,
    /// Bypass route or uncacheable method; the cache was not consulted
    Bypass,
}

impl CacheStatus {
    /// Label used in the `X-Cache` response header.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Uncached => "UNCACHED",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyOutcome {
    pub response: UpstreamResponse,
    pub status: CacheStatus,
}

// == Cache Proxy ==
pub struct CacheProxy {
    policy: EligibilityPolicy,
    store: CacheStore,
    upstream: Arc<dyn Upstream>,
    upstream_url: Url,
    service_key: String,
    default_ttl: u64,
    metrics: Arc<CacheMetrics>,
}

impl CacheProxy {
    pub fn new(
        policy: EligibilityPolicy,
        store: CacheStore,
        upstream: Arc<dyn Upstream>,
        upstream_url: Url,
        service_key: impl Into<String>,
        default_ttl: u64,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            policy,
            store,
            upstream,
            upstream_url,
            service_key: service_key.into(),
            default_ttl,
            metrics,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    // == Authorization ==
    /// Compares `X-Cache-Service-Key` with the provisioned secret.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<()> {
        let presented = headers
            .get(SERVICE_KEY_HEADER)
            .map(|value| value.as_bytes())
            .ok_or(CacheError::Unauthorized)?;
        if bool::from(presented.ct_eq(self.service_key.as_bytes())) {
            Ok(())
        } else {
            Err(CacheError::Unauthorized)
        }
    }

    // == Handle ==
    pub async fn handle(&self, request: Request<Bytes>) -> Result<ProxyOutcome> {
        let (parts, body) = request.into_parts();
        self.authorize(&parts.headers)?;

        let outbound = to_upstream_request(
            parts.method.clone(),
            &parts.uri,
            &parts.headers,
            body,
            &self.upstream_url,
        );

        if self.policy.is_bypass_route(&outbound.url)
            || !EligibilityPolicy::is_cacheable_method(&parts.method)
        {
            self.metrics.record_bypass();
            debug!(method = %parts.method, url = %outbound.url, "bypassing cache");
            let response = self.upstream.fetch(outbound).await?;
            return Ok(ProxyOutcome {
                response,
                status: CacheStatus::Bypass,
            });
        }

        let url = outbound.url.clone();
        let key = derive_key(&cache_identity(&parts.method, url.as_str()));

        match self.store.lookup(&key).await {
            Ok(Some(response)) => {
                self.metrics.record_hit();
                debug!(%url, %key, "cache hit");
                return Ok(ProxyOutcome {
                    response,
                    status: CacheStatus::Hit,
                });
            }
            Ok(None) => {}
            Err(err) => {
                self.metrics.record_store_error();
                warn!(%url, %key, error = %err, "cache lookup failed, treating as miss");
            }
        }
        self.metrics.record_miss();

        let response = self.upstream.fetch(outbound).await?;

        let status = match self.policy.evaluate_response(&parts.method, &url, &response) {
            EligibilityDecision::Cacheable => {
                let ttl = resolve_ttl(&parts.headers, self.default_ttl);
                match self.store.store(&key, &response, ttl).await {
                    Ok(()) => {
                        self.metrics.record_store();
                        debug!(%url, %key, ttl, "cache miss stored");
                        CacheStatus::Miss
                    }
                    Err(err) => {
                        self.metrics.record_store_error();
                        warn!(%url, %key, error = %err, "cache write failed");
                        CacheStatus::Uncached
                    }
                }
            }
            EligibilityDecision::Rejected(reason) => {
                self.metrics.record_uncacheable();
                debug!(%url, %reason, "response not cacheable");
                CacheStatus::Uncached
            }
        };

        Ok(ProxyOutcome { response, status })
    }
}
