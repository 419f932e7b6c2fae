//! Upstream fetch capability.
//!
//! [`Upstream`] is the only way the proxy talks to the origin API.
//! [`to_upstream_request`] is the pure rewrite from an inbound request to the
//! outbound one.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use bytes::Bytes;
use reqwest::Url;
use tracing::debug;

use crate::cache::ttl::TTL_HEADER;
use crate::error::{CacheError, Result};

/// Request header carrying the proxy credential.
pub const SERVICE_KEY_HEADER: &str = "x-cache-service-key";

/// Headers describing one hop only; never forwarded in either direction.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// == Request / Response ==
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Mirrors the fetch API `ok` flag.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }
}

// == Capability ==
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse>;
}

// == Request Rewrite ==
/// Points the request at `upstream` (scheme, host and port) keeping the path
/// and query, and strips the proxy's own control headers.
pub fn to_upstream_request(
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    upstream: &Url,
) -> UpstreamRequest {
    let mut url = upstream.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url.set_fragment(None);

    let mut headers = headers.clone();
    for name in [SERVICE_KEY_HEADER, TTL_HEADER] {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    UpstreamRequest {
        method,
        url,
        headers,
        body,
    }
}

// == HTTP Upstream ==
/// reqwest-backed fetch. Redirects are passed back to the caller untouched.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CacheError::Internal(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        debug!(method = %request.method, url = %request.url, "forwarding upstream");

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CacheError::Upstream(e.to_string()))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Upstream(e.to_string()))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
