//! API Handlers
//!
//! The catch-all proxy handler plus the proxy's own `/_cache/*` endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri},
    response::Response,
    Json,
};

use crate::cache::{CacheMetrics, CacheStore, EligibilityPolicy, SqliteBackend};
use crate::codec::derive_key;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, StatsResponse};
use crate::proxy::{CacheProxy, CacheStatus, HttpUpstream, ProxyOutcome, HOP_BY_HOP_HEADERS};

/// Response header set on answers served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read-through orchestrator
    pub proxy: Arc<CacheProxy>,
    /// Largest inbound body buffered for forwarding
    pub max_body_bytes: usize,
}

impl AppState {
    /// Creates a new AppState around a ready proxy.
    pub fn new(proxy: CacheProxy, max_body_bytes: usize) -> Self {
        Self {
            proxy: Arc::new(proxy),
            max_body_bytes,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens the SQLite store, imports the encryption key and builds the
    /// upstream HTTP client.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = SqliteBackend::open(&config.database_path, &config.table_name)?;
        let key = derive_key(&config.encryption_key)?;
        let metrics = Arc::new(CacheMetrics::new());
        let store = CacheStore::new(Arc::new(backend), key, Arc::clone(&metrics));
        let upstream = HttpUpstream::new(Duration::from_secs(config.upstream_timeout_secs))?;

        let proxy = CacheProxy::new(
            EligibilityPolicy::new(config.bypass_paths.clone()),
            store,
            Arc::new(upstream),
            config.upstream_url.clone(),
            config.service_key.clone(),
            config.default_ttl,
            metrics,
        );
        Ok(Self::new(proxy, config.max_body_bytes))
    }
}

/// Fallback handler: every request outside `/_cache/*` is proxied.
///
/// The body is buffered under the router's `DefaultBodyLimit`.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Response> {
    let body = body.map_err(body_error)?;

    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;

    let outcome = state.proxy.handle(request).await?;
    Ok(outcome_response(outcome))
}

/// Only the length limit is a 413; any other read failure is a bad request.
fn body_error(rejection: BytesRejection) -> CacheError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        CacheError::PayloadTooLarge(rejection.body_text())
    } else {
        CacheError::InvalidRequest(rejection.body_text())
    }
}

/// Converts a proxy outcome into the client response, dropping hop-by-hop
/// headers and marking cache hits.
fn outcome_response(outcome: ProxyOutcome) -> Response {
    let ProxyOutcome { response, status } = outcome;

    let mut headers = response.headers;
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
    if status == CacheStatus::Hit {
        headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status.as_str()));
    }

    let mut reply = Response::new(Body::from(response.body));
    *reply.status_mut() = response.status;
    *reply.headers_mut() = headers;
    reply
}

/// Handler for GET /_cache/stats
///
/// Requires the service key like any proxied request.
pub async fn stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>> {
    state.proxy.authorize(&headers)?;
    Ok(Json(state.proxy.stats().into()))
}

/// Handler for GET /_cache/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
