//! API Routes
//!
//! Configures the Axum router: the proxy's own endpoints under `/_cache`
//! and a fallback that proxies everything else.

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{health_handler, proxy_handler, stats_handler, AppState};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /_cache/health` - Health check, no credentials required
/// - `GET /_cache/stats` - Cache counters, requires the service key
/// - anything else - Proxied through the read-through cache
///
/// # Middleware
/// - Body limit: `max_body_bytes` for buffered request bodies
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/_cache/health", get(health_handler))
        .route("/_cache/stats", get(stats_handler))
        .fallback(proxy_handler)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::tests::{test_state, SERVICE_KEY};
    use crate::proxy::SERVICE_KEY_HEADER;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        create_router(test_state(1024))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/_cache/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint_requires_key() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/_cache/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_fallback_proxies() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/rest/v1/countries?select=*")
                    .header(SERVICE_KEY_HEADER, SERVICE_KEY)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fallback_without_key() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/rest/v1/countries?select=*")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let app = create_router(test_state(4));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rest/v1/countries")
                    .header(SERVICE_KEY_HEADER, SERVICE_KEY)
                    .body(Body::from("too large"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_body_within_limit_is_forwarded() {
        let app = create_router(test_state(64));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rest/v1/countries")
                    .header(SERVICE_KEY_HEADER, SERVICE_KEY)
                    .body(Body::from(r#"{"name":"Bolivia"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
