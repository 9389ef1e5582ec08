//! Siteline server library.
//!
//! Address lookup proxy, connect-session callback workflow and the sites
//! dashboard. The binary in `main.rs` wires these to `PostgreSQL`; the
//! integration tests wire them to the in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod geocoding;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, body::Body, http::Request, middleware::from_fn};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;

/// Build the application router.
///
/// The session layer is supplied by the caller so tests can use an
/// in-memory session store.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    build_app(routes::routes(state.clone()), state, session_layer)
}

/// Wrap a route tree in the shared middleware stack.
pub fn build_app<S>(
    routes: Router<AppState>,
    state: AppState,
    session_layer: SessionManagerLayer<S>,
) -> Router
where
    S: SessionStore + Clone,
{
    routes
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri().path(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use secrecy::SecretString;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore as SessionMemoryStore;

    use super::*;
    use crate::config::{AuthConfig, GeocodingConfig, ServerConfig};
    use crate::db::MemoryStore;
    use crate::geocoding::GeocodingClient;

    fn test_app(auth: AuthConfig) -> Router {
        let geocoding = GeocodingConfig {
            base_url: "http://127.0.0.1:9".to_owned(),
            api_key: SecretString::from("unused"),
            timeout: Duration::from_secs(1),
        };
        let config = ServerConfig {
            database_url: SecretString::from("postgres://unused"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            base_url: "http://localhost".to_owned(),
            geocoding: geocoding.clone(),
            auth,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
        };
        let layer = middleware::session_layer(SessionMemoryStore::default(), &config);
        let state = AppState::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(GeocodingClient::new(&geocoding).unwrap()),
        );
        app(state, layer)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_sets_security_headers_and_request_id() {
        let response = test_app(AuthConfig::default())
            .oneshot(get("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_upstream_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap();
        let response = test_app(AuthConfig::default()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_readiness_pings_store() {
        let response = test_app(AuthConfig::default())
            .oneshot(get("/health/ready"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dashboard_redirects_without_session() {
        let auth = AuthConfig {
            skip: false,
            login_url: "/signin".to_owned(),
        };
        let response = test_app(auth).oneshot(get("/dashboard")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/signin");
    }

    #[tokio::test]
    async fn test_dashboard_served_when_gating_skipped() {
        let auth = AuthConfig {
            skip: true,
            ..AuthConfig::default()
        };
        let response = test_app(auth).oneshot(get("/dashboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["error"]["code"].as_str().unwrap_or_default().to_owned()
    }

    #[tokio::test]
    async fn test_api_requires_session() {
        let response = test_app(AuthConfig::default())
            .oneshot(get("/api/sites"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_nested_api_routes_answer_401_not_redirect() {
        let start = Request::builder()
            .method("POST")
            .uri("/api/connect/sessions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"address_id":"paf_1","site_name":"Home"}"#))
            .unwrap();
        let response = test_app(AuthConfig::default()).oneshot(start).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "UNAUTHORIZED");

        let response = test_app(AuthConfig::default())
            .oneshot(get("/api/address/autocomplete?postcode=NN1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.headers().contains_key("location"));
    }

    #[tokio::test]
    async fn test_callback_without_proxy_headers_reaches_workflow() {
        let response = test_app(AuthConfig::default())
            .oneshot(get("/api/connect/callback?fp_cot=unknown&fp_status=success"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_code(response).await, "NOT_FOUND");
    }
}
