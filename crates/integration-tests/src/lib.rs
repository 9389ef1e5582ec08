//! Integration test harness for Siteline.
//!
//! Each [`TestContext`] runs two servers on ephemeral local ports:
//!
//! - a fake getAddress.io provider that counts requests
//! - the Siteline app, wired to the in-memory store and in-memory sessions
//!
//! The app gets one extra route, `POST /test/login`, standing in for the
//! identity layer: it writes the posted [`CurrentUser`] into the session.
//!
//! ```bash
//! cargo test -p siteline-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use reqwest::Client;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::{MemoryStore as SessionMemoryStore, Session};

use siteline_server::config::{AuthConfig, GeocodingConfig, ServerConfig};
use siteline_server::db::{MemoryStore, Store};
use siteline_server::geocoding::GeocodingClient;
use siteline_server::middleware::{self, set_current_user};
use siteline_server::models::CurrentUser;
use siteline_server::state::AppState;

/// API key the fake provider accepts.
pub const API_KEY: &str = "test-api-key";

/// Provider address ID the fake provider knows.
pub const KNOWN_ADDRESS_ID: &str = "paf_10";

/// Request counters and failure switch for the fake provider.
#[derive(Default)]
pub struct ProviderStats {
    pub autocomplete_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    /// When non-zero every request answers with this status.
    pub fail_with: AtomicU16,
}

impl ProviderStats {
    #[must_use]
    pub fn autocomplete_calls(&self) -> usize {
        self.autocomplete_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, status: u16) {
        self.fail_with.store(status, Ordering::SeqCst);
    }
}

#[derive(Deserialize)]
struct ApiKeyQuery {
    #[serde(rename = "api-key")]
    api_key: Option<String>,
}

fn check_request(stats: &ProviderStats, key: Option<&str>) -> Result<(), (StatusCode, Json<Value>)> {
    let fail_with = stats.fail_with.load(Ordering::SeqCst);
    if fail_with != 0 {
        let status = StatusCode::from_u16(fail_with).unwrap();
        return Err((status, Json(json!({ "Message": "Provider failure" }))));
    }
    if key != Some(API_KEY) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "Message": "Invalid api-key" })),
        ));
    }
    Ok(())
}

async fn fake_autocomplete(
    State(stats): State<Arc<ProviderStats>>,
    Path(postcode): Path<String>,
    Query(query): Query<ApiKeyQuery>,
) -> impl IntoResponse {
    stats.autocomplete_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(rejection) = check_request(&stats, query.api_key.as_deref()) {
        return rejection;
    }
    (
        StatusCode::OK,
        Json(json!({
            "suggestions": [
                {
                    "address": format!("10 Watkin Terrace, Northampton, {postcode}"),
                    "url": format!("/get/{KNOWN_ADDRESS_ID}"),
                    "id": KNOWN_ADDRESS_ID
                }
            ]
        })),
    )
}

async fn fake_get(
    State(stats): State<Arc<ProviderStats>>,
    Path(id): Path<String>,
    Query(query): Query<ApiKeyQuery>,
) -> impl IntoResponse {
    stats.get_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(rejection) = check_request(&stats, query.api_key.as_deref()) {
        return rejection;
    }
    if id != KNOWN_ADDRESS_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "Message": "Address not found" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "postcode": "NN1 3ER",
            "latitude": 52.245_937,
            "longitude": -0.891_636,
            "formatted_address": ["10 Watkin Terrace", "", "", "Northampton", "Northamptonshire"],
            "thoroughfare": "Watkin Terrace",
            "building_name": "",
            "sub_building_name": "",
            "sub_building_number": "",
            "building_number": "10",
            "line_1": "10 Watkin Terrace",
            "line_2": "",
            "line_3": "",
            "line_4": "",
            "locality": "",
            "town_or_city": "Northampton",
            "county": "Northamptonshire",
            "district": "Northampton",
            "country": "England",
            "residential": true
        })),
    )
}

async fn test_login(session: Session, Json(user): Json<CurrentUser>) -> StatusCode {
    match set_current_user(&session, &user).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// A running app plus its fake provider.
pub struct TestContext {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<ProviderStats>,
}

impl TestContext {
    /// Start with dashboard gating enabled.
    pub async fn new() -> Self {
        Self::with_auth(AuthConfig {
            skip: false,
            login_url: "/auth/login".to_owned(),
        })
        .await
    }

    /// Start with the given gating configuration.
    pub async fn with_auth(auth: AuthConfig) -> Self {
        let provider = Arc::new(ProviderStats::default());
        let provider_router = Router::new()
            .route("/autocomplete/{postcode}", get(fake_autocomplete))
            .route("/get/{id}", get(fake_get))
            .with_state(Arc::clone(&provider));
        let provider_addr = serve(provider_router).await;

        let geocoding = GeocodingConfig {
            base_url: format!("http://{provider_addr}"),
            api_key: SecretString::from(API_KEY),
            timeout: Duration::from_secs(5),
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

        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn Store> = Arc::<MemoryStore>::clone(&store);
        let state = AppState::new(
            config.clone(),
            dyn_store,
            Arc::new(GeocodingClient::new(&geocoding).unwrap()),
        );
        let session_layer = middleware::session_layer(SessionMemoryStore::default(), &config);
        let routes = siteline_server::routes::routes(state.clone())
            .route("/test/login", post(test_login));
        let app_addr = serve(siteline_server::build_app(routes, state, session_layer)).await;

        Self {
            base_url: format!("http://{app_addr}"),
            store,
            provider,
        }
    }

    /// Absolute URL for a path on the app.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A client with a cookie store that does not follow redirects.
    #[must_use]
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    /// A client signed in as `user_id`. The store learns about the user
    /// only through the app.
    pub async fn signed_in_client(&self, user_id: &str) -> Client {
        let client = Self::client();
        let response = client
            .post(self.url("/test/login"))
            .json(&json!({ "id": user_id, "email": format!("{user_id}@example.com") }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
        client
    }

    /// Call the provider callback the way a proxy forwards it, from a fixed
    /// client IP.
    pub async fn callback(&self, fp_cot: &str, fp_status: &str) -> reqwest::Response {
        Self::client()
            .get(self.url(&format!(
                "/api/connect/callback?fp_cot={fp_cot}&fp_status={fp_status}"
            )))
            .header("x-forwarded-for", "203.0.113.10")
            .send()
            .await
            .unwrap()
    }

    /// Call the provider callback directly, with no proxy headers.
    pub async fn direct_callback(&self, fp_cot: &str, fp_status: &str) -> reqwest::Response {
        Self::client()
            .get(self.url(&format!(
                "/api/connect/callback?fp_cot={fp_cot}&fp_status={fp_status}"
            )))
            .send()
            .await
            .unwrap()
    }
}

/// Read a JSON error body's code.
pub async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"]["code"].as_str().unwrap_or_default().to_owned()
}
