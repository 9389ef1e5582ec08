//! Dashboard gating and rendering.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::json;

use siteline_integration_tests::{KNOWN_ADDRESS_ID, TestContext};
use siteline_server::config::AuthConfig;

#[tokio::test]
async fn test_anonymous_dashboard_redirects_to_login() {
    let ctx = TestContext::new().await;

    let response = TestContext::client()
        .get(ctx.url("/dashboard"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/auth/login");
}

#[tokio::test]
async fn test_skip_serves_dashboard_without_session() {
    let ctx = TestContext::with_auth(AuthConfig {
        skip: true,
        ..AuthConfig::default()
    })
    .await;

    let response = TestContext::client()
        .get(ctx.url("/dashboard"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await.unwrap();
    assert!(html.contains("Sign in to see the sites"));
}

#[tokio::test]
async fn test_dashboard_lists_sites() {
    let ctx = TestContext::new().await;
    let client = ctx.signed_in_client("u1").await;

    client
        .post(ctx.url("/api/address"))
        .json(&json!({ "id": KNOWN_ADDRESS_ID }))
        .send()
        .await
        .unwrap();
    let session: serde_json::Value = client
        .post(ctx.url("/api/connect/sessions"))
        .json(&json!({ "address_id": KNOWN_ADDRESS_ID, "site_name": "Allotment" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    ctx.callback(session["fp_cot"].as_str().unwrap(), "success")
        .await;

    let response = client.get(ctx.url("/dashboard")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await.unwrap();
    assert!(html.contains("Allotment"));
    assert!(html.contains("10 Watkin Terrace, Northampton, Northamptonshire"));
    assert!(html.contains("u1@example.com"));
}
