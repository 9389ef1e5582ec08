//! Address lookup API: autocomplete proxying and address caching.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use siteline_core::AddressId;
use siteline_integration_tests::{KNOWN_ADDRESS_ID, TestContext, error_code};
use siteline_server::db::Store;

#[tokio::test]
async fn test_autocomplete_returns_provider_payload() {
    let ctx = TestContext::new().await;
    let client = ctx.signed_in_client("u1").await;

    let response = client
        .get(ctx.url("/api/address/autocomplete?postcode=NN1%203ER"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["suggestions"][0]["id"], KNOWN_ADDRESS_ID);
    assert_eq!(
        body["suggestions"][0]["address"],
        "10 Watkin Terrace, Northampton, NN1 3ER"
    );
    assert_eq!(ctx.provider.autocomplete_calls(), 1);
}

#[tokio::test]
async fn test_autocomplete_upstream_failure() {
    let ctx = TestContext::new().await;
    let client = ctx.signed_in_client("u1").await;
    ctx.provider.fail_with(500);

    let response = client
        .get(ctx.url("/api/address/autocomplete?postcode=NN1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await, "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_autocomplete_missing_postcode_is_bad_request() {
    let ctx = TestContext::new().await;
    let client = ctx.signed_in_client("u1").await;

    let response = client
        .get(ctx.url("/api/address/autocomplete"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "BAD_REQUEST");
    assert_eq!(ctx.provider.autocomplete_calls(), 0);
}

#[tokio::test]
async fn test_autocomplete_requires_session() {
    let ctx = TestContext::new().await;

    let response = TestContext::client()
        .get(ctx.url("/api/address/autocomplete?postcode=NN1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_resolve_caches_once() {
    let ctx = TestContext::new().await;
    let client = ctx.signed_in_client("u1").await;

    let first = client
        .post(ctx.url("/api/address"))
        .json(&json!({ "id": KNOWN_ADDRESS_ID }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["created"], true);

    let second = client
        .post(ctx.url("/api/address"))
        .json(&json!({ "id": KNOWN_ADDRESS_ID }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["created"], false);

    assert_eq!(ctx.provider.get_calls(), 1);
    assert_eq!(ctx.store.write_count().await, 1);

    let address = ctx
        .store
        .get_address(&AddressId::new(KNOWN_ADDRESS_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(address.line_one.as_deref(), Some("10 Watkin Terrace"));
    assert_eq!(address.town_or_city.as_deref(), Some("Northampton"));
    assert_eq!(address.residential, Some(true));
}

#[tokio::test]
async fn test_resolve_unknown_provider_id_writes_nothing() {
    let ctx = TestContext::new().await;
    let client = ctx.signed_in_client("u1").await;

    let response = client
        .post(ctx.url("/api/address"))
        .json(&json!({ "id": "paf_missing" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await, "UPSTREAM_ERROR");
    assert_eq!(ctx.store.write_count().await, 0);
}
