//! Address lookup route handlers.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use siteline_core::AddressId;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::{AddressGateway, ResolveOutcome};
use crate::state::AppState;

/// Query parameters for autocomplete.
#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    pub postcode: String,
}

/// Request body for resolving an address.
#[derive(Debug, Deserialize)]
pub struct ResolveAddressRequest {
    pub id: String,
}

/// Response for resolving an address.
#[derive(Debug, Serialize)]
pub struct ResolveAddressResponse {
    pub id: AddressId,
    /// Whether this request cached a new record.
    pub created: bool,
}

/// Proxy a postcode autocomplete lookup.
///
/// GET /api/address/autocomplete?postcode=
///
/// Returns the provider payload verbatim.
#[instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn autocomplete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    query: std::result::Result<Query<AutocompleteQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let gateway = AddressGateway::new(state.geocoding(), state.store());
    Ok(Json(gateway.autocomplete(&query.postcode).await?))
}

/// Ensure an address is cached.
///
/// POST /api/address
///
/// Responds `201 Created` when the address was fetched and stored, `200 OK`
/// when it was already cached.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn resolve(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ResolveAddressRequest>,
) -> Result<impl IntoResponse> {
    let id = AddressId::new(body.id.trim());
    let gateway = AddressGateway::new(state.geocoding(), state.store());
    let outcome = gateway.resolve(&id).await?;

    let status = match outcome {
        ResolveOutcome::Created(_) => StatusCode::CREATED,
        ResolveOutcome::AlreadyCached => StatusCode::OK,
    };

    Ok((
        status,
        Json(ResolveAddressResponse {
            id,
            created: outcome.created(),
        }),
    ))
}
