//! Connect-session route handlers.
//!
//! `POST /api/connect/sessions` starts a verification flow for the signed-in
//! user; the provider reports the result to the public
//! `GET /api/connect/callback`.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use siteline_core::{AddressId, ConnectStatus, ConnectToken};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::{CallbackReceipt, ConnectWorkflow, StartSession};
use crate::state::AppState;

/// Request body for starting a connect session.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub address_id: String,
    pub site_name: String,
}

/// Response for a started connect session.
#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub fp_cot: ConnectToken,
    pub status: ConnectStatus,
}

/// Callback query parameters.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub fp_cot: String,
    pub fp_status: String,
}

/// Start a connect session.
///
/// POST /api/connect/sessions
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn start_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<StartSessionRequest>,
) -> Result<impl IntoResponse> {
    let address_id = body.address_id.trim();
    if address_id.is_empty() {
        return Err(AppError::BadRequest("address id cannot be empty".to_string()));
    }

    let workflow = ConnectWorkflow::new(state.store(), state.locations());
    let session = workflow
        .start(StartSession {
            user_id: user.id,
            email: user.email,
            address_id: AddressId::new(address_id),
            site_name: body.site_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            fp_cot: session.token,
            status: session.status,
        }),
    ))
}

/// Provider callback.
///
/// GET /api/connect/callback?fp_cot=&fp_status=
///
/// Public: the provider redirects here with the flow result. A callback for
/// an already finalized session is acknowledged with `changed: false`.
#[instrument(skip(state, query))]
pub async fn callback(
    State(state): State<AppState>,
    query: std::result::Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<Json<CallbackReceipt>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let token = ConnectToken::parse(&query.fp_cot)
        .map_err(|e| AppError::BadRequest(format!("fp_cot: {e}")))?;

    let workflow = ConnectWorkflow::new(state.store(), state.locations());
    let receipt = workflow.handle_callback(&token, &query.fp_status).await?;
    Ok(Json(receipt))
}
