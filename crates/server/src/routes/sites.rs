//! Site listing route handlers.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::Site;
use crate::state::AppState;

/// List the signed-in user's sites, newest first.
///
/// GET /api/sites
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Site>>> {
    let sites = state.store().list_sites_for_user(&user.id).await?;
    Ok(Json(sites))
}
