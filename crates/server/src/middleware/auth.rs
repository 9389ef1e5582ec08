//! Authentication extractors and dashboard gating.
//!
//! The identity layer writes [`CurrentUser`] into the session at sign-in;
//! everything here only reads it.

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{Extensions, Uri, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires an authenticated user.
///
/// HTML requests without a user are redirected to the configured login URL;
/// `/api/` requests get a JSON `401 UNAUTHORIZED`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.id)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required but the user is not
/// signed in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin(String),
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl AuthRejection {
    fn for_path(path: &str, login_url: &str) -> Self {
        if path.starts_with("/api/") {
            Self::Unauthorized
        } else {
            Self::RedirectToLogin(login_url.to_owned())
        }
    }
}

/// Path as the client sent it; nested routers see it with their prefix
/// stripped.
fn request_path<'a>(extensions: &'a Extensions, uri: &'a Uri) -> &'a str {
    extensions
        .get::<OriginalUri>()
        .map_or_else(|| uri.path(), |OriginalUri(original)| original.path())
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(login_url) => Redirect::to(&login_url).into_response(),
            Self::Unauthorized => {
                AppError::Unauthorized("sign in required".to_string()).into_response()
            }
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        current_user(&parts.extensions)
            .await
            .map(Self)
            .ok_or_else(|| {
                AuthRejection::for_path(
                    request_path(&parts.extensions, &parts.uri),
                    &state.config().auth.login_url,
                )
            })
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(&parts.extensions).await))
    }
}

async fn current_user(extensions: &Extensions) -> Option<CurrentUser> {
    // Set by SessionManagerLayer
    let session = extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Gate dashboard pages behind authentication.
///
/// With `auth.skip` enabled every request passes through; otherwise
/// requests without a signed-in user are rejected as in [`RequireAuth`].
pub async fn require_dashboard_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.config().auth.skip {
        return next.run(request).await;
    }

    if current_user(request.extensions()).await.is_none() {
        let path = request_path(request.extensions(), request.uri());
        return AuthRejection::for_path(path, &state.config().auth.login_url).into_response();
    }

    next.run(request).await
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}
