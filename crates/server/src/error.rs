//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//!
//! Every error response is JSON with a stable, machine-readable code:
//!
//! ```json
//! { "error": { "code": "NOT_FOUND", "message": "Not found: connect session abc123" } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::StoreError;
use crate::geocoding::GeocodingError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Geocoding provider call failed or returned non-2xx.
    #[error("Upstream error: {0}")]
    Upstream(#[from] GeocodingError),

    /// Store operation failed.
    #[error("Database error: {0}")]
    Database(StoreError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Creating the site for a successful session failed.
    #[error("Dependent create failed: {0}")]
    DependentCreate(String),

    /// No location identifier could be resolved for a session.
    #[error("Location unresolved: {0}")]
    LocationUnresolved(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Client exceeded its request quota.
    #[error("Too many requests")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DependentCreate(message) => Self::DependentCreate(message),
            other => Self::Database(other),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl AppError {
    /// Stable error code for client consumption.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::DependentCreate(_) => "DEPENDENT_CREATE_ERROR",
            Self::LocationUnresolved(_) => "LOCATION_UNRESOLVED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::RateLimited => "RATE_LIMITED",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(_) | Self::LocationUnresolved(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) | Self::DependentCreate(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Upstream(_)
                | Self::DependentCreate(_)
                | Self::LocationUnresolved(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                code = self.code(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Upstream(_) => "External service error".to_string(),
            Self::DependentCreate(_) => "Failed to create site".to_string(),
            Self::LocationUnresolved(_) => "Could not resolve site location".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message,
            },
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a workflow step.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
