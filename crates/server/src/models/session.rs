//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use siteline_core::UserId;

/// Session-stored user identity.
///
/// Written by the identity layer at sign-in; this service only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's ID in the identity layer.
    pub id: UserId,
    /// User's email address, when known.
    #[serde(default)]
    pub email: Option<String>,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
