//! Connect-session status.
//!
//! A connect session starts `pending` and is finalized exactly once by the
//! provider callback, moving to either `success` or `fail`.

use serde::{Deserialize, Serialize};

/// The callback status value that marks a verification as successful.
///
/// Any other reported value is treated as a failure.
pub const CALLBACK_SUCCESS: &str = "success";

/// Error returned when parsing an unknown status string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid connect status: {0}")]
pub struct ConnectStatusError(pub String);

/// Lifecycle state of a connect session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectStatus {
    /// Waiting for the provider callback.
    #[default]
    Pending,
    /// Verification succeeded and a site was provisioned.
    Success,
    /// Verification failed or was abandoned.
    Fail,
}

impl ConnectStatus {
    /// Map a status reported by the provider callback to the terminal state
    /// it finalizes the session into.
    ///
    /// Only the exact string `"success"` counts as success.
    #[must_use]
    pub fn from_callback(reported: &str) -> Self {
        if reported == CALLBACK_SUCCESS {
            Self::Success
        } else {
            Self::Fail
        }
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Fail => "fail",
        }
    }

    /// Whether the session can no longer transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ConnectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectStatus {
    type Err = ConnectStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "fail" => Ok(Self::Fail),
            _ => Err(ConnectStatusError(s.to_owned())),
        }
    }
}
