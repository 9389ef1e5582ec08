//! Connect-session callback token (`fp_cot`).

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when parsing a [`ConnectToken`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectTokenError {
    /// The token is empty or whitespace.
    #[error("token cannot be empty")]
    Empty,
    /// The token is too long.
    #[error("token must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// Opaque token correlating a provider verification flow with a stored
/// connect session.
///
/// ## Examples
///
/// ```
/// use siteline_core::ConnectToken;
///
/// assert!(ConnectToken::parse("abc123").is_ok());
/// assert!(ConnectToken::parse("").is_err());
/// assert_eq!(ConnectToken::generate().as_str().len(), 32);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConnectToken(String);

impl ConnectToken {
    /// Maximum accepted token length.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a token received from the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or longer than
    /// [`Self::MAX_LENGTH`].
    pub fn parse(s: &str) -> Result<Self, ConnectTokenError> {
        if s.trim().is_empty() {
            return Err(ConnectTokenError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ConnectTokenError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Generate a fresh random token for a new session.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ConnectToken {
    type Err = ConnectTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(ConnectToken::parse("abc123").unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_parse_blank() {
        assert_eq!(ConnectToken::parse(""), Err(ConnectTokenError::Empty));
        assert_eq!(ConnectToken::parse("   "), Err(ConnectTokenError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(ConnectToken::MAX_LENGTH + 1);
        assert!(matches!(
            ConnectToken::parse(&long),
            Err(ConnectTokenError::TooLong { .. })
        ));
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(ConnectToken::generate(), ConnectToken::generate());
    }
}
