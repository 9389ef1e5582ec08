//! Core types for Siteline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod status;
pub mod token;

pub use id::*;
pub use status::{ConnectStatus, ConnectStatusError};
pub use token::{ConnectToken, ConnectTokenError};
