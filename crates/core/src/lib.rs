//! Siteline Core - Shared types library.
//!
//! This crate provides common types used across all Siteline components:
//! - `server` - Address lookup gateway, connect-session callbacks and dashboard
//! - `cli` - Command-line tools for migrations and session inspection
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding for IDs is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, connect-session status and callback tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
