//! Persistent store for addresses, connect sessions and sites.
//!
//! # Database: `siteline`
//!
//! ## Tables (schema `siteline`)
//!
//! - `user` - Users known to the identity layer
//! - `address` - Cached geocoding provider addresses
//! - `connect_session` - Provider verification flows (`fp_cot`)
//! - `site` - Sites provisioned from successful sessions
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p siteline-cli -- migrate
//! ```
//!
//! # Implementations
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, used by the server binary
//! - [`MemoryStore`] - In-process store for tests and local development

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use siteline_core::{AddressId, ConnectStatus, ConnectToken, UserId};

use crate::models::{Address, ConnectSession, NewConnectSession, NewSite, Site};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors returned by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate token).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Creating the site for a successful session failed; the session
    /// transition was rolled back.
    #[error("failed to create site: {0}")]
    DependentCreate(String),
}

/// How a pending connect session should be finalized.
#[derive(Debug, Clone)]
pub enum Finalization {
    /// Transition to `success` and provision this site in the same unit.
    Succeeded(NewSite),
    /// Transition to `fail`.
    Failed,
}

impl Finalization {
    /// Status the session ends in.
    #[must_use]
    pub const fn status(&self) -> ConnectStatus {
        match self {
            Self::Succeeded(_) => ConnectStatus::Success,
            Self::Failed => ConnectStatus::Fail,
        }
    }
}

/// Result of a finalization attempt.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// The session moved out of `pending`.
    Transitioned {
        status: ConnectStatus,
        site: Option<Site>,
    },
    /// The session was already finalized (by an earlier or concurrent
    /// callback); nothing was written.
    NotPending(ConnectStatus),
}

/// Persistent store collaborator.
///
/// The store owns every entity; callers only hold identifiers for the span
/// of a request.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check connectivity.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Record a user seen through the identity layer. Existing users are
    /// left as they are.
    async fn ensure_user(&self, user_id: &UserId, email: Option<&str>) -> Result<(), StoreError>;

    /// Whether an address with this provider ID is cached.
    async fn address_exists(&self, id: &AddressId) -> Result<bool, StoreError>;

    /// Get a cached address.
    async fn get_address(&self, id: &AddressId) -> Result<Option<Address>, StoreError>;

    /// Cache an address. Returns `false` if a record with the same ID was
    /// inserted first (the existing record is kept).
    async fn insert_address(&self, address: &Address) -> Result<bool, StoreError>;

    /// Store a new `pending` connect session.
    async fn create_session(&self, new: &NewConnectSession)
    -> Result<ConnectSession, StoreError>;

    /// Look up a connect session by its callback token.
    async fn find_session(&self, token: &ConnectToken)
    -> Result<Option<ConnectSession>, StoreError>;

    /// Finalize a session as one atomic unit.
    ///
    /// The transition only applies while the session is `pending`. For
    /// [`Finalization::Succeeded`] the site is created in the same unit; if
    /// that fails the transition is undone and
    /// [`StoreError::DependentCreate`] is returned.
    async fn finalize_session(
        &self,
        token: &ConnectToken,
        finalization: Finalization,
    ) -> Result<FinalizeOutcome, StoreError>;

    /// Sites owned by a user, newest first.
    async fn list_sites_for_user(&self, user_id: &UserId) -> Result<Vec<Site>, StoreError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
