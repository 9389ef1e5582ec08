//! CLI subcommands.

pub mod migrate;
pub mod session;

/// Errors from CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] siteline_server::config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store error: {0}")]
    Store(#[from] siteline_server::db::StoreError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] siteline_core::ConnectTokenError),

    #[error("No connect session with fp_cot {0}")]
    SessionNotFound(String),
}
