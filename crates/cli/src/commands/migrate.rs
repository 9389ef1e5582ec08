//! Database migration command.
//!
//! Migrations live in `crates/server/migrations/` and are embedded at
//! compile time.

use siteline_server::config::database_url_from_env;
use siteline_server::db::create_pool;

use super::CommandError;

/// Apply all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
