//! Connect-session inspection.

use siteline_core::ConnectToken;
use siteline_server::config::database_url_from_env;
use siteline_server::db::{PgStore, Store, create_pool};

use super::CommandError;

/// Print a connect session's status.
pub async fn show(fp_cot: &str) -> Result<(), CommandError> {
    let token = ConnectToken::parse(fp_cot)?;
    let pool = create_pool(&database_url_from_env()?).await?;
    let store = PgStore::new(pool);

    let session = store
        .find_session(&token)
        .await?
        .ok_or_else(|| CommandError::SessionNotFound(fp_cot.to_owned()))?;

    #[allow(clippy::print_stdout)]
    {
        println!("fp_cot:     {}", session.token);
        println!("status:     {}", session.status);
        println!("user_id:    {}", session.user_id);
        println!("address_id: {}", session.address_id);
        println!("site_name:  {}", session.site_name);
        println!("created_at: {}", session.created_at.to_rfc3339());
        println!("updated_at: {}", session.updated_at.to_rfc3339());
    }

    Ok(())
}
