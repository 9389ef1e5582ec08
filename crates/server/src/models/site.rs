//! Site domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use siteline_core::{AddressId, UserId};

/// A physical address enrolled by a user after successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    pub id: Uuid,
    pub site_name: String,
    /// Location identifier resolved when the site was provisioned.
    pub location_id: String,
    pub user_id: UserId,
    pub address_id: AddressId,
    /// Connect session that provisioned this site.
    pub connect_session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Parameters for provisioning a site.
#[derive(Debug, Clone)]
pub struct NewSite {
    pub site_name: String,
    pub location_id: String,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub connect_session_id: Uuid,
}
