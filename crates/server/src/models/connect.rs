//! Connect-session domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use siteline_core::{AddressId, ConnectStatus, ConnectToken, UserId};

/// A provider verification flow awaiting (or having received) its callback.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectSession {
    /// Database ID.
    pub id: Uuid,
    /// Callback correlation token (`fp_cot`).
    pub token: ConnectToken,
    /// Current lifecycle state.
    pub status: ConnectStatus,
    /// User who started the flow.
    pub user_id: UserId,
    /// Address being enrolled.
    pub address_id: AddressId,
    /// Name for the site created on success.
    pub site_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for starting a connect session.
#[derive(Debug, Clone)]
pub struct NewConnectSession {
    pub token: ConnectToken,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub site_name: String,
}
