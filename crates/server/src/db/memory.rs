//! In-process store for tests and local development.
//!
//! Enforces the same rules as the `PostgreSQL` schema: unique callback tokens,
//! sites referencing existing users and addresses, and at most one site per
//! connect session.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use siteline_core::{AddressId, ConnectStatus, ConnectToken, UserId};

use super::{Finalization, FinalizeOutcome, Store, StoreError};
use crate::models::{Address, ConnectSession, NewConnectSession, Site};

#[derive(Default)]
struct MemoryState {
    users: HashSet<UserId>,
    addresses: HashMap<AddressId, Address>,
    sessions: HashMap<String, ConnectSession>,
    sites: Vec<Site>,
    writes: usize,
}

/// Store held entirely in memory.
///
/// A single async mutex guards all state, so every operation (including a
/// whole finalization) is serialized.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes performed through the [`Store`] trait.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    /// All sites, in creation order.
    pub async fn sites(&self) -> Vec<Site> {
        self.state.lock().await.sites.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ensure_user(&self, user_id: &UserId, _email: Option<&str>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.users.insert(user_id.clone()) {
            state.writes += 1;
        }
        Ok(())
    }

    async fn address_exists(&self, id: &AddressId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.addresses.contains_key(id))
    }

    async fn get_address(&self, id: &AddressId) -> Result<Option<Address>, StoreError> {
        Ok(self.state.lock().await.addresses.get(id).cloned())
    }

    async fn insert_address(&self, address: &Address) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.addresses.contains_key(&address.id) {
            return Ok(false);
        }
        state.addresses.insert(address.id.clone(), address.clone());
        state.writes += 1;
        Ok(true)
    }

    async fn create_session(
        &self,
        new: &NewConnectSession,
    ) -> Result<ConnectSession, StoreError> {
        let mut state = self.state.lock().await;
        if state.sessions.contains_key(new.token.as_str()) {
            return Err(StoreError::Conflict("fp_cot already exists".to_owned()));
        }

        let now = Utc::now();
        let session = ConnectSession {
            id: Uuid::new_v4(),
            token: new.token.clone(),
            status: ConnectStatus::Pending,
            user_id: new.user_id.clone(),
            address_id: new.address_id.clone(),
            site_name: new.site_name.clone(),
            created_at: now,
            updated_at: now,
        };
        state
            .sessions
            .insert(new.token.as_str().to_owned(), session.clone());
        state.writes += 1;
        Ok(session)
    }

    async fn find_session(
        &self,
        token: &ConnectToken,
    ) -> Result<Option<ConnectSession>, StoreError> {
        Ok(self.state.lock().await.sessions.get(token.as_str()).cloned())
    }

    async fn finalize_session(
        &self,
        token: &ConnectToken,
        finalization: Finalization,
    ) -> Result<FinalizeOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let current = state
            .sessions
            .get(token.as_str())
            .map(|s| s.status)
            .ok_or(StoreError::NotFound)?;
        if current.is_terminal() {
            return Ok(FinalizeOutcome::NotPending(current));
        }

        let status = finalization.status();
        let site = match finalization {
            Finalization::Failed => None,
            Finalization::Succeeded(new_site) => {
                // Validate everything before mutating so a failure leaves
                // the session untouched.
                if !state.users.contains(&new_site.user_id) {
                    return Err(StoreError::DependentCreate(format!(
                        "user {} does not exist",
                        new_site.user_id
                    )));
                }
                if !state.addresses.contains_key(&new_site.address_id) {
                    return Err(StoreError::DependentCreate(format!(
                        "address {} does not exist",
                        new_site.address_id
                    )));
                }
                if state
                    .sites
                    .iter()
                    .any(|s| s.connect_session_id == new_site.connect_session_id)
                {
                    return Err(StoreError::DependentCreate(
                        "site already exists for connect session".to_owned(),
                    ));
                }

                Some(Site {
                    id: Uuid::new_v4(),
                    site_name: new_site.site_name,
                    location_id: new_site.location_id,
                    user_id: new_site.user_id,
                    address_id: new_site.address_id,
                    connect_session_id: new_site.connect_session_id,
                    created_at: Utc::now(),
                })
            }
        };

        if let Some(session) = state.sessions.get_mut(token.as_str()) {
            session.status = status;
            session.updated_at = Utc::now();
        }
        if let Some(site) = &site {
            state.sites.push(site.clone());
        }
        state.writes += 1;

        Ok(FinalizeOutcome::Transitioned { status, site })
    }

    async fn list_sites_for_user(&self, user_id: &UserId) -> Result<Vec<Site>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .sites
            .iter()
            .rev()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect())
    }
}
