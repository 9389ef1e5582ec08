//! Connect-session workflow.
//!
//! A connect session correlates a provider verification flow with a user,
//! an address and a site name. It is created `pending` and finalized exactly
//! once by the provider callback:
//!
//! ```text
//! pending --"success"--> success   (site provisioned in the same transaction)
//! pending --anything---> fail
//! success | fail -------> (callback acknowledged, nothing written)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use siteline_core::{AddressId, ConnectStatus, ConnectToken, UserId};

use crate::db::{Finalization, FinalizeOutcome, Store, StoreError};
use crate::error::{AppError, add_breadcrumb};
use crate::models::{ConnectSession, NewConnectSession, NewSite, Site};

/// Maximum site name length.
const MAX_SITE_NAME_LENGTH: usize = 200;

/// Resolves the location identifier recorded on a provisioned site.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Resolve a location for the session, or `None` if it cannot be
    /// determined yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    async fn resolve(&self, session: &ConnectSession) -> Result<Option<String>, AppError>;
}

/// Uses the provider identifier of the session's cached address as the
/// location identifier.
pub struct AddressLocationResolver {
    store: Arc<dyn Store>,
}

impl AddressLocationResolver {
    /// Create a resolver backed by the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LocationResolver for AddressLocationResolver {
    async fn resolve(&self, session: &ConnectSession) -> Result<Option<String>, AppError> {
        let address = self.store.get_address(&session.address_id).await?;
        Ok(address.map(|a| a.id.into_inner()))
    }
}

/// Parameters for starting a connect session.
#[derive(Debug, Clone)]
pub struct StartSession {
    pub user_id: UserId,
    pub email: Option<String>,
    pub address_id: AddressId,
    pub site_name: String,
}

/// What a callback did to its session.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackReceipt {
    pub fp_cot: ConnectToken,
    /// Status after the callback.
    pub status: ConnectStatus,
    /// Site provisioned by this callback.
    pub site_id: Option<Uuid>,
    /// Whether this callback changed the session.
    pub changed: bool,
}

/// Connect-session workflow service.
pub struct ConnectWorkflow<'a> {
    store: &'a dyn Store,
    resolver: &'a dyn LocationResolver,
}

impl<'a> ConnectWorkflow<'a> {
    /// Create a new workflow.
    #[must_use]
    pub const fn new(store: &'a dyn Store, resolver: &'a dyn LocationResolver) -> Self {
        Self { store, resolver }
    }

    /// Start a verification flow for a cached address.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank or overlong site name,
    /// `AppError::NotFound` if the address has not been resolved yet.
    ///
    /// The signed-in user is recorded in the store so the site created by a
    /// later successful callback can reference it.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, address_id = %params.address_id))]
    pub async fn start(&self, params: StartSession) -> Result<ConnectSession, AppError> {
        let site_name = params.site_name.trim();
        if site_name.is_empty() {
            return Err(AppError::BadRequest("site name cannot be empty".to_string()));
        }
        if site_name.chars().count() > MAX_SITE_NAME_LENGTH {
            return Err(AppError::BadRequest(format!(
                "site name must be at most {MAX_SITE_NAME_LENGTH} characters"
            )));
        }

        if !self.store.address_exists(&params.address_id).await? {
            return Err(AppError::NotFound(format!(
                "address {}",
                params.address_id
            )));
        }

        self.store
            .ensure_user(&params.user_id, params.email.as_deref())
            .await?;

        let session = self
            .store
            .create_session(&NewConnectSession {
                token: ConnectToken::generate(),
                user_id: params.user_id,
                address_id: params.address_id,
                site_name: site_name.to_owned(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(msg) => AppError::Internal(msg),
                other => other.into(),
            })?;

        info!(session_id = %session.id, "Started connect session");
        Ok(session)
    }

    /// Apply a provider callback to the session identified by `token`.
    ///
    /// Only a `pending` session transitions; callbacks for a finalized
    /// session are acknowledged without writing anything.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no session has this token,
    /// `AppError::LocationUnresolved` if a successful session has no
    /// resolvable location (the session stays `pending`), and
    /// `AppError::DependentCreate` if the site cannot be created (the
    /// transition is rolled back).
    #[instrument(skip(self, token), fields(fp_cot = %token))]
    pub async fn handle_callback(
        &self,
        token: &ConnectToken,
        reported_status: &str,
    ) -> Result<CallbackReceipt, AppError> {
        let session = self
            .store
            .find_session(token)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("connect session {token}")))?;

        add_breadcrumb(
            "connect",
            "Received provider callback",
            &[("fp_cot", token.as_str()), ("fp_status", reported_status)],
        );

        if session.status.is_terminal() {
            info!(status = %session.status, "Callback for finalized session ignored");
            return Ok(Self::unchanged(token, session.status));
        }

        let finalization = match ConnectStatus::from_callback(reported_status) {
            ConnectStatus::Success => {
                let location_id = self.resolver.resolve(&session).await?.ok_or_else(|| {
                    AppError::LocationUnresolved(format!("connect session {token}"))
                })?;
                Finalization::Succeeded(NewSite {
                    site_name: session.site_name.clone(),
                    location_id,
                    user_id: session.user_id.clone(),
                    address_id: session.address_id.clone(),
                    connect_session_id: session.id,
                })
            }
            _ => Finalization::Failed,
        };

        let outcome = self
            .store
            .finalize_session(token, finalization)
            .await
            .inspect_err(|e| {
                if matches!(e, StoreError::DependentCreate(_)) {
                    warn!(error = %e, "Site creation failed, session left pending");
                }
            })?;

        match outcome {
            FinalizeOutcome::Transitioned { status, site } => {
                info!(
                    %status,
                    site_id = site.as_ref().map(|s| s.id.to_string()),
                    "Connect session finalized"
                );
                Ok(CallbackReceipt {
                    fp_cot: token.clone(),
                    status,
                    site_id: site.as_ref().map(|s: &Site| s.id),
                    changed: true,
                })
            }
            FinalizeOutcome::NotPending(status) => {
                info!(%status, "Concurrent callback already finalized session");
                Ok(Self::unchanged(token, status))
            }
        }
    }

    fn unchanged(token: &ConnectToken, status: ConnectStatus) -> CallbackReceipt {
        CallbackReceipt {
            fp_cot: token.clone(),
            status,
            site_id: None,
            changed: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Address;

    fn address(id: &str) -> Address {
        Address {
            id: AddressId::new(id),
            latitude: None,
            longitude: None,
            formatted_address: None,
            thoroughfare: None,
            building_name: None,
            sub_building_name: None,
            sub_building_number: None,
            building_number: None,
            line_one: None,
            line_two: None,
            line_three: None,
            line_four: None,
            postcode: None,
            locality: None,
            town_or_city: None,
            county: None,
            district: None,
            country: None,
            residential: None,
            created_at: Utc::now(),
        }
    }

    /// Store with user `u1`, address `a1` and a pending session `abc123`
    /// for site "Home".
    async fn seeded_store(user: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.ensure_user(&UserId::new("u1"), None).await.unwrap();
        store.insert_address(&address("a1")).await.unwrap();
        store
            .create_session(&NewConnectSession {
                token: ConnectToken::parse("abc123").unwrap(),
                user_id: UserId::new(user),
                address_id: AddressId::new("a1"),
                site_name: "Home".to_owned(),
            })
            .await
            .unwrap();
        store
    }

    fn token() -> ConnectToken {
        ConnectToken::parse("abc123").unwrap()
    }

    struct NoLocation;

    #[async_trait]
    impl LocationResolver for NoLocation {
        async fn resolve(&self, _session: &ConnectSession) -> Result<Option<String>, AppError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_success_provisions_one_site() {
        let store = seeded_store("u1").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        let receipt = workflow.handle_callback(&token(), "success").await.unwrap();

        assert_eq!(receipt.status, ConnectStatus::Success);
        assert!(receipt.changed);

        let session = store.find_session(&token()).await.unwrap().unwrap();
        assert_eq!(session.status, ConnectStatus::Success);

        let sites = store.sites().await;
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].site_name, "Home");
        assert_eq!(sites[0].user_id.as_str(), "u1");
        assert_eq!(sites[0].address_id.as_str(), "a1");
        assert_eq!(sites[0].location_id, "a1");
        assert_eq!(receipt.site_id, Some(sites[0].id));
    }

    #[tokio::test]
    async fn test_non_success_statuses_fail_without_site() {
        for reported in ["fail", "cancelled", "SUCCESS"] {
            let store = seeded_store("u1").await;
            let resolver = AddressLocationResolver::new(store.clone());
            let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

            let receipt = workflow.handle_callback(&token(), reported).await.unwrap();

            assert_eq!(receipt.status, ConnectStatus::Fail, "reported {reported:?}");
            assert!(receipt.site_id.is_none());
            assert!(store.sites().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found_and_writes_nothing() {
        let store = seeded_store("u1").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);
        let writes = store.write_count().await;

        let err = workflow
            .handle_callback(&ConnectToken::parse("missing").unwrap(), "success")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.write_count().await, writes);
    }

    #[tokio::test]
    async fn test_repeated_success_creates_single_site() {
        let store = seeded_store("u1").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        workflow.handle_callback(&token(), "success").await.unwrap();
        let second = workflow.handle_callback(&token(), "success").await.unwrap();

        assert!(!second.changed);
        assert_eq!(second.status, ConnectStatus::Success);
        assert_eq!(store.sites().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_after_success_is_ignored() {
        let store = seeded_store("u1").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        workflow.handle_callback(&token(), "success").await.unwrap();
        let receipt = workflow.handle_callback(&token(), "fail").await.unwrap();

        assert!(!receipt.changed);
        let session = store.find_session(&token()).await.unwrap().unwrap();
        assert_eq!(session.status, ConnectStatus::Success);
    }

    #[tokio::test]
    async fn test_concurrent_callbacks_create_single_site() {
        let store = seeded_store("u1").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        let t = token();
        let (a, b) = tokio::join!(
            workflow.handle_callback(&t, "success"),
            workflow.handle_callback(&t, "success"),
        );

        let changed = [a.unwrap().changed, b.unwrap().changed];
        assert_eq!(changed.iter().filter(|c| **c).count(), 1);
        assert_eq!(store.sites().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dependent_create_failure_keeps_session_pending() {
        // Session references a user the identity layer does not know.
        let store = seeded_store("ghost").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        let err = workflow.handle_callback(&token(), "success").await.unwrap_err();

        assert!(matches!(err, AppError::DependentCreate(_)));
        let session = store.find_session(&token()).await.unwrap().unwrap();
        assert_eq!(session.status, ConnectStatus::Pending);
        assert!(store.sites().await.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_location_keeps_session_pending() {
        let store = seeded_store("u1").await;
        let workflow = ConnectWorkflow::new(store.as_ref(), &NoLocation);

        let err = workflow.handle_callback(&token(), "success").await.unwrap_err();

        assert!(matches!(err, AppError::LocationUnresolved(_)));
        let session = store.find_session(&token()).await.unwrap().unwrap();
        assert_eq!(session.status, ConnectStatus::Pending);
    }

    #[tokio::test]
    async fn test_unresolved_location_does_not_block_failure() {
        let store = seeded_store("u1").await;
        let workflow = ConnectWorkflow::new(store.as_ref(), &NoLocation);

        let receipt = workflow.handle_callback(&token(), "fail").await.unwrap();
        assert_eq!(receipt.status, ConnectStatus::Fail);
    }

    #[tokio::test]
    async fn test_start_requires_cached_address() {
        let store = seeded_store("u1").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        let err = workflow
            .start(StartSession {
                user_id: UserId::new("u1"),
                email: None,
                address_id: AddressId::new("not-cached"),
                site_name: "Office".to_owned(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_start_creates_pending_session_with_trimmed_name() {
        let store = seeded_store("u1").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        let session = workflow
            .start(StartSession {
                user_id: UserId::new("u1"),
                email: None,
                address_id: AddressId::new("a1"),
                site_name: "  Office  ".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(session.status, ConnectStatus::Pending);
        assert_eq!(session.site_name, "Office");
        assert_ne!(session.token, token());
    }

    #[tokio::test]
    async fn test_started_session_by_new_user_can_succeed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_address(&address("a1")).await.unwrap();
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        let session = workflow
            .start(StartSession {
                user_id: UserId::new("first-visit"),
                email: Some("first-visit@example.com".to_owned()),
                address_id: AddressId::new("a1"),
                site_name: "Cabin".to_owned(),
            })
            .await
            .unwrap();
        let receipt = workflow
            .handle_callback(&session.token, "success")
            .await
            .unwrap();

        assert_eq!(receipt.status, ConnectStatus::Success);
        let sites = store.sites().await;
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].user_id.as_str(), "first-visit");
    }

    #[tokio::test]
    async fn test_start_rejects_blank_site_name() {
        let store = seeded_store("u1").await;
        let resolver = AddressLocationResolver::new(store.clone());
        let workflow = ConnectWorkflow::new(store.as_ref(), &resolver);

        let err = workflow
            .start(StartSession {
                user_id: UserId::new("u1"),
                email: None,
                address_id: AddressId::new("a1"),
                site_name: "   ".to_owned(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
