//! `PostgreSQL` store.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate
//! builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use siteline_core::{AddressId, ConnectStatus, ConnectToken, UserId};

use super::{Finalization, FinalizeOutcome, Store, StoreError};
use crate::models::{Address, ConnectSession, NewConnectSession, NewSite, Site};

const SESSION_COLUMNS: &str =
    "id, fp_cot, fp_status, user_id, address_id, site_name, created_at, updated_at";

const SITE_COLUMNS: &str =
    "id, site_name, location_id, user_id, address_id, connect_session_id, created_at";

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    latitude: Option<f64>,
    longitude: Option<f64>,
    formatted_address: Option<Vec<String>>,
    thoroughfare: Option<String>,
    building_name: Option<String>,
    sub_building_name: Option<String>,
    sub_building_number: Option<String>,
    building_number: Option<String>,
    line_one: Option<String>,
    line_two: Option<String>,
    line_three: Option<String>,
    line_four: Option<String>,
    postcode: Option<String>,
    locality: Option<String>,
    town_or_city: Option<String>,
    county: Option<String>,
    district: Option<String>,
    country: Option<String>,
    residential: Option<bool>,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(r: AddressRow) -> Self {
        Self {
            id: r.id,
            latitude: r.latitude,
            longitude: r.longitude,
            formatted_address: r.formatted_address,
            thoroughfare: r.thoroughfare,
            building_name: r.building_name,
            sub_building_name: r.sub_building_name,
            sub_building_number: r.sub_building_number,
            building_number: r.building_number,
            line_one: r.line_one,
            line_two: r.line_two,
            line_three: r.line_three,
            line_four: r.line_four,
            postcode: r.postcode,
            locality: r.locality,
            town_or_city: r.town_or_city,
            county: r.county,
            district: r.district,
            country: r.country,
            residential: r.residential,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    fp_cot: String,
    fp_status: String,
    user_id: UserId,
    address_id: AddressId,
    site_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for ConnectSession {
    type Error = StoreError;

    fn try_from(r: SessionRow) -> Result<Self, Self::Error> {
        let token = ConnectToken::parse(&r.fp_cot).map_err(|e| {
            StoreError::DataCorruption(format!("invalid fp_cot in database: {e}"))
        })?;
        let status = parse_status(&r.fp_status)?;

        Ok(Self {
            id: r.id,
            token,
            status,
            user_id: r.user_id,
            address_id: r.address_id,
            site_name: r.site_name,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SiteRow {
    id: Uuid,
    site_name: String,
    location_id: String,
    user_id: UserId,
    address_id: AddressId,
    connect_session_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<SiteRow> for Site {
    fn from(r: SiteRow) -> Self {
        Self {
            id: r.id,
            site_name: r.site_name,
            location_id: r.location_id,
            user_id: r.user_id,
            address_id: r.address_id,
            connect_session_id: r.connect_session_id,
            created_at: r.created_at,
        }
    }
}

fn parse_status(raw: &str) -> Result<ConnectStatus, StoreError> {
    raw.parse::<ConnectStatus>()
        .map_err(|e| StoreError::DataCorruption(format!("{e} in database")))
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_user(&self, user_id: &UserId, email: Option<&str>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO siteline."user" (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn address_exists(&self, id: &AddressId) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM siteline.address WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn get_address(&self, id: &AddressId) -> Result<Option<Address>, StoreError> {
        let row: Option<AddressRow> = sqlx::query_as(
            r"
            SELECT id, latitude, longitude, formatted_address, thoroughfare,
                   building_name, sub_building_name, sub_building_number, building_number,
                   line_one, line_two, line_three, line_four,
                   postcode, locality, town_or_city, county, district, country,
                   residential, created_at
            FROM siteline.address
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    #[instrument(skip(self, address), fields(address_id = %address.id))]
    async fn insert_address(&self, address: &Address) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO siteline.address (
                id, latitude, longitude, formatted_address, thoroughfare,
                building_name, sub_building_name, sub_building_number, building_number,
                line_one, line_two, line_three, line_four,
                postcode, locality, town_or_city, county, district, country,
                residential, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(&address.id)
        .bind(address.latitude)
        .bind(address.longitude)
        .bind(&address.formatted_address)
        .bind(&address.thoroughfare)
        .bind(&address.building_name)
        .bind(&address.sub_building_name)
        .bind(&address.sub_building_number)
        .bind(&address.building_number)
        .bind(&address.line_one)
        .bind(&address.line_two)
        .bind(&address.line_three)
        .bind(&address.line_four)
        .bind(&address.postcode)
        .bind(&address.locality)
        .bind(&address.town_or_city)
        .bind(&address.county)
        .bind(&address.district)
        .bind(&address.country)
        .bind(address.residential)
        .bind(address.created_at)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!("Address inserted concurrently, keeping existing record");
        }
        Ok(inserted)
    }

    async fn create_session(
        &self,
        new: &NewConnectSession,
    ) -> Result<ConnectSession, StoreError> {
        let row: SessionRow = sqlx::query_as(&format!(
            r"
            INSERT INTO siteline.connect_session (fp_cot, user_id, address_id, site_name)
            VALUES ($1, $2, $3, $4)
            RETURNING {SESSION_COLUMNS}
            "
        ))
        .bind(new.token.as_str())
        .bind(&new.user_id)
        .bind(&new.address_id)
        .bind(&new.site_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict("fp_cot already exists".to_owned());
            }
            StoreError::Database(e)
        })?;

        row.try_into()
    }

    async fn find_session(
        &self,
        token: &ConnectToken,
    ) -> Result<Option<ConnectSession>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM siteline.connect_session WHERE fp_cot = $1"
        ))
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConnectSession::try_from).transpose()
    }

    #[instrument(skip(self, token, finalization), fields(status = %finalization.status()))]
    async fn finalize_session(
        &self,
        token: &ConnectToken,
        finalization: Finalization,
    ) -> Result<FinalizeOutcome, StoreError> {
        let status = finalization.status();
        let mut tx = self.pool.begin().await?;

        // The status guard makes this the serialization point: a concurrent
        // callback for the same token blocks on the row lock and then
        // matches zero rows.
        let updated: Option<(Uuid,)> = sqlx::query_as(
            r"
            UPDATE siteline.connect_session
            SET fp_status = $2, updated_at = NOW()
            WHERE fp_cot = $1 AND fp_status = 'pending'
            RETURNING id
            ",
        )
        .bind(token.as_str())
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            let current: Option<(String,)> =
                sqlx::query_as("SELECT fp_status FROM siteline.connect_session WHERE fp_cot = $1")
                    .bind(token.as_str())
                    .fetch_optional(&self.pool)
                    .await?;
            let (current,) = current.ok_or(StoreError::NotFound)?;
            return Ok(FinalizeOutcome::NotPending(parse_status(&current)?));
        }

        let site = match finalization {
            Finalization::Failed => None,
            Finalization::Succeeded(new_site) => {
                match insert_site(&mut tx, &new_site).await {
                    Ok(site) => Some(site),
                    Err(e) => {
                        tx.rollback().await?;
                        return Err(StoreError::DependentCreate(e.to_string()));
                    }
                }
            }
        };

        tx.commit().await?;

        Ok(FinalizeOutcome::Transitioned { status, site })
    }

    async fn list_sites_for_user(&self, user_id: &UserId) -> Result<Vec<Site>, StoreError> {
        let rows: Vec<SiteRow> = sqlx::query_as(&format!(
            r"
            SELECT {SITE_COLUMNS}
            FROM siteline.site
            WHERE user_id = $1
            ORDER BY created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Site::from).collect())
    }
}

async fn insert_site(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    new_site: &NewSite,
) -> Result<Site, sqlx::Error> {
    let row: SiteRow = sqlx::query_as(&format!(
        r"
        INSERT INTO siteline.site (site_name, location_id, user_id, address_id, connect_session_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {SITE_COLUMNS}
        "
    ))
    .bind(&new_site.site_name)
    .bind(&new_site.location_id)
    .bind(&new_site.user_id)
    .bind(&new_site.address_id)
    .bind(new_site.connect_session_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row.into())
}

/// Exercised against a real database: `DATABASE_URL` must point at a
/// `PostgreSQL` server where `sqlx::test` can create scratch databases.
///
/// ```bash
/// cargo test -p siteline-server -- --ignored
/// ```
#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geocoding::ProviderAddress;

    fn token() -> ConnectToken {
        ConnectToken::parse("abc123").unwrap()
    }

    fn new_site(session: &ConnectSession) -> NewSite {
        NewSite {
            site_name: session.site_name.clone(),
            location_id: session.address_id.as_str().to_owned(),
            user_id: session.user_id.clone(),
            address_id: session.address_id.clone(),
            connect_session_id: session.id,
        }
    }

    /// Address `a1`, user `u1` and a pending session `abc123` owned by
    /// `owner`.
    async fn seeded(pool: PgPool, owner: &str) -> (PgStore, ConnectSession) {
        let store = PgStore::new(pool);
        let address = ProviderAddress::default().into_address(AddressId::new("a1"), Utc::now());
        assert!(store.insert_address(&address).await.unwrap());
        store
            .ensure_user(&UserId::new("u1"), Some("u1@example.com"))
            .await
            .unwrap();
        let session = store
            .create_session(&NewConnectSession {
                token: token(),
                user_id: UserId::new(owner),
                address_id: AddressId::new("a1"),
                site_name: "Home".to_owned(),
            })
            .await
            .unwrap();
        (store, session)
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_success_commits_status_and_site(pool: PgPool) {
        let (store, session) = seeded(pool, "u1").await;

        let outcome = store
            .finalize_session(&token(), Finalization::Succeeded(new_site(&session)))
            .await
            .unwrap();

        let FinalizeOutcome::Transitioned { status, site } = outcome else {
            panic!("expected transition");
        };
        assert_eq!(status, ConnectStatus::Success);
        let site = site.unwrap();
        assert_eq!(site.connect_session_id, session.id);

        let reloaded = store.find_session(&token()).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ConnectStatus::Success);
        let sites = store.list_sites_for_user(&UserId::new("u1")).await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].id, site.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_failed_site_insert_rolls_back_transition(pool: PgPool) {
        let (store, session) = seeded(pool, "ghost").await;

        let err = store
            .finalize_session(&token(), Finalization::Succeeded(new_site(&session)))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::DependentCreate(_)));
        let reloaded = store.find_session(&token()).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ConnectStatus::Pending);
        let sites = store
            .list_sites_for_user(&UserId::new("ghost"))
            .await
            .unwrap();
        assert!(sites.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_repeated_finalize_reports_not_pending(pool: PgPool) {
        let (store, session) = seeded(pool, "u1").await;

        store
            .finalize_session(&token(), Finalization::Succeeded(new_site(&session)))
            .await
            .unwrap();
        let outcome = store
            .finalize_session(&token(), Finalization::Failed)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            FinalizeOutcome::NotPending(ConnectStatus::Success)
        ));
        let reloaded = store.find_session(&token()).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ConnectStatus::Success);
        let sites = store.list_sites_for_user(&UserId::new("u1")).await.unwrap();
        assert_eq!(sites.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_finalize_unknown_token_is_not_found(pool: PgPool) {
        let (store, _) = seeded(pool, "u1").await;

        let err = store
            .finalize_session(&ConnectToken::parse("missing").unwrap(), Finalization::Failed)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_duplicate_inserts_are_absorbed(pool: PgPool) {
        let (store, _) = seeded(pool, "u1").await;

        let address = ProviderAddress::default().into_address(AddressId::new("a1"), Utc::now());
        assert!(!store.insert_address(&address).await.unwrap());
        store.ensure_user(&UserId::new("u1"), None).await.unwrap();

        let err = store
            .create_session(&NewConnectSession {
                token: token(),
                user_id: UserId::new("u1"),
                address_id: AddressId::new("a1"),
                site_name: "Again".to_owned(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
