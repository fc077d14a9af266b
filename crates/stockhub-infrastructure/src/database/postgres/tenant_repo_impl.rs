// ============================================================================
// StockHub Infrastructure - PostgreSQL Tenant Repository
// File: crates/stockhub-infrastructure/src/database/postgres/tenant_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{error, info, warn};
use uuid::Uuid;

use stockhub_core::domain::{SubscriptionTier, Tenant, TenantId};
use stockhub_core::error::DomainError;
use stockhub_core::repositories::TenantRepository;

pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct TenantRow {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub connection_target: String,
    pub company_email: Option<String>,
    pub tier: String,
    pub subscription_expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<String>,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = DomainError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        let id = TenantId::from_uuid(row.id)
            .ok_or_else(|| DomainError::DatabaseError("tenant row with nil id".to_string()))?;
        let tier = row.tier.parse::<SubscriptionTier>().unwrap_or_else(|_| {
            warn!(tenant_id = %row.id, tier = %row.tier, "Unknown tier in registry, treating as free");
            SubscriptionTier::Free
        });

        Ok(Tenant {
            id,
            name: row.name,
            subdomain: row.subdomain,
            connection_target: row.connection_target,
            company_email: row.company_email,
            tier,
            subscription_expires_at: row.subscription_expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
            removed_at: row.removed_at,
            removed_by: row.removed_by,
        })
    }
}

const TENANT_COLUMNS: &str = r#"
    id, name, subdomain, connection_target, company_email,
    tier, subscription_expires_at, is_active,
    created_at, created_by, modified_at, modified_by,
    removed_at, removed_by
"#;

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, DomainError> {
        let sql = format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS);
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error finding tenant by id: {}", e);
                DomainError::DatabaseError(e.to_string())
            })?;

        row.map(Tenant::try_from).transpose()
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, DomainError> {
        let sql = format!(
            "SELECT {} FROM tenants WHERE LOWER(subdomain) = LOWER($1) AND removed_at IS NULL",
            TENANT_COLUMNS
        );
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(subdomain)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error finding tenant by subdomain: {}", e);
                DomainError::DatabaseError(e.to_string())
            })?;

        row.map(Tenant::try_from).transpose()
    }

    async fn subdomain_exists(&self, subdomain: &str) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM tenants WHERE LOWER(subdomain) = LOWER($1))"#,
        )
        .bind(subdomain)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error checking subdomain: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(exists)
    }

    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        info!("Creating tenant: {}", tenant.subdomain);

        let sql = format!(
            r#"
            INSERT INTO tenants ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {cols}
            "#,
            cols = TENANT_COLUMNS
        );
        let row: TenantRow = sqlx::query_as(&sql)
            .bind(tenant.id.as_uuid())
            .bind(&tenant.name)
            .bind(&tenant.subdomain)
            .bind(&tenant.connection_target)
            .bind(&tenant.company_email)
            .bind(tenant.tier.as_str())
            .bind(tenant.subscription_expires_at)
            .bind(tenant.is_active)
            .bind(tenant.created_at)
            .bind(&tenant.created_by)
            .bind(tenant.modified_at)
            .bind(&tenant.modified_by)
            .bind(tenant.removed_at)
            .bind(&tenant.removed_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error creating tenant: {}", e);
                match &e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        DomainError::SubdomainAlreadyExists(tenant.subdomain.clone())
                    }
                    _ => DomainError::DatabaseError(e.to_string()),
                }
            })?;

        info!("Tenant created successfully: {}", row.id);
        row.try_into()
    }

    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        let sql = format!(
            r#"
            UPDATE tenants
            SET
                name = $2,
                company_email = $3,
                tier = $4,
                subscription_expires_at = $5,
                is_active = $6,
                modified_at = $7,
                modified_by = $8,
                removed_at = $9,
                removed_by = $10
            WHERE id = $1
            RETURNING {}
            "#,
            TENANT_COLUMNS
        );
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(tenant.id.as_uuid())
            .bind(&tenant.name)
            .bind(&tenant.company_email)
            .bind(tenant.tier.as_str())
            .bind(tenant.subscription_expires_at)
            .bind(tenant.is_active)
            .bind(tenant.modified_at)
            .bind(&tenant.modified_by)
            .bind(tenant.removed_at)
            .bind(&tenant.removed_by)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error updating tenant: {}", e);
                DomainError::DatabaseError(e.to_string())
            })?;

        row.ok_or(DomainError::TenantNotFound)?.try_into()
    }

    async fn remove(&self, id: TenantId) -> Result<(), DomainError> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error removing tenant: {}", e);
                DomainError::DatabaseError(e.to_string())
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TenantNotFound);
        }
        warn!(tenant_id = %id, "Tenant removed");
        Ok(())
    }
}
