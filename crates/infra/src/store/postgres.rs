//! Postgres-backed account store.
//!
//! Tables are created by `migrations/0001_accounts_and_staff_permissions.sql`.
//! Every staff lookup is a single indexed query; tier ordering is the
//! resolver's concern, not the store's.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use tradedesk_auth::RawMatrix;
use tradedesk_core::{AccountId, PrincipalId, StaffRecordId, TenantId};

use super::{AccountRow, AccountStore, StaffLookup, StaffPermissionRow, StoreError};

/// Postgres account store.
///
/// Uses the SQLx connection pool, which is thread-safe (Arc + Send + Sync).
pub struct PostgresAccountStore {
    pool: Arc<PgPool>,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and apply the bundled schema migration.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::raw_sql(include_str!("../../migrations/0001_accounts_and_staff_permissions.sql"))
            .execute(&pool)
            .await?;
        Ok(Self::new(pool))
    }
}

fn account_from_row(row: &PgRow) -> Result<AccountRow, StoreError> {
    Ok(AccountRow {
        account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
        principal_id: PrincipalId::from_uuid(row.try_get::<Uuid, _>("principal_id")?),
        tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
        owner_flag: row.try_get::<bool, _>("is_owner")?,
        staff_flag: row.try_get::<bool, _>("is_staff")?,
        staff_record_id: row
            .try_get::<Option<Uuid>, _>("staff_record_id")?
            .map(StaffRecordId::from_uuid),
        email: row.try_get::<Option<String>, _>("email")?,
    })
}

fn staff_from_row(row: &PgRow) -> Result<StaffPermissionRow, StoreError> {
    // Payload is returned as stored; a non-object payload reads as "no grants".
    let permissions = match row.try_get::<JsonValue, _>("permissions")? {
        JsonValue::Object(map) => map,
        _ => RawMatrix::new(),
    };

    Ok(StaffPermissionRow {
        tenant_id: row.try_get::<Option<Uuid>, _>("tenant_id")?.map(TenantId::from_uuid),
        staff_record_id: row
            .try_get::<Option<Uuid>, _>("staff_record_id")?
            .map(StaffRecordId::from_uuid),
        email: row.try_get::<Option<String>, _>("email")?,
        owner_flag: row.try_get::<Option<bool>, _>("is_owner")?.unwrap_or(false),
        permissions,
    })
}

#[async_trait::async_trait]
impl AccountStore for PostgresAccountStore {
    #[instrument(
        skip(self),
        fields(operation = "find_account", principal_id = %principal_id.as_uuid()),
        err
    )]
    async fn find_account(&self, principal_id: PrincipalId) -> Result<Option<AccountRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT account_id, principal_id, tenant_id, is_owner, is_staff, staff_record_id, email
            FROM accounts
            WHERE principal_id = $1
            "#,
        )
        .bind(principal_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(
        skip(self, lookup),
        fields(operation = "find_staff_permissions", tier = ?lookup.tier()),
        err
    )]
    async fn find_staff_permissions(
        &self,
        lookup: &StaffLookup,
    ) -> Result<Option<StaffPermissionRow>, StoreError> {
        let query = match lookup {
            StaffLookup::ByTenantAndStaffId {
                tenant_id,
                staff_record_id,
            } => sqlx::query(
                r#"
                SELECT tenant_id, staff_record_id, email, is_owner, permissions
                FROM staff_permissions
                WHERE tenant_id = $1 AND staff_record_id = $2
                LIMIT 1
                "#,
            )
            .bind(*tenant_id.as_uuid())
            .bind(*staff_record_id.as_uuid()),
            StaffLookup::ByTenantAndEmail { tenant_id, email } => sqlx::query(
                r#"
                SELECT tenant_id, staff_record_id, email, is_owner, permissions
                FROM staff_permissions
                WHERE tenant_id = $1 AND lower(email) = lower($2)
                ORDER BY updated_at DESC
                LIMIT 1
                "#,
            )
            .bind(*tenant_id.as_uuid())
            .bind(email.trim().to_string()),
            StaffLookup::ByStaffId { staff_record_id } => sqlx::query(
                r#"
                SELECT tenant_id, staff_record_id, email, is_owner, permissions
                FROM staff_permissions
                WHERE staff_record_id = $1 AND tenant_id IS NULL
                ORDER BY updated_at DESC
                LIMIT 1
                "#,
            )
            .bind(*staff_record_id.as_uuid()),
        };

        let row = query.fetch_optional(&*self.pool).await?;
        row.as_ref().map(staff_from_row).transpose()
    }

    #[instrument(
        skip(self),
        fields(
            operation = "staff_record_in_tenant",
            tenant_id = %tenant_id.as_uuid(),
            staff_record_id = %staff_record_id.as_uuid()
        ),
        err
    )]
    async fn staff_record_in_tenant(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM accounts WHERE tenant_id = $1 AND staff_record_id = $2
            ) OR EXISTS(
                SELECT 1 FROM staff_permissions WHERE tenant_id = $1 AND staff_record_id = $2
            )
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(staff_record_id.as_uuid())
        .fetch_one(&*self.pool)
        .await?;

        Ok(exists)
    }

    #[instrument(
        skip(self, permissions),
        fields(
            operation = "upsert_staff_permissions",
            tenant_id = %tenant_id.as_uuid(),
            staff_record_id = %staff_record_id.as_uuid()
        ),
        err
    )]
    async fn upsert_staff_permissions(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
        permissions: RawMatrix,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO staff_permissions (tenant_id, staff_record_id, permissions)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, staff_record_id)
            DO UPDATE SET
                permissions = EXCLUDED.permissions,
                updated_at = NOW()
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(staff_record_id.as_uuid())
        .bind(sqlx::types::Json(JsonValue::Object(permissions)))
        .execute(&*self.pool)
        .await?;

        Ok(())
    }
}
