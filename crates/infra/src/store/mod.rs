//! Account & permission store boundary.
//!
//! The store returns rows exactly as persisted. It imposes no normalization on
//! permission payloads; that is the resolver's job.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradedesk_auth::RawMatrix;
use tradedesk_core::{AccountId, PrincipalId, StaffRecordId, TenantId};

pub use in_memory::{FailPoint, InMemoryAccountStore, StoreCall};
pub use postgres::PostgresAccountStore;

/// Application-level account row for a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account_id: AccountId,
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    pub owner_flag: bool,
    pub staff_flag: bool,
    /// Stable staff id, absent on accounts created before staff ids existed.
    pub staff_record_id: Option<StaffRecordId>,
    pub email: Option<String>,
}

/// Staff permission row. Legacy rows may lack a tenant, a staff id or an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffPermissionRow {
    pub tenant_id: Option<TenantId>,
    pub staff_record_id: Option<StaffRecordId>,
    pub email: Option<String>,
    /// Explicit owner flag carried on the staff record.
    pub owner_flag: bool,
    pub permissions: RawMatrix,
}

/// Lookup tier, in the order the resolver tries them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum StaffTier {
    /// (tenant, staff record id)
    A,
    /// (tenant, staff email)
    B,
    /// staff record id alone, legacy rows without a tenant
    C,
}

impl core::fmt::Display for StaffTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StaffTier::A => f.write_str("A"),
            StaffTier::B => f.write_str("B"),
            StaffTier::C => f.write_str("C"),
        }
    }
}

/// One staff permission lookup shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StaffLookup {
    ByTenantAndStaffId {
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    },
    ByTenantAndEmail {
        tenant_id: TenantId,
        email: String,
    },
    ByStaffId {
        staff_record_id: StaffRecordId,
    },
}

impl StaffLookup {
    pub fn tier(&self) -> StaffTier {
        match self {
            StaffLookup::ByTenantAndStaffId { .. } => StaffTier::A,
            StaffLookup::ByTenantAndEmail { .. } => StaffTier::B,
            StaffLookup::ByStaffId { .. } => StaffTier::C,
        }
    }

    pub fn matches(&self, row: &StaffPermissionRow) -> bool {
        match self {
            StaffLookup::ByTenantAndStaffId {
                tenant_id,
                staff_record_id,
            } => row.tenant_id == Some(*tenant_id) && row.staff_record_id == Some(*staff_record_id),
            StaffLookup::ByTenantAndEmail { tenant_id, email } => {
                row.tenant_id == Some(*tenant_id)
                    && row
                        .email
                        .as_deref()
                        .is_some_and(|e| e.trim().eq_ignore_ascii_case(email.trim()))
            }
            StaffLookup::ByStaffId { staff_record_id } => {
                row.tenant_id.is_none() && row.staff_record_id == Some(*staff_record_id)
            }
        }
    }
}

/// Store operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("failed to decode row: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Decode(err.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Async data-access collaborator consumed by the resolver and mutation service.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, principal_id: PrincipalId) -> Result<Option<AccountRow>, StoreError>;

    async fn find_staff_permissions(
        &self,
        lookup: &StaffLookup,
    ) -> Result<Option<StaffPermissionRow>, StoreError>;

    /// Whether the staff record is known within the tenant, either through an
    /// account or a tenant-scoped permission row.
    async fn staff_record_in_tenant(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    ) -> Result<bool, StoreError>;

    /// Upsert keyed by (tenant, staff record id): a second write overwrites.
    async fn upsert_staff_permissions(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
        permissions: RawMatrix,
    ) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    async fn find_account(&self, principal_id: PrincipalId) -> Result<Option<AccountRow>, StoreError> {
        (**self).find_account(principal_id).await
    }

    async fn find_staff_permissions(
        &self,
        lookup: &StaffLookup,
    ) -> Result<Option<StaffPermissionRow>, StoreError> {
        (**self).find_staff_permissions(lookup).await
    }

    async fn staff_record_in_tenant(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    ) -> Result<bool, StoreError> {
        (**self).staff_record_in_tenant(tenant_id, staff_record_id).await
    }

    async fn upsert_staff_permissions(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
        permissions: RawMatrix,
    ) -> Result<(), StoreError> {
        (**self)
            .upsert_staff_permissions(tenant_id, staff_record_id, permissions)
            .await
    }
}
