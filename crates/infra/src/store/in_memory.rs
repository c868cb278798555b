use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use tradedesk_auth::RawMatrix;
use tradedesk_core::{PrincipalId, StaffRecordId, TenantId};

use super::{AccountRow, AccountStore, StaffLookup, StaffPermissionRow, StaffTier, StoreError};

/// A recorded store call (for asserting lookup order in tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    FindAccount(PrincipalId),
    FindStaffPermissions(StaffLookup),
    StaffRecordInTenant {
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    },
    UpsertStaffPermissions {
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    },
}

/// Operation that can be made to fail on demand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    FindAccount,
    StaffLookup(StaffTier),
    Upsert,
}

/// In-memory account store for tests/dev.
///
/// Records every call and supports failure injection per operation.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<PrincipalId, AccountRow>>,
    staff_rows: RwLock<Vec<StaffPermissionRow>>,
    calls: Mutex<Vec<StoreCall>>,
    failing: RwLock<HashSet<FailPoint>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&self, row: AccountRow) {
        if let Ok(mut map) = self.accounts.write() {
            map.insert(row.principal_id, row);
        }
    }

    pub fn insert_staff_row(&self, row: StaffPermissionRow) {
        if let Ok(mut rows) = self.staff_rows.write() {
            rows.push(row);
        }
    }

    /// Rows currently stored for a (tenant, staff record) key.
    pub fn staff_rows_for(&self, tenant_id: TenantId, staff_record_id: StaffRecordId) -> Vec<StaffPermissionRow> {
        let lookup = StaffLookup::ByTenantAndStaffId {
            tenant_id,
            staff_record_id,
        };
        match self.staff_rows.read() {
            Ok(rows) => rows.iter().filter(|r| lookup.matches(r)).cloned().collect(),
            Err(_) => vec![],
        }
    }

    pub fn fail(&self, point: FailPoint) {
        if let Ok(mut set) = self.failing.write() {
            set.insert(point);
        }
    }

    pub fn heal(&self, point: FailPoint) {
        if let Ok(mut set) = self.failing.write() {
            set.remove(&point);
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let failing = self
            .failing
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        if failing.contains(&point) {
            return Err(StoreError::Backend(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_account(&self, principal_id: PrincipalId) -> Result<Option<AccountRow>, StoreError> {
        self.record(StoreCall::FindAccount(principal_id));
        self.check(FailPoint::FindAccount)?;

        let map = self
            .accounts
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(map.get(&principal_id).cloned())
    }

    async fn find_staff_permissions(
        &self,
        lookup: &StaffLookup,
    ) -> Result<Option<StaffPermissionRow>, StoreError> {
        self.record(StoreCall::FindStaffPermissions(lookup.clone()));
        self.check(FailPoint::StaffLookup(lookup.tier()))?;

        let rows = self
            .staff_rows
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(rows.iter().find(|r| lookup.matches(r)).cloned())
    }

    async fn staff_record_in_tenant(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    ) -> Result<bool, StoreError> {
        self.record(StoreCall::StaffRecordInTenant {
            tenant_id,
            staff_record_id,
        });

        let accounts = self
            .accounts
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        if accounts
            .values()
            .any(|a| a.tenant_id == tenant_id && a.staff_record_id == Some(staff_record_id))
        {
            return Ok(true);
        }
        drop(accounts);

        let key = StaffLookup::ByTenantAndStaffId {
            tenant_id,
            staff_record_id,
        };
        let rows = self
            .staff_rows
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(rows.iter().any(|r| key.matches(r)))
    }

    async fn upsert_staff_permissions(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
        permissions: RawMatrix,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::UpsertStaffPermissions {
            tenant_id,
            staff_record_id,
        });
        self.check(FailPoint::Upsert)?;

        let key = StaffLookup::ByTenantAndStaffId {
            tenant_id,
            staff_record_id,
        };
        let mut rows = self
            .staff_rows
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        match rows.iter_mut().find(|r| key.matches(r)) {
            Some(row) => row.permissions = permissions,
            None => rows.push(StaffPermissionRow {
                tenant_id: Some(tenant_id),
                staff_record_id: Some(staff_record_id),
                email: None,
                owner_flag: false,
                permissions,
            }),
        }
        Ok(())
    }
}
