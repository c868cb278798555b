//! Permission mutation service.
//!
//! Writes go to the backing store only. The cache is refreshed by re-running
//! resolution for every principal bound to the edited staff record, so readers
//! only ever observe server-confirmed state.

use thiserror::Error;
use tracing::{info, warn};

use tradedesk_auth::{normalize_module_key, Action, ModuleKey, PermissionMatrix, RawMatrix};
use tradedesk_core::{DomainError, StaffRecordId, TenantId};

use crate::bouncer::Bouncer;
use crate::store::{AccountStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("failed to persist permissions: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a successful edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionEdit {
    /// The matrix as persisted (normalized, canonical and alias keys both set).
    pub matrix: PermissionMatrix,
    /// Principals re-resolved after the write.
    pub refreshed: usize,
}

pub struct PermissionMutationService<S> {
    bouncer: Bouncer<S>,
}

impl<S: AccountStore + 'static> PermissionMutationService<S> {
    pub fn new(bouncer: Bouncer<S>) -> Self {
        Self { bouncer }
    }

    /// Validate, normalize and upsert a staff member's matrix, then force
    /// re-resolution of every session bound to that staff record.
    ///
    /// A staff record with no account or permission row in `tenant_id` is
    /// reported as not found. Nothing reaches the cache if the write fails.
    pub async fn submit_permission_edit(
        &self,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
        edit: &RawMatrix,
    ) -> Result<PermissionEdit, MutationError> {
        validate_permission_edit(edit)?;

        let store = self.bouncer.store();
        if !store.staff_record_in_tenant(tenant_id, staff_record_id).await? {
            warn!(%tenant_id, %staff_record_id, "permission edit for staff record outside tenant");
            return Err(DomainError::not_found().into());
        }

        let matrix = PermissionMatrix::normalize_and_merge(edit);
        store
            .upsert_staff_permissions(tenant_id, staff_record_id, matrix.to_raw())
            .await?;

        let refreshed = self.bouncer.refresh_staff(tenant_id, staff_record_id).await;
        info!(%tenant_id, %staff_record_id, refreshed, "staff permissions updated");

        Ok(PermissionEdit { matrix, refreshed })
    }
}

/// Reject edits naming modules or actions outside the schema.
///
/// Values themselves are coerced during normalization, not validated.
pub fn validate_permission_edit(edit: &RawMatrix) -> Result<(), DomainError> {
    for (raw_key, actions) in edit {
        let module = match normalize_module_key(raw_key) {
            ModuleKey::Known(m) => m,
            ModuleKey::Unknown(_) => {
                return Err(DomainError::validation(format!("unknown module '{raw_key}'")));
            }
        };

        let Some(actions) = actions.as_object() else {
            return Err(DomainError::validation(format!(
                "permissions for '{module}' must be an object of actions"
            )));
        };

        if let Some(name) = actions.keys().find(|name| Action::parse(name).is_none()) {
            return Err(DomainError::validation(format!(
                "unknown action '{name}' for module '{module}'"
            )));
        }
    }
    Ok(())
}
