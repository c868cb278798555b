use serde::{Deserialize, Serialize};

use tradedesk_core::{PrincipalId, StaffRecordId, TenantId};

use crate::AccountKind;

/// Resolved identity of a signed-in principal.
///
/// This is an authorization boundary object: it states *which tenant* the
/// principal acts within and whether they are the owner or a staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    pub staff_record_id: Option<StaffRecordId>,
    pub kind: AccountKind,
}

impl Identity {
    pub fn owner(principal_id: PrincipalId, tenant_id: TenantId) -> Self {
        Self {
            principal_id,
            tenant_id,
            staff_record_id: None,
            kind: AccountKind::Owner,
        }
    }

    pub fn staff(
        principal_id: PrincipalId,
        tenant_id: TenantId,
        staff_record_id: Option<StaffRecordId>,
    ) -> Self {
        Self {
            principal_id,
            tenant_id,
            staff_record_id,
            kind: AccountKind::Staff,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.kind == AccountKind::Owner
    }

    pub fn is_staff(&self) -> bool {
        self.kind == AccountKind::Staff
    }

    /// Promote to owner (explicit owner flag found on a staff record).
    pub fn promoted_to_owner(self) -> Self {
        Self {
            kind: AccountKind::Owner,
            ..self
        }
    }

    /// Whether this identity is bound to the given staff record in the given tenant.
    pub fn is_staff_record(&self, tenant_id: TenantId, staff_record_id: StaffRecordId) -> bool {
        self.tenant_id == tenant_id && self.staff_record_id == Some(staff_record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_and_staff_are_exclusive() {
        let staff = Identity::staff(PrincipalId::new(), TenantId::new(), None);
        assert!(staff.is_staff() && !staff.is_owner());

        let promoted = staff.promoted_to_owner();
        assert!(promoted.is_owner() && !promoted.is_staff());
    }

    #[test]
    fn staff_record_match_is_tenant_scoped() {
        let tenant = TenantId::new();
        let record = StaffRecordId::new();
        let identity = Identity::staff(PrincipalId::new(), tenant, Some(record));

        assert!(identity.is_staff_record(tenant, record));
        assert!(!identity.is_staff_record(TenantId::new(), record));
        assert!(!identity.is_staff_record(tenant, StaffRecordId::new()));
    }
}
