use serde::Serialize;

use tradedesk_auth::{AccountKind, Action, ActionSet, BouncerState, Module, PermissionMatrix};
use tradedesk_core::{PrincipalId, StaffRecordId, TenantId};

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    pub staff_record_id: Option<StaffRecordId>,
    pub kind: AccountKind,
    /// Granted pairs as `module.action`.
    pub granted: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CanResponse {
    pub module: String,
    pub action: Action,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct ModuleResponse {
    pub module: Module,
    pub actions: ActionSet,
}

#[derive(Debug, Serialize)]
pub struct PermissionEditResponse {
    pub staff_record_id: StaffRecordId,
    pub permissions: PermissionMatrix,
    pub refreshed: usize,
}

// -------------------------
// Mapping helpers
// -------------------------

pub fn me_response(state: &BouncerState) -> Option<MeResponse> {
    let identity = state.identity()?;
    let granted = if identity.is_owner() {
        Module::ALL
            .into_iter()
            .flat_map(|m| Action::ALL.into_iter().map(move |a| format!("{m}.{a}")))
            .collect()
    } else {
        state
            .permissions()
            .map(|matrix| {
                matrix
                    .granted()
                    .into_iter()
                    .map(|(m, a)| format!("{m}.{a}"))
                    .collect()
            })
            .unwrap_or_default()
    };

    Some(MeResponse {
        principal_id: identity.principal_id,
        tenant_id: identity.tenant_id,
        staff_record_id: identity.staff_record_id,
        kind: identity.kind,
        granted,
    })
}
