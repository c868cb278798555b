use serde::Serialize;
use thiserror::Error;

use tradedesk_core::{PrincipalId, TenantId};

use crate::{normalize_module_key, AccountKind, Action, BouncerState, ModuleKey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("resolution still pending")]
    Pending,

    #[error("no active session")]
    Unauthenticated,

    #[error("identity resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error("forbidden: missing permission '{module}.{action}'")]
    Forbidden { module: String, action: Action },
}

/// Capability check over a published [`BouncerState`].
///
/// Every check goes through [`Capabilities::authorize`], which holds the one
/// owner-bypass branch. A state that is still loading denies unless the view
/// was built with [`Capabilities::optimistic`], in which case the hydrated
/// (possibly stale) identity and matrix are consulted.
#[derive(Debug, Copy, Clone)]
pub struct Capabilities<'a> {
    state: &'a BouncerState,
    optimistic: bool,
}

impl<'a> Capabilities<'a> {
    pub fn strict(state: &'a BouncerState) -> Self {
        Self {
            state,
            optimistic: false,
        }
    }

    pub fn optimistic(state: &'a BouncerState) -> Self {
        Self {
            state,
            optimistic: true,
        }
    }

    pub fn state(&self) -> &'a BouncerState {
        self.state
    }

    pub fn can(&self, module: &str, action: Action) -> bool {
        self.authorize(module, action).is_ok()
    }

    /// Authorize a (module, action) pair.
    ///
    /// - No IO
    /// - No panics
    /// - Owners pass unconditionally; everything else is default-deny.
    pub fn authorize(&self, module: &str, action: Action) -> Result<(), AuthzError> {
        let state = self.state;

        // Optimistic checks only help once a hydrated snapshot exists.
        if state.is_loading() && (!self.optimistic || state.identity().is_none()) {
            return Err(AuthzError::Pending);
        }
        if !state.is_authenticated() {
            return Err(AuthzError::Unauthenticated);
        }
        if let Some(reason) = state.error() {
            return Err(AuthzError::ResolutionFailed(reason.to_string()));
        }

        let (Some(identity), Some(matrix)) = (state.identity(), state.permissions()) else {
            return Err(AuthzError::ResolutionFailed("identity missing".to_string()));
        };

        if identity.is_owner() {
            return Ok(());
        }

        match normalize_module_key(module) {
            ModuleKey::Known(m) if matrix.allows(m, action) => Ok(()),
            ModuleKey::Known(m) => Err(AuthzError::Forbidden {
                module: m.as_str().to_string(),
                action,
            }),
            ModuleKey::Unknown(raw) => Err(AuthzError::UnknownModule(raw)),
        }
    }

    /// Like [`Capabilities::authorize`], additionally requiring the principal to
    /// be acting within `tenant_id`.
    pub fn authorize_in_tenant(
        &self,
        tenant_id: TenantId,
        module: &str,
        action: Action,
    ) -> Result<(), AuthzError> {
        self.authorize(module, action)?;
        match self.state.identity() {
            Some(identity) if identity.tenant_id == tenant_id => Ok(()),
            _ => Err(AuthzError::TenantMismatch),
        }
    }
}

impl BouncerState {
    /// Strict capability check (denies while loading).
    pub fn can(&self, module: &str, action: Action) -> bool {
        Capabilities::strict(self).can(module, action)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of a capability decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    /// Normalized module key that was checked.
    pub module: String,
    pub action: Action,
    pub granted: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
    pub principal: Option<PrincipalState>,
    pub denial: Option<DenialKind>,
}

/// Snapshot of the principal the decision was made for.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    pub kind: AccountKind,
    /// Granted pairs as `module.action`, sorted.
    pub granted: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Pending,
    Unauthenticated,
    ResolutionFailed,
    TenantMismatch,
    UnknownModule,
    MissingPermission,
}

impl From<&AuthzError> for DenialKind {
    fn from(err: &AuthzError) -> Self {
        match err {
            AuthzError::Pending => DenialKind::Pending,
            AuthzError::Unauthenticated => DenialKind::Unauthenticated,
            AuthzError::ResolutionFailed(_) => DenialKind::ResolutionFailed,
            AuthzError::TenantMismatch => DenialKind::TenantMismatch,
            AuthzError::UnknownModule(_) => DenialKind::UnknownModule,
            AuthzError::Forbidden { .. } => DenialKind::MissingPermission,
        }
    }
}

/// Explain why a capability check was (or would be) granted or denied.
pub fn explain(caps: &Capabilities<'_>, module: &str, action: Action) -> AuthorizationExplanation {
    let normalized = normalize_module_key(module).as_str().to_string();

    let principal = match (caps.state().identity(), caps.state().permissions()) {
        (Some(identity), Some(matrix)) => Some(PrincipalState {
            principal_id: identity.principal_id,
            tenant_id: identity.tenant_id,
            kind: identity.kind,
            granted: matrix
                .granted()
                .into_iter()
                .map(|(m, a)| format!("{m}.{a}"))
                .collect(),
        }),
        _ => None,
    };

    match caps.authorize(module, action) {
        Ok(()) => {
            let reason = if principal.as_ref().is_some_and(|p| p.kind == AccountKind::Owner) {
                "Principal is the tenant owner (owner bypass)".to_string()
            } else {
                format!("Principal holds '{normalized}.{action}'")
            };
            AuthorizationExplanation {
                module: normalized,
                action,
                granted: true,
                reason,
                principal,
                denial: None,
            }
        }
        Err(err) => AuthorizationExplanation {
            module: normalized,
            action,
            granted: false,
            reason: err.to_string(),
            principal,
            denial: Some(DenialKind::from(&err)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Identity, Module, PermissionMatrix};
    use serde_json::json;

    fn staff_state(grants: serde_json::Value) -> BouncerState {
        let raw = grants.as_object().cloned().unwrap_or_default();
        BouncerState::resolved(
            Identity::staff(PrincipalId::new(), TenantId::new(), None),
            PermissionMatrix::normalize_and_merge(&raw),
        )
    }

    #[test]
    fn owner_bypasses_matrix() {
        let state = BouncerState::resolved(
            Identity::owner(PrincipalId::new(), TenantId::new()),
            PermissionMatrix::empty(),
        );
        for module in Module::ALL {
            for action in Action::ALL {
                assert!(state.can(module.as_str(), action));
            }
        }
        assert!(state.can("not-a-module", Action::Delete));
    }

    #[test]
    fn staff_with_empty_matrix_is_denied_everything() {
        let state = staff_state(json!({}));
        for module in Module::ALL {
            for key in module.storage_keys() {
                for action in Action::ALL {
                    assert!(!state.can(key, action));
                }
            }
        }
    }

    #[test]
    fn staff_checks_normalize_module() {
        let state = staff_state(json!({ "job cards": { "view": true } }));
        assert!(state.can("jobcards", Action::View));
        assert!(state.can("Job Cards", Action::View));
        assert!(!state.can("jobcards", Action::Create));
    }

    #[test]
    fn unknown_module_is_inert_for_staff() {
        let state = staff_state(json!({ "garage": { "view": true } }));
        let err = Capabilities::strict(&state)
            .authorize("garage", Action::View)
            .unwrap_err();
        assert_eq!(err, AuthzError::UnknownModule("garage".to_string()));
    }

    #[test]
    fn failed_resolution_denies() {
        let state = BouncerState::failed("not found");
        assert!(!state.can("orders", Action::View));
        let err = Capabilities::strict(&state)
            .authorize("orders", Action::View)
            .unwrap_err();
        assert!(matches!(err, AuthzError::ResolutionFailed(_)));
    }

    #[test]
    fn loading_denies_unless_optimistic() {
        let cached = BouncerState::resolved(
            Identity::owner(PrincipalId::new(), TenantId::new()),
            PermissionMatrix::empty(),
        );
        let hydrating = cached.hydrating();

        assert!(!hydrating.can("orders", Action::View));
        assert!(Capabilities::optimistic(&hydrating).can("orders", Action::View));

        let fresh = BouncerState::loading();
        for caps in [Capabilities::strict(&fresh), Capabilities::optimistic(&fresh)] {
            assert_eq!(caps.authorize("orders", Action::View), Err(AuthzError::Pending));
        }
        assert_eq!(
            explain(&Capabilities::optimistic(&fresh), "orders", Action::View).denial,
            Some(DenialKind::Pending)
        );
    }

    #[test]
    fn tenant_scoped_authorization() {
        let tenant = TenantId::new();
        let state = BouncerState::resolved(
            Identity::owner(PrincipalId::new(), tenant),
            PermissionMatrix::empty(),
        );
        let caps = Capabilities::strict(&state);

        assert!(caps.authorize_in_tenant(tenant, "staff", Action::Edit).is_ok());
        assert_eq!(
            caps.authorize_in_tenant(TenantId::new(), "staff", Action::Edit),
            Err(AuthzError::TenantMismatch)
        );
    }

    #[test]
    fn explanation_reports_missing_permission() {
        let state = staff_state(json!({ "orders": { "view": true } }));
        let caps = Capabilities::strict(&state);

        let denied = explain(&caps, "Orders", Action::Delete);
        assert!(!denied.granted);
        assert_eq!(denied.module, "orders");
        assert_eq!(denied.denial, Some(DenialKind::MissingPermission));
        assert_eq!(
            denied.principal.as_ref().map(|p| p.granted.clone()),
            Some(vec!["orders.view".to_string()])
        );

        let granted = explain(&caps, "orders", Action::View);
        assert!(granted.granted);
        assert!(granted.denial.is_none());
    }
}
