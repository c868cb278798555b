//! Identity resolver ("bouncer"): session → tenant, classification, matrix.
//!
//! Resolution is fail-closed. The only error that surfaces is the account
//! lookup itself, and it surfaces as data in [`BouncerState::error`], never as
//! an `Err`. Staff permission tiers are tried in order and a failing tier
//! reads as a miss.

use tracing::{debug, warn};

use tradedesk_auth::{AccountKind, BouncerState, Identity, PermissionMatrix, RawMatrix, Session};
use tradedesk_core::DomainError;

use crate::store::{AccountRow, AccountStore, StaffLookup, StaffPermissionRow};

pub struct Resolver<S> {
    store: S,
}

impl<S: AccountStore> Resolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one resolution pass.
    #[tracing::instrument(
        name = "resolve",
        skip_all,
        fields(principal_id = ?session.map(|s| s.principal_id))
    )]
    pub async fn resolve(&self, session: Option<&Session>) -> BouncerState {
        let Some(session) = session else {
            return BouncerState::unauthenticated();
        };

        let account = match self.store.find_account(session.principal_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!("no account row for principal");
                return BouncerState::failed(DomainError::not_found().to_string());
            }
            Err(e) => {
                warn!(error = %e, "account lookup failed");
                return BouncerState::failed(format!("account lookup failed: {e}"));
            }
        };

        let mut identity = Identity {
            principal_id: session.principal_id,
            tenant_id: account.tenant_id,
            staff_record_id: account.staff_record_id,
            kind: AccountKind::classify(account.owner_flag, account.staff_flag),
        };

        let mut permissions = RawMatrix::new();
        if identity.is_staff() {
            if let Some(row) = self.find_staff_row(&account, session).await {
                if identity.staff_record_id.is_none() {
                    identity.staff_record_id = row.staff_record_id;
                }
                if row.owner_flag {
                    debug!("staff record carries owner flag; promoting to owner");
                    identity = identity.promoted_to_owner();
                }
                permissions = row.permissions;
            }
        }

        debug!(tenant_id = %identity.tenant_id, kind = %identity.kind, "resolved");
        BouncerState::resolved(identity, PermissionMatrix::normalize_and_merge(&permissions))
    }

    /// Sequential tiered lookup: first hit wins, later tiers are never consulted.
    async fn find_staff_row(&self, account: &AccountRow, session: &Session) -> Option<StaffPermissionRow> {
        for lookup in staff_lookups(account, session) {
            let tier = lookup.tier();
            match self.store.find_staff_permissions(&lookup).await {
                Ok(Some(row)) => {
                    debug!(%tier, "staff permissions found");
                    return Some(row);
                }
                Ok(None) => debug!(%tier, "staff permissions miss"),
                Err(e) => warn!(%tier, error = %e, "staff permission lookup failed; treating as miss"),
            }
        }

        debug!("no staff permission row; using default matrix");
        None
    }
}

/// Lookups in tier order. Tiers whose key is unknown are skipped.
fn staff_lookups(account: &AccountRow, session: &Session) -> Vec<StaffLookup> {
    let email = account
        .email
        .as_deref()
        .or(session.email.as_deref())
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    let mut lookups = Vec::with_capacity(3);
    if let Some(staff_record_id) = account.staff_record_id {
        lookups.push(StaffLookup::ByTenantAndStaffId {
            tenant_id: account.tenant_id,
            staff_record_id,
        });
    }
    if let Some(email) = email {
        lookups.push(StaffLookup::ByTenantAndEmail {
            tenant_id: account.tenant_id,
            email,
        });
    }
    if let Some(staff_record_id) = account.staff_record_id {
        lookups.push(StaffLookup::ByStaffId { staff_record_id });
    }
    lookups
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use tradedesk_auth::{Action, Module};
    use tradedesk_core::{AccountId, PrincipalId, StaffRecordId, TenantId};

    use super::*;
    use crate::store::{FailPoint, InMemoryAccountStore, StaffTier, StoreCall};

    struct Fixture {
        store: Arc<InMemoryAccountStore>,
        resolver: Resolver<Arc<InMemoryAccountStore>>,
        session: Session,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    }

    fn perms(value: serde_json::Value) -> RawMatrix {
        value.as_object().cloned().unwrap_or_default()
    }

    fn staff_fixture() -> Fixture {
        let store = Arc::new(InMemoryAccountStore::new());
        let principal_id = PrincipalId::new();
        let tenant_id = TenantId::new();
        let staff_record_id = StaffRecordId::new();

        store.insert_account(AccountRow {
            account_id: AccountId::new(),
            principal_id,
            tenant_id,
            owner_flag: false,
            staff_flag: true,
            staff_record_id: Some(staff_record_id),
            email: Some("sam@example.com".to_string()),
        });

        Fixture {
            resolver: Resolver::new(Arc::clone(&store)),
            store,
            session: Session::new(principal_id, Some("sam@example.com".to_string())),
            tenant_id,
            staff_record_id,
        }
    }

    fn staff_row(f: &Fixture, tier: StaffTier, grants: serde_json::Value) -> StaffPermissionRow {
        let (tenant_id, staff_record_id, email) = match tier {
            StaffTier::A => (Some(f.tenant_id), Some(f.staff_record_id), None),
            StaffTier::B => (Some(f.tenant_id), None, Some("SAM@example.com".to_string())),
            StaffTier::C => (None, Some(f.staff_record_id), None),
        };
        StaffPermissionRow {
            tenant_id,
            staff_record_id,
            email,
            owner_flag: false,
            permissions: perms(grants),
        }
    }

    fn staff_calls(store: &InMemoryAccountStore) -> Vec<StaffTier> {
        store
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::FindStaffPermissions(lookup) => Some(lookup.tier()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn no_session_is_unauthenticated_without_lookups() {
        let f = staff_fixture();
        let state = f.resolver.resolve(None).await;

        assert_eq!(state, BouncerState::unauthenticated());
        assert!(f.store.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_account_fails_closed() {
        let f = staff_fixture();
        let stranger = Session::new(PrincipalId::new(), None);

        let state = f.resolver.resolve(Some(&stranger)).await;

        assert!(state.is_authenticated() && !state.is_loading());
        assert_eq!(state.error(), Some("not found"));
        assert!(state.identity().is_none());
        assert!(!state.can("orders", Action::View));
    }

    #[tokio::test]
    async fn account_lookup_error_is_reported_not_promoted() {
        let f = staff_fixture();
        f.store.fail(FailPoint::FindAccount);

        let state = f.resolver.resolve(Some(&f.session)).await;

        assert!(state.error().is_some_and(|e| e.contains("account lookup failed")));
        assert!(!state.can("settings", Action::View));
        assert!(staff_calls(&f.store).is_empty());
    }

    #[tokio::test]
    async fn owner_skips_staff_lookups() {
        let store = Arc::new(InMemoryAccountStore::new());
        let principal_id = PrincipalId::new();
        store.insert_account(AccountRow {
            account_id: AccountId::new(),
            principal_id,
            tenant_id: TenantId::new(),
            owner_flag: false,
            staff_flag: false,
            staff_record_id: None,
            email: None,
        });
        let resolver = Resolver::new(Arc::clone(&store));

        let state = resolver.resolve(Some(&Session::new(principal_id, None))).await;

        let identity = state.identity().unwrap();
        assert!(identity.is_owner() && !identity.is_staff());
        assert!(staff_calls(&store).is_empty());
        assert!(state.can("staff", Action::Delete));
    }

    #[tokio::test]
    async fn tier_a_hit_stops_the_search() {
        let f = staff_fixture();
        f.store.insert_staff_row(staff_row(&f, StaffTier::A, json!({ "orders": { "view": true } })));
        f.store.insert_staff_row(staff_row(&f, StaffTier::B, json!({ "orders": { "delete": true } })));

        let state = f.resolver.resolve(Some(&f.session)).await;

        assert_eq!(staff_calls(&f.store), vec![StaffTier::A]);
        assert!(state.can("orders", Action::View));
        assert!(!state.can("orders", Action::Delete));
    }

    #[tokio::test]
    async fn tier_b_wins_over_tier_c_without_consulting_c() {
        let f = staff_fixture();
        f.store.insert_staff_row(staff_row(&f, StaffTier::B, json!({ "invoices": { "view": true } })));
        f.store.insert_staff_row(staff_row(&f, StaffTier::C, json!({ "reports": { "view": true } })));

        let state = f.resolver.resolve(Some(&f.session)).await;

        assert_eq!(staff_calls(&f.store), vec![StaffTier::A, StaffTier::B]);
        assert!(state.can("invoices", Action::View));
        assert!(!state.can("reports", Action::View));
    }

    #[tokio::test]
    async fn tier_c_covers_rows_without_tenant() {
        let f = staff_fixture();
        f.store.insert_staff_row(staff_row(&f, StaffTier::C, json!({ "job cards": { "edit": true } })));

        let state = f.resolver.resolve(Some(&f.session)).await;

        assert_eq!(staff_calls(&f.store), vec![StaffTier::A, StaffTier::B, StaffTier::C]);
        assert!(state.can("jobcards", Action::Edit));
        assert!(state.permissions().unwrap().get("job cards").unwrap().edit);
    }

    #[tokio::test]
    async fn failing_tier_is_treated_as_miss() {
        let f = staff_fixture();
        f.store.insert_staff_row(staff_row(&f, StaffTier::A, json!({ "orders": { "view": true } })));
        f.store.insert_staff_row(staff_row(&f, StaffTier::B, json!({ "expenses": { "view": true } })));
        f.store.fail(FailPoint::StaffLookup(StaffTier::A));

        let state = f.resolver.resolve(Some(&f.session)).await;

        assert!(state.error().is_none());
        assert!(state.can("expenses", Action::View));
        assert!(!state.can("orders", Action::View));
    }

    #[tokio::test]
    async fn all_tiers_missing_yields_default_matrix() {
        let f = staff_fixture();
        f.store.fail(FailPoint::StaffLookup(StaffTier::B));

        let state = f.resolver.resolve(Some(&f.session)).await;

        let identity = state.identity().unwrap();
        assert!(identity.is_staff());
        assert_eq!(state.permissions(), Some(&PermissionMatrix::empty()));
        for module in Module::ALL {
            for action in Action::ALL {
                assert!(!state.can(module.as_str(), action));
            }
        }
    }

    #[tokio::test]
    async fn owner_flag_on_staff_row_overrides_classification() {
        let f = staff_fixture();
        let mut row = staff_row(&f, StaffTier::A, json!({}));
        row.owner_flag = true;
        f.store.insert_staff_row(row);

        let state = f.resolver.resolve(Some(&f.session)).await;

        let identity = state.identity().unwrap();
        assert!(identity.is_owner());
        assert!(!identity.is_staff());
        assert!(state.can("settings", Action::Delete));
    }

    #[tokio::test]
    async fn email_tier_uses_session_email_when_account_has_none() {
        let store = Arc::new(InMemoryAccountStore::new());
        let principal_id = PrincipalId::new();
        let tenant_id = TenantId::new();
        let legacy_staff = StaffRecordId::new();
        store.insert_account(AccountRow {
            account_id: AccountId::new(),
            principal_id,
            tenant_id,
            owner_flag: false,
            staff_flag: true,
            staff_record_id: None,
            email: None,
        });
        store.insert_staff_row(StaffPermissionRow {
            tenant_id: Some(tenant_id),
            staff_record_id: Some(legacy_staff),
            email: Some("kim@example.com".to_string()),
            owner_flag: false,
            permissions: perms(json!({ "messages": { "view": true } })),
        });
        let resolver = Resolver::new(Arc::clone(&store));

        let session = Session::new(principal_id, Some("Kim@Example.com".to_string()));
        let state = resolver.resolve(Some(&session)).await;

        assert_eq!(staff_calls(&store), vec![StaffTier::B]);
        assert!(state.can("messages", Action::View));
        assert_eq!(state.identity().unwrap().staff_record_id, Some(legacy_staff));
    }
}
