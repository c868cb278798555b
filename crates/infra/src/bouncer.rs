//! Session contexts and the single publish point.
//!
//! A [`Bouncer`] owns the resolver and the capability cache. Each consumer
//! (a view tree, a connection) opens a [`SessionContext`], feeds it session
//! changes, and reads immutable [`BouncerState`] snapshots from it.
//!
//! Every resolution pass ends in a single publish step serialized by a
//! lock: whichever pass completes last is what stays published. A pass whose
//! context was torn down, or whose context has moved on to a different
//! principal, publishes nothing.
//!
//! Lock order: publish lock, then a context's inner lock, then the cache.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use tradedesk_auth::{Action, BouncerState, Capabilities, RouteDecision, RouteGuard, Session};
use tradedesk_core::{PrincipalId, StaffRecordId, TenantId};

use crate::cache::CapabilityCache;
use crate::config::BouncerConfig;
use crate::resolver::Resolver;
use crate::store::AccountStore;

pub struct Bouncer<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    resolver: Resolver<S>,
    cache: CapabilityCache,
    contexts: Mutex<Vec<Weak<ContextShared>>>,
    publish_lock: Mutex<()>,
    config: BouncerConfig,
}

impl<S> Clone for Bouncer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: AccountStore + 'static> Bouncer<S> {
    pub fn new(store: S, config: BouncerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver: Resolver::new(store),
                cache: CapabilityCache::new(),
                contexts: Mutex::new(Vec::new()),
                publish_lock: Mutex::new(()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &BouncerConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &CapabilityCache {
        &self.inner.cache
    }

    pub fn store(&self) -> &S {
        self.inner.resolver.store()
    }

    /// Check a snapshot with the configured strictness.
    pub fn capabilities<'a>(&self, state: &'a BouncerState) -> Capabilities<'a> {
        self.inner.config.capabilities(state)
    }

    pub fn open_context(&self) -> SessionContext<S> {
        let (state_tx, _) = watch::channel(Arc::new(BouncerState::unauthenticated()));
        let shared = Arc::new(ContextShared {
            inner: Mutex::new(ContextInner {
                session: None,
                closed: false,
            }),
            state_tx,
        });

        if let Ok(mut contexts) = self.inner.contexts.lock() {
            contexts.retain(|w| w.strong_count() > 0);
            contexts.push(Arc::downgrade(&shared));
        }

        SessionContext {
            bouncer: self.clone(),
            shared,
        }
    }

    /// Resolve outside any context and publish the result.
    ///
    /// Used by request-scoped callers that need a terminal state before they
    /// can answer.
    pub async fn resolve_now(&self, session: Option<&Session>) -> Arc<BouncerState> {
        let Some(session) = session else {
            return Arc::new(BouncerState::unauthenticated());
        };

        let state = Arc::new(self.inner.resolver.resolve(Some(session)).await);
        self.publish(session, Arc::clone(&state), None);
        state
    }

    /// Re-resolve every cached principal bound to a staff record.
    ///
    /// Returns how many principals were refreshed.
    pub async fn refresh_staff(&self, tenant_id: TenantId, staff_record_id: StaffRecordId) -> usize {
        let sessions = self.inner.cache.sessions_for_staff(tenant_id, staff_record_id);
        for session in &sessions {
            self.resolve_now(Some(session)).await;
        }
        debug!(%tenant_id, %staff_record_id, refreshed = sessions.len(), "staff refresh");
        sessions.len()
    }

    /// Evict a principal's cache entry unless another live context still
    /// tracks it.
    fn evict_untracked(&self, principal_id: PrincipalId) {
        let Ok(_publish) = self.inner.publish_lock.lock() else {
            return;
        };

        let tracked = self.live_contexts().iter().any(|shared| {
            shared
                .inner
                .lock()
                .is_ok_and(|ctx| !ctx.closed && ctx.is_tracking(principal_id))
        });
        if tracked {
            debug!(principal_id = %principal_id, "principal still tracked; keeping cache entry");
        } else {
            self.inner.cache.evict(principal_id);
        }
    }

    fn live_contexts(&self) -> Vec<Arc<ContextShared>> {
        match self.inner.contexts.lock() {
            Ok(contexts) => contexts.iter().filter_map(Weak::upgrade).collect(),
            Err(_) => vec![],
        }
    }

    fn publish(&self, session: &Session, state: Arc<BouncerState>, origin: Option<&ContextShared>) {
        let Ok(_publish) = self.inner.publish_lock.lock() else {
            return;
        };

        if let Some(origin) = origin {
            let Ok(ctx) = origin.inner.lock() else {
                return;
            };
            if ctx.closed {
                debug!(principal_id = %session.principal_id, "context torn down; dropping pass result");
                return;
            }
            if !ctx.is_tracking(session.principal_id) {
                debug!(principal_id = %session.principal_id, "session changed; dropping pass result");
                return;
            }
            self.inner.cache.store(session, &state);
        } else {
            self.inner.cache.store(session, &state);
        }

        let mut delivered = 0usize;
        for shared in self.live_contexts() {
            let Ok(ctx) = shared.inner.lock() else {
                continue;
            };
            if !ctx.closed && ctx.is_tracking(session.principal_id) {
                shared.state_tx.send_replace(Arc::clone(&state));
                delivered += 1;
            }
        }

        debug!(
            principal_id = %session.principal_id,
            resolved = state.is_resolved(),
            delivered,
            "published"
        );
    }
}

struct ContextShared {
    inner: Mutex<ContextInner>,
    state_tx: watch::Sender<Arc<BouncerState>>,
}

struct ContextInner {
    session: Option<Session>,
    closed: bool,
}

impl ContextInner {
    fn is_tracking(&self, principal_id: PrincipalId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.principal_id == principal_id)
    }
}

/// Handle to an in-flight resolution pass.
#[must_use = "a pass runs regardless; await `finished` to observe its end"]
pub struct PassHandle(Option<JoinHandle<()>>);

impl PassHandle {
    fn none() -> Self {
        Self(None)
    }

    /// Whether a pass was started and has not finished yet.
    pub fn is_running(&self) -> bool {
        self.0.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn finished(self) {
        if let Some(handle) = self.0 {
            let _ = handle.await;
        }
    }
}

/// One consumer's view of the current session's capabilities.
///
/// Must be driven from within a Tokio runtime: session changes spawn the
/// authoritative pass as a task. Dropping the context tears it down.
pub struct SessionContext<S: AccountStore + 'static> {
    bouncer: Bouncer<S>,
    shared: Arc<ContextShared>,
}

impl<S: AccountStore + 'static> SessionContext<S> {
    /// Feed a session event (sign-in, sign-out, token refresh).
    ///
    /// Publishes the optimistic state synchronously (cached snapshot marked
    /// loading, or plain loading) and starts a fresh pass.
    pub fn on_session_change(&self, session: Option<Session>) -> PassHandle {
        let cache = &self.bouncer.inner.cache;
        let Ok(mut ctx) = self.shared.inner.lock() else {
            return PassHandle::none();
        };
        if ctx.closed {
            return PassHandle::none();
        }

        let previous = std::mem::replace(&mut ctx.session, session.clone());
        let abandoned = previous
            .map(|p| p.principal_id)
            .filter(|id| session.as_ref().is_none_or(|s| s.principal_id != *id));

        let Some(session) = session else {
            self.shared
                .state_tx
                .send_replace(Arc::new(BouncerState::unauthenticated()));
            drop(ctx);
            if let Some(principal_id) = abandoned {
                self.bouncer.evict_untracked(principal_id);
            }
            return PassHandle::none();
        };

        let initial = match cache.get(session.principal_id) {
            Some(entry) => entry.state.hydrating(),
            None => BouncerState::loading(),
        };
        self.shared.state_tx.send_replace(Arc::new(initial));
        drop(ctx);

        if let Some(principal_id) = abandoned {
            self.bouncer.evict_untracked(principal_id);
        }
        self.spawn_pass(session)
    }

    /// Start a fresh pass for the current session, keeping the current
    /// snapshot published until it completes.
    pub fn refresh(&self) -> PassHandle {
        let session = match self.shared.inner.lock() {
            Ok(ctx) if !ctx.closed => ctx.session.clone(),
            _ => None,
        };
        match session {
            Some(session) => self.spawn_pass(session),
            None => PassHandle::none(),
        }
    }

    fn spawn_pass(&self, session: Session) -> PassHandle {
        let bouncer = self.bouncer.clone();
        let origin = Arc::clone(&self.shared);

        PassHandle(Some(tokio::spawn(async move {
            let state = bouncer.inner.resolver.resolve(Some(&session)).await;
            bouncer.publish(&session, Arc::new(state), Some(&origin));
        })))
    }

    pub fn session(&self) -> Option<Session> {
        self.shared.inner.lock().ok().and_then(|ctx| ctx.session.clone())
    }

    pub fn snapshot(&self) -> Arc<BouncerState> {
        Arc::clone(&self.shared.state_tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BouncerState>> {
        self.shared.state_tx.subscribe()
    }

    pub fn can(&self, module: &str, action: Action) -> bool {
        let state = self.snapshot();
        self.bouncer.capabilities(&state).can(module, action)
    }

    pub fn decide(&self, guard: &RouteGuard) -> RouteDecision {
        let state = self.snapshot();
        guard.decide(&self.bouncer.capabilities(&state))
    }

    /// Stop accepting results. In-flight passes finish but publish nothing.
    pub fn teardown(&self) {
        if let Ok(mut ctx) = self.shared.inner.lock() {
            ctx.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().map(|ctx| ctx.closed).unwrap_or(true)
    }
}

impl<S: AccountStore + 'static> Drop for SessionContext<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::sync::Notify;

    use tradedesk_auth::RawMatrix;
    use tradedesk_core::AccountId;

    use super::*;
    use crate::store::{
        AccountRow, InMemoryAccountStore, StaffLookup, StaffPermissionRow, StoreError,
    };

    fn perms(value: serde_json::Value) -> RawMatrix {
        value.as_object().cloned().unwrap_or_default()
    }

    /// Store whose first staff lookup reads its answer, then parks until released.
    #[derive(Default)]
    struct GatedStore {
        inner: InMemoryAccountStore,
        staff_calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl AccountStore for GatedStore {
        async fn find_account(&self, principal_id: PrincipalId) -> Result<Option<AccountRow>, StoreError> {
            self.inner.find_account(principal_id).await
        }

        async fn find_staff_permissions(
            &self,
            lookup: &StaffLookup,
        ) -> Result<Option<StaffPermissionRow>, StoreError> {
            let answer = self.inner.find_staff_permissions(lookup).await;
            if self.staff_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            answer
        }

        async fn staff_record_in_tenant(
            &self,
            tenant_id: TenantId,
            staff_record_id: StaffRecordId,
        ) -> Result<bool, StoreError> {
            self.inner.staff_record_in_tenant(tenant_id, staff_record_id).await
        }

        async fn upsert_staff_permissions(
            &self,
            tenant_id: TenantId,
            staff_record_id: StaffRecordId,
            permissions: RawMatrix,
        ) -> Result<(), StoreError> {
            self.inner
                .upsert_staff_permissions(tenant_id, staff_record_id, permissions)
                .await
        }
    }

    struct Staff {
        session: Session,
        tenant_id: TenantId,
        staff_record_id: StaffRecordId,
    }

    fn seed_staff(store: &InMemoryAccountStore, grants: serde_json::Value) -> Staff {
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
            email: None,
        });
        store.insert_staff_row(StaffPermissionRow {
            tenant_id: Some(tenant_id),
            staff_record_id: Some(staff_record_id),
            email: None,
            owner_flag: false,
            permissions: perms(grants),
        });

        Staff {
            session: Session::new(principal_id, None),
            tenant_id,
            staff_record_id,
        }
    }

    #[tokio::test]
    async fn session_change_publishes_loading_then_resolved() {
        let store = Arc::new(InMemoryAccountStore::new());
        let staff = seed_staff(&store, json!({ "orders": { "view": true } }));
        let bouncer = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        let ctx = bouncer.open_context();

        let pass = ctx.on_session_change(Some(staff.session.clone()));
        assert!(ctx.snapshot().is_loading());
        assert!(!ctx.can("orders", Action::View));

        pass.finished().await;
        let state = ctx.snapshot();
        assert!(state.is_resolved());
        assert!(ctx.can("orders", Action::View));
        assert!(bouncer.cache().get(staff.session.principal_id).is_some());
    }

    #[tokio::test]
    async fn sign_out_publishes_unauthenticated_and_evicts() {
        let store = Arc::new(InMemoryAccountStore::new());
        let staff = seed_staff(&store, json!({}));
        let bouncer = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        let ctx = bouncer.open_context();

        ctx.on_session_change(Some(staff.session.clone())).finished().await;
        assert!(ctx.snapshot().is_resolved());

        let pass = ctx.on_session_change(None);
        assert!(!pass.is_running());
        assert_eq!(*ctx.snapshot(), BouncerState::unauthenticated());
        assert!(bouncer.cache().is_empty());
        assert_eq!(
            ctx.decide(&bouncer.config().route_guard()),
            RouteDecision::Redirect("/sign-in".to_string())
        );
    }

    #[tokio::test]
    async fn sign_out_keeps_entry_another_context_tracks() {
        let store = Arc::new(InMemoryAccountStore::new());
        let staff = seed_staff(&store, json!({ "orders": { "view": true } }));
        let bouncer = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        let first = bouncer.open_context();
        let second = bouncer.open_context();

        first.on_session_change(Some(staff.session.clone())).finished().await;
        second.on_session_change(Some(staff.session.clone())).finished().await;

        let _ = first.on_session_change(None);
        assert!(bouncer.cache().get(staff.session.principal_id).is_some());
        assert!(second.can("orders", Action::View));

        let _ = second.on_session_change(None);
        assert!(bouncer.cache().is_empty());
    }

    #[tokio::test]
    async fn new_context_hydrates_from_cache_while_loading() {
        let store = Arc::new(InMemoryAccountStore::new());
        let staff = seed_staff(&store, json!({ "reports": { "view": true } }));

        let strict = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        strict.resolve_now(Some(&staff.session)).await;

        let ctx = strict.open_context();
        let pass = ctx.on_session_change(Some(staff.session.clone()));
        let hydrated = ctx.snapshot();
        assert!(hydrated.is_loading());
        assert!(hydrated.identity().is_some());
        assert!(!ctx.can("reports", Action::View));
        pass.finished().await;
        assert!(ctx.can("reports", Action::View));

        let optimistic = Bouncer::new(
            Arc::clone(&store),
            BouncerConfig {
                optimistic_checks: true,
                ..BouncerConfig::default()
            },
        );
        optimistic.resolve_now(Some(&staff.session)).await;
        let ctx = optimistic.open_context();
        let pass = ctx.on_session_change(Some(staff.session.clone()));
        assert!(ctx.snapshot().is_loading());
        assert!(ctx.can("reports", Action::View));
        assert!(!ctx.can("reports", Action::Delete));
        pass.finished().await;
    }

    #[tokio::test]
    async fn last_completed_pass_wins() {
        let store = Arc::new(GatedStore::default());
        let staff = seed_staff(&store.inner, json!({ "orders": { "view": true } }));
        let bouncer = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        let ctx = bouncer.open_context();

        // Pass 1 reads the old grants, then stalls.
        let slow = ctx.on_session_change(Some(staff.session.clone()));
        store.entered.notified().await;

        store
            .inner
            .upsert_staff_permissions(
                staff.tenant_id,
                staff.staff_record_id,
                perms(json!({ "invoices": { "view": true } })),
            )
            .await
            .unwrap();

        // Pass 2 starts later and completes first.
        ctx.refresh().finished().await;
        assert!(ctx.can("invoices", Action::View));
        assert!(!ctx.can("orders", Action::View));

        store.release.notify_one();
        slow.finished().await;

        assert!(ctx.can("orders", Action::View));
        assert!(!ctx.can("invoices", Action::View));
        let cached = bouncer.cache().get(staff.session.principal_id).unwrap();
        assert!(cached.state.can("orders", Action::View));
    }

    #[tokio::test]
    async fn torn_down_context_never_publishes() {
        let store = Arc::new(GatedStore::default());
        let staff = seed_staff(&store.inner, json!({ "orders": { "view": true } }));
        let bouncer = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        let ctx = bouncer.open_context();

        let pass = ctx.on_session_change(Some(staff.session.clone()));
        store.entered.notified().await;
        ctx.teardown();
        assert!(ctx.is_closed());

        store.release.notify_one();
        pass.finished().await;

        assert!(ctx.snapshot().is_loading());
        assert!(bouncer.cache().get(staff.session.principal_id).is_none());
        assert!(!ctx.on_session_change(Some(staff.session.clone())).is_running());
    }

    #[tokio::test]
    async fn pass_for_previous_principal_is_dropped() {
        let store = Arc::new(GatedStore::default());
        let first = seed_staff(&store.inner, json!({ "orders": { "view": true } }));
        let second = seed_staff(&store.inner, json!({ "expenses": { "view": true } }));
        let bouncer = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        let ctx = bouncer.open_context();

        let stale = ctx.on_session_change(Some(first.session.clone()));
        store.entered.notified().await;

        ctx.on_session_change(Some(second.session.clone())).finished().await;
        store.release.notify_one();
        stale.finished().await;

        assert_eq!(
            ctx.snapshot().identity().map(|i| i.principal_id),
            Some(second.session.principal_id)
        );
        assert!(ctx.can("expenses", Action::View));
        assert!(!ctx.can("orders", Action::View));
        assert!(bouncer.cache().get(first.session.principal_id).is_none());
    }

    #[tokio::test]
    async fn refresh_staff_reaches_live_contexts() {
        let store = Arc::new(InMemoryAccountStore::new());
        let staff = seed_staff(&store, json!({ "orders": { "view": true } }));
        let bouncer = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        let ctx = bouncer.open_context();
        ctx.on_session_change(Some(staff.session.clone())).finished().await;

        store
            .upsert_staff_permissions(
                staff.tenant_id,
                staff.staff_record_id,
                perms(json!({ "orders": { "delete": true } })),
            )
            .await
            .unwrap();

        let refreshed = bouncer.refresh_staff(staff.tenant_id, staff.staff_record_id).await;
        assert_eq!(refreshed, 1);
        assert!(ctx.can("orders", Action::Delete));
        assert!(!ctx.can("orders", Action::View));

        assert_eq!(bouncer.refresh_staff(staff.tenant_id, StaffRecordId::new()).await, 0);
    }

    #[tokio::test]
    async fn subscribers_see_every_replacement() {
        let store = Arc::new(InMemoryAccountStore::new());
        let staff = seed_staff(&store, json!({}));
        let bouncer = Bouncer::new(Arc::clone(&store), BouncerConfig::default());
        let ctx = bouncer.open_context();
        let mut rx = ctx.subscribe();

        ctx.on_session_change(Some(staff.session.clone())).finished().await;
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_resolved());
    }
}
