//! Per-principal cache of the last successfully resolved state.
//!
//! Used to hydrate new contexts optimistically and to find which sessions
//! must be re-resolved after a staff record changes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use tradedesk_auth::{BouncerState, Session};
use tradedesk_core::{PrincipalId, StaffRecordId, TenantId};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub state: Arc<BouncerState>,
    pub session: Session,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: RwLock<HashMap<PrincipalId, CacheEntry>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, principal_id: PrincipalId) -> Option<CacheEntry> {
        self.entries.read().ok()?.get(&principal_id).cloned()
    }

    /// Keep resolved states; anything else evicts the principal.
    pub(crate) fn store(&self, session: &Session, state: &Arc<BouncerState>) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        if state.is_resolved() {
            entries.insert(
                session.principal_id,
                CacheEntry {
                    state: Arc::clone(state),
                    session: session.clone(),
                    resolved_at: Utc::now(),
                },
            );
        } else {
            entries.remove(&session.principal_id);
        }
    }

    pub fn evict(&self, principal_id: PrincipalId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&principal_id);
        }
    }

    /// Sessions whose cached identity is the given staff record.
    pub fn sessions_for_staff(&self, tenant_id: TenantId, staff_record_id: StaffRecordId) -> Vec<Session> {
        let Ok(entries) = self.entries.read() else {
            return vec![];
        };
        entries
            .values()
            .filter(|e| {
                e.state
                    .identity()
                    .is_some_and(|id| id.is_staff_record(tenant_id, staff_record_id))
            })
            .map(|e| e.session.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
