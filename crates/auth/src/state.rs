//! Published resolution state.

use serde::{Deserialize, Serialize};

use crate::{Identity, PermissionMatrix};

/// Outcome of one resolution pass for one session.
///
/// Lifecycle: `loading` on session acquisition, then exactly one terminal
/// state per pass (resolved, failed, or unauthenticated). Once published it is
/// an immutable snapshot; holders replace it, they never mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BouncerState {
    loading: bool,
    authenticated: bool,
    error: Option<String>,
    identity: Option<Identity>,
    permissions: Option<PermissionMatrix>,
}

impl BouncerState {
    /// Session acquired, nothing known yet.
    pub fn loading() -> Self {
        Self {
            loading: true,
            authenticated: false,
            error: None,
            identity: None,
            permissions: None,
        }
    }

    /// No active session.
    pub fn unauthenticated() -> Self {
        Self {
            loading: false,
            ..Self::loading()
        }
    }

    /// Authenticated, but the account could not be resolved. Zero capabilities.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            loading: false,
            authenticated: true,
            error: Some(reason.into()),
            identity: None,
            permissions: None,
        }
    }

    pub fn resolved(identity: Identity, permissions: PermissionMatrix) -> Self {
        Self {
            loading: false,
            authenticated: true,
            error: None,
            identity: Some(identity),
            permissions: Some(permissions),
        }
    }

    /// Optimistic copy of a previously resolved state, marked as still loading.
    pub fn hydrating(&self) -> Self {
        Self {
            loading: true,
            ..self.clone()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn permissions(&self) -> Option<&PermissionMatrix> {
        self.permissions.as_ref()
    }

    /// Resolved without error: identity and matrix are both present.
    pub fn is_resolved(&self) -> bool {
        !self.loading && self.authenticated && self.error.is_none() && self.identity.is_some()
    }
}
