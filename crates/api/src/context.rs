use std::sync::Arc;

use tradedesk_auth::{BouncerState, Identity, Session};

/// Authorization context for a request.
///
/// Always present on routed requests: a missing or invalid token yields the
/// unauthenticated state rather than a rejected request, so every handler
/// decides through the same fail-closed checks.
#[derive(Debug, Clone)]
pub struct RequestAuth {
    session: Option<Session>,
    state: Arc<BouncerState>,
}

impl RequestAuth {
    pub fn new(session: Option<Session>, state: Arc<BouncerState>) -> Self {
        Self { session, state }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> &BouncerState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.state.identity()
    }
}
