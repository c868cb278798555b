use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use tradedesk_auth::{Session, SessionValidator};
use tradedesk_infra::Bouncer;

use crate::app::services::SharedStore;
use crate::context::RequestAuth;

#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<dyn SessionValidator>,
    pub bouncer: Bouncer<SharedStore>,
}

/// Resolve the caller's capabilities before the handler runs.
///
/// A missing, malformed or expired token is "no active session".
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = extract_bearer(req.headers()).and_then(|token| {
        match state.sessions.validate(token, Utc::now()) {
            Ok(claims) => Some(Session::from(claims)),
            Err(e) => {
                debug!(error = %e, "rejected session token");
                None
            }
        }
    });

    let resolved = state.bouncer.resolve_now(session.as_ref()).await;
    req.extensions_mut().insert(RequestAuth::new(session, resolved));

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
