//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the bouncer/mutation services
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs and mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use tradedesk_auth::Hs256SessionValidator;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(session_secret: String, services: Arc<services::AppServices>) -> Router {
    let sessions = Arc::new(Hs256SessionValidator::new(session_secret.into_bytes()));
    let auth_state = middleware::AuthState {
        sessions,
        bouncer: services.bouncer.clone(),
    };

    // Every routed request carries a resolved `RequestAuth`.
    let resolved = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(resolved)
        .layer(ServiceBuilder::new())
}
