use axum::{
    routing::{get, put},
    Router,
};

pub mod me;
pub mod modules;
pub mod staff;
pub mod system;

/// Router for all session-resolved endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/me", get(me::me))
        .route("/me/can/:module/:action", get(me::can))
        .route("/me/explain/:module/:action", get(me::explain))
        .route("/modules/:module", get(modules::open_module))
        .route("/staff/:staff_record_id/permissions", put(staff::put_permissions))
}
