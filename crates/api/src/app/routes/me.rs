//! Capability queries for the calling principal.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use tradedesk_auth::normalize_module_key;

use crate::app::{dto, errors, services::AppServices};
use crate::context::RequestAuth;

pub async fn me(Extension(auth): Extension<RequestAuth>) -> axum::response::Response {
    let state = auth.state();
    if !state.is_authenticated() {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "no active session");
    }
    if let Some(reason) = state.error() {
        return errors::json_error(StatusCode::FORBIDDEN, "resolution_failed", reason);
    }

    match dto::me_response(state) {
        Some(body) => Json(body).into_response(),
        None => errors::json_error(StatusCode::FORBIDDEN, "resolution_failed", "identity missing"),
    }
}

pub async fn can(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<RequestAuth>,
    Path((module, action)): Path<(String, String)>,
) -> axum::response::Response {
    let action = match errors::parse_action(&action) {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let allowed = services.bouncer.capabilities(auth.state()).can(&module, action);
    Json(dto::CanResponse {
        module: normalize_module_key(&module).as_str().to_string(),
        action,
        allowed,
    })
    .into_response()
}

pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<RequestAuth>,
    Path((module, action)): Path<(String, String)>,
) -> axum::response::Response {
    let action = match errors::parse_action(&action) {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let caps = services.bouncer.capabilities(auth.state());
    Json(tradedesk_auth::explain(&caps, &module, action)).into_response()
}
