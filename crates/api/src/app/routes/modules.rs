//! Route-guarded module entry.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use tradedesk_auth::{normalize_module_key, Action, ActionSet, RouteDecision};

use crate::app::{dto, errors, services::AppServices};
use crate::context::RequestAuth;

/// Open a module's landing view. Requires `view` on the module.
///
/// Denials answer with a redirect, mirroring the route guard: sign-in for
/// anonymous callers, the neutral default route for everyone else.
pub async fn open_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<RequestAuth>,
    Path(module): Path<String>,
) -> axum::response::Response {
    let guard = services
        .bouncer
        .config()
        .route_guard()
        .requiring(module.clone(), Action::View);
    let caps = services.bouncer.capabilities(auth.state());

    match guard.decide(&caps) {
        RouteDecision::Allow => {}
        RouteDecision::Redirect(to) => {
            return (StatusCode::SEE_OTHER, [(header::LOCATION, to)]).into_response();
        }
        RouteDecision::Pending => {
            return errors::json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "pending",
                "capabilities are still being resolved",
            );
        }
    }

    let Some(module) = normalize_module_key(&module).module() else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found");
    };

    let actions = match auth.identity() {
        Some(identity) if identity.is_owner() => Action::ALL
            .into_iter()
            .fold(ActionSet::default(), |set, a| set.with(a, true)),
        _ => auth
            .state()
            .permissions()
            .and_then(|m| m.get(module.as_str()).copied())
            .unwrap_or_default(),
    };

    Json(dto::ModuleResponse { module, actions }).into_response()
}
