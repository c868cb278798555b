use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tradedesk_auth::AuthzError;
use tradedesk_core::DomainError;
use tradedesk_infra::MutationError;

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::Pending => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "pending",
            "capabilities are still being resolved",
        ),
        AuthzError::Unauthenticated => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string())
        }
        AuthzError::ResolutionFailed(_) => {
            json_error(StatusCode::FORBIDDEN, "resolution_failed", err.to_string())
        }
        AuthzError::TenantMismatch => {
            json_error(StatusCode::FORBIDDEN, "tenant_mismatch", err.to_string())
        }
        AuthzError::UnknownModule(_) => {
            json_error(StatusCode::FORBIDDEN, "unknown_module", err.to_string())
        }
        AuthzError::Forbidden { .. } => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

pub fn mutation_error_to_response(err: MutationError) -> axum::response::Response {
    match err {
        MutationError::Invalid(DomainError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "staff record not found")
        }
        MutationError::Invalid(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        MutationError::Store(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_action(s: &str) -> Result<tradedesk_auth::Action, axum::response::Response> {
    tradedesk_auth::Action::parse(s).ok_or_else(|| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_action",
            "action must be one of: view, create, edit, delete",
        )
    })
}
