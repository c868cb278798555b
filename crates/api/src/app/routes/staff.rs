//! Staff permission editing.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use tradedesk_auth::{Action, Module, RawMatrix};
use tradedesk_core::StaffRecordId;

use crate::app::{dto, errors, services::AppServices};
use crate::context::RequestAuth;

/// Replace a staff member's matrix within the caller's tenant.
///
/// Requires `staff.edit`. The tenant always comes from the caller's resolved
/// identity, never from the request. The body is only inspected once the
/// caller is authorized.
pub async fn put_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<RequestAuth>,
    Path(staff_record_id): Path<String>,
    edit: Result<Json<RawMatrix>, JsonRejection>,
) -> axum::response::Response {
    let caps = services.bouncer.capabilities(auth.state());
    if let Err(e) = caps.authorize(Module::Staff.as_str(), Action::Edit) {
        return errors::authz_error_to_response(e);
    }
    let Some(tenant_id) = auth.identity().map(|i| i.tenant_id) else {
        return errors::json_error(StatusCode::FORBIDDEN, "resolution_failed", "identity missing");
    };

    let Json(edit) = match edit {
        Ok(edit) => edit,
        Err(rejection) => {
            return errors::json_error(rejection.status(), "invalid_body", rejection.body_text());
        }
    };

    let staff_record_id: StaffRecordId = match staff_record_id.parse() {
        Ok(id) => id,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{e}"));
        }
    };

    match services
        .mutations
        .submit_permission_edit(tenant_id, staff_record_id, &edit)
        .await
    {
        Ok(applied) => Json(dto::PermissionEditResponse {
            staff_record_id,
            permissions: applied.matrix,
            refreshed: applied.refreshed,
        })
        .into_response(),
        Err(e) => errors::mutation_error_to_response(e),
    }
}
