//! Permission check for the calling user.

use aegis_core::models::permissions::Decision;
use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::AppResult;
use crate::models::PermissionCheckResponse;
use crate::services::access::Access;

/// `GET /permissions/check/{code}`: whether the caller holds `code`.
///
/// Unknown codes are reported as denied, not as an error.
pub async fn check_handler(
    State(state): State<AppState>,
    access: Access,
    Path(code): Path<String>,
) -> AppResult<Json<PermissionCheckResponse>> {
    let session = access.session();
    let decision: Decision = state
        .core
        .permissions
        .resolve(&session.user_id, session.role, &code)
        .await?;
    Ok(Json(PermissionCheckResponse {
        allowed: decision.is_allowed(),
        decision,
        code,
    }))
}
