// @awa-component: SEC-AdminPermissionsHandler
//
//! Admin handlers for per-user permission overrides.

use aegis_core::permissions::codes;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::models::UserPermissionsResponse;
use crate::services::access::Access;

/// `GET /admin/users/{userId}/permissions`: effective permissions and overrides.
pub async fn list_handler(
    State(state): State<AppState>,
    mut access: Access,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserPermissionsResponse>> {
    access.require(codes::USERS_PERMISSIONS_MANAGE).await?;

    let resolver = &state.core.permissions;
    let role = resolver.user_role(&user_id).await?;
    let permissions = resolver.effective_permissions(&user_id, role).await?;
    let overrides = resolver.list_overrides(&user_id).await?;

    Ok(Json(UserPermissionsResponse {
        user_id,
        role,
        permissions,
        overrides,
    }))
}

/// `POST /admin/users/{userId}/permissions/{code}/grant`
pub async fn grant_handler(
    State(state): State<AppState>,
    access: Access,
    Path((user_id, code)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .core
        .permissions
        .grant(access.session(), &user_id, &code)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /admin/users/{userId}/permissions/{code}/revoke`
pub async fn revoke_handler(
    State(state): State<AppState>,
    access: Access,
    Path((user_id, code)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .core
        .permissions
        .revoke(access.session(), &user_id, &code)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /admin/users/{userId}/permissions/{code}`: back to the role default.
pub async fn reset_handler(
    State(state): State<AppState>,
    access: Access,
    Path((user_id, code)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .core
        .permissions
        .reset(access.session(), &user_id, &code)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
