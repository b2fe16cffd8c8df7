// @awa-component: SEC-LoginEndpoint
// @awa-component: SEC-RegistrationEndpoint
//
//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{LoginRequest, RegisterRequest, TokenResponse};
use crate::services::access::ClientOrigin;
use crate::services::auth;

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(
        &state.core,
        &body.email,
        &body.password,
        &origin,
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/register`: create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let resp = auth::register(
        &state.core,
        &body.email,
        &body.password,
        body.name.as_deref(),
        &origin,
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
