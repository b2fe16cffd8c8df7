// @awa-component: SEC-SessionLayer
//
//! Authentication middleware: Bearer token extraction and JWT verification.

use aegis_core::auth::jwt::verify_access_token;
use aegis_core::models::auth::Session;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;

/// Verified session stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Session);

/// `Ok(None)` when no Authorization header is present.
fn session_from_headers(headers: &HeaderMap, secret: &[u8]) -> Result<Option<Session>, AppError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;
    verify_access_token(token, secret)
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = session_from_headers(request.headers(), state.config.jwt_secret.as_bytes())?
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;
    request.extensions_mut().insert(AuthenticatedUser(session));
    Ok(next.run(request).await)
}

/// Like [`require_auth`], but a request without an Authorization header
/// passes through anonymously. A present but invalid token is still rejected.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(session) =
        session_from_headers(request.headers(), state.config.jwt_secret.as_bytes())?
    {
        request.extensions_mut().insert(AuthenticatedUser(session));
    }
    Ok(next.run(request).await)
}
