//! # aegis_api
//!
//! HTTP API library for Aegis.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use aegis_core::SecurityCore;
use axum::Router;
use axum::routing::{delete, get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{admin_permissions, alerts, audit, auth, health, permissions, rate_limit};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
    /// Rate limiter, permissions, audit, alerts and crypto.
    pub core: Arc<SecurityCore>,
}

/// Run embedded database migrations.
///
/// Delegates to `aegis_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    aegis_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler));

    // Anonymous allowed; a token, if present, must be valid
    let optional = Router::new()
        .route(routes::POST_AUDIT_LOGS, post(audit::create_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::optional_auth,
        ));

    // Protected routes (require auth); handlers check their own permission
    let protected = Router::new()
        .route(
            routes::POST_SECURITY_RATE_LIMIT_CHECK,
            post(rate_limit::check_handler),
        )
        .route(
            routes::DELETE_SECURITY_RATE_LIMIT_IDENTIFIER,
            delete(rate_limit::reset_handler),
        )
        .route(
            routes::GET_PERMISSIONS_CHECK_CODE,
            get(permissions::check_handler),
        )
        .route(
            routes::GET_ADMIN_USERS_ID_PERMISSIONS,
            get(admin_permissions::list_handler),
        )
        .route(
            routes::POST_ADMIN_USERS_ID_PERMISSIONS_CODE_GRANT,
            post(admin_permissions::grant_handler),
        )
        .route(
            routes::POST_ADMIN_USERS_ID_PERMISSIONS_CODE_REVOKE,
            post(admin_permissions::revoke_handler),
        )
        .route(
            routes::DELETE_ADMIN_USERS_ID_PERMISSIONS_CODE,
            delete(admin_permissions::reset_handler),
        )
        .route(routes::GET_ADMIN_AUDIT_LOGS, get(audit::query_handler))
        .route(
            routes::POST_ADMIN_AUDIT_LOGS_READ,
            post(audit::mark_read_handler),
        )
        .route(
            routes::POST_ADMIN_AUDIT_LOGS_PURGE,
            post(audit::purge_handler),
        )
        .route(routes::POST_ADMIN_SECURITY_ALERTS, post(alerts::send_handler))
        .route(
            routes::POST_ADMIN_SECURITY_ALERTS_TEST,
            post(alerts::test_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(optional)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
