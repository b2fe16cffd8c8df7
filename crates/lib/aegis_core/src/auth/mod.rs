//! Session tokens and user account persistence.
//!
//! Shared by `aegis_api` (login, register, session middleware) and
//! `aegis_cli`.

pub mod jwt;
pub mod queries;
pub mod store;

use thiserror::Error;

pub use store::{MemoryUserStore, NewUser, PgUserStore, RoleAssignment, UserStore};

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
