// @awa-component: SEC-PermissionResolver
//
//! Role-hierarchy permissions with per-user grant/revoke overrides.

pub mod catalog;
pub mod queries;
pub mod resolver;
pub mod store;

use thiserror::Error;

use crate::audit::AuditError;

pub use catalog::{PermissionCatalog, codes};
pub use queries::PgPermissionStore;
pub use resolver::{PermissionResolver, RequestPermissionCache};
pub use store::{MemoryPermissionStore, PermissionStore};

/// Permission errors.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}
