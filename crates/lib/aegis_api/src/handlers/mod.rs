//! Request handlers.

pub mod admin_permissions;
pub mod alerts;
pub mod audit;
pub mod auth;
pub mod health;
pub mod permissions;
pub mod rate_limit;
