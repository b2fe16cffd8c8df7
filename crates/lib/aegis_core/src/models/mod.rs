//! Domain models shared by the security components.

pub mod alerts;
pub mod audit;
pub mod auth;
pub mod permissions;
pub mod rate_limit;
