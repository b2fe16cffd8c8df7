//! # aegis_core
//!
//! Authorization, rate limiting, audit logging, PII protection and security
//! alerting for Aegis.

pub mod alerts;
pub mod audit;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod migrate;
pub mod models;
pub mod permissions;
pub mod rate_limit;
pub mod security;
pub mod task;
pub mod uuid;

pub use security::{CoreStores, MemoryStores, SecurityCore, SecurityCoreError};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
