//! Business logic shared by handlers.

pub mod access;
pub mod auth;
