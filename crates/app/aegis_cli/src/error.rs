use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("FlexiLogger::{:?}: {}", .0, .0)]
    FlexiLogger(#[from] flexi_logger::FlexiLoggerError),

    #[error("Config: {}", .0)]
    Config(#[from] aegis_core::config::ConfigError),

    #[error("Database: {}", .0)]
    Db(#[from] sqlx::Error),

    #[error("Migration: {}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Crypto: {}", .0)]
    Crypto(#[from] aegis_core::crypto::CryptoError),

    #[error("Audit: {}", .0)]
    Audit(#[from] aegis_core::audit::AuditError),

    #[error("Rate limit: {}", .0)]
    RateLimit(#[from] aegis_core::rate_limit::RateLimitError),

    #[error("Alerts: {}", .0)]
    Alert(#[from] aegis_core::alerts::AlertError),
}
