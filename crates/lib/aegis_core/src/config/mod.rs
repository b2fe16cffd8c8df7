//! Security configuration: key material, alert channels and rate-limit
//! policies, read once at startup.

pub mod secrets;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::models::alerts::Severity;
use crate::models::rate_limit::{OperationClass, RateLimitPolicy};
pub use secrets::Secret;

/// Default per-channel alert delivery timeout.
pub const DEFAULT_ALERT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Deployment mode. Production makes key material mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Production,
    Development,
}

impl DeploymentMode {
    pub fn is_production(&self) -> bool {
        matches!(self, DeploymentMode::Production)
    }
}

/// Alert channel destinations and delivery settings.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub slack_webhook_url: Option<Url>,
    pub discord_webhook_url: Option<Url>,
    pub webhook_url: Option<Url>,
    /// Signing secret for the generic HTTP callback.
    pub webhook_secret: Option<Secret>,
    /// Alerts below this severity are not sent.
    pub min_severity: Severity,
    pub timeout: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            slack_webhook_url: None,
            discord_webhook_url: None,
            webhook_url: None,
            webhook_secret: None,
            min_severity: Severity::High,
            timeout: DEFAULT_ALERT_TIMEOUT,
        }
    }
}

/// Process-wide security configuration.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub mode: DeploymentMode,
    /// Key for field encryption and lookup hashing.
    pub encryption_key: Option<Secret>,
    /// Server-side password pepper.
    pub password_pepper: Option<Secret>,
    pub alerts: AlertConfig,
    pub rate_limits: HashMap<OperationClass, RateLimitPolicy>,
    /// Optional JSON file replacing the built-in permission catalog.
    pub permission_catalog_path: Option<PathBuf>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::Development,
            encryption_key: None,
            password_pepper: None,
            alerts: AlertConfig::default(),
            rate_limits: OperationClass::ALL
                .into_iter()
                .map(|c| (c, c.default_policy()))
                .collect(),
            permission_catalog_path: None,
        }
    }
}

impl SecurityConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                              | Default                         |
    /// |---------------------------------------|---------------------------------|
    /// | `AEGIS_ENV`                           | `development`                   |
    /// | `AEGIS_ENCRYPTION_KEY`                | unset (required in production)  |
    /// | `AEGIS_PASSWORD_PEPPER`               | unset (required in production)  |
    /// | `SECURITY_ALERT_SLACK_WEBHOOK_URL`    | unset (channel skipped)         |
    /// | `SECURITY_ALERT_DISCORD_WEBHOOK_URL`  | unset (channel skipped)         |
    /// | `SECURITY_ALERT_WEBHOOK_URL`          | unset (channel skipped)         |
    /// | `SECURITY_ALERT_WEBHOOK_SECRET`       | unset (callback unsigned)       |
    /// | `SECURITY_ALERT_MIN_SEVERITY`         | `high`                          |
    /// | `SECURITY_ALERT_TIMEOUT_MS`           | `5000`                          |
    /// | `RATE_LIMIT_<CLASS>_MAX`              | per-class default               |
    /// | `RATE_LIMIT_<CLASS>_WINDOW_MS`        | per-class default               |
    /// | `AEGIS_PERMISSION_CATALOG`            | built-in catalog                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SecurityConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mode = match lookup("AEGIS_ENV").as_deref().map(str::trim) {
            Some("production") | Some("prod") => DeploymentMode::Production,
            Some("development") | Some("dev") | Some("test") | None => {
                DeploymentMode::Development
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "AEGIS_ENV".into(),
                    message: format!("expected production or development, got {other}"),
                });
            }
        };

        let alerts = AlertConfig {
            slack_webhook_url: parse_url(&lookup, "SECURITY_ALERT_SLACK_WEBHOOK_URL")?,
            discord_webhook_url: parse_url(&lookup, "SECURITY_ALERT_DISCORD_WEBHOOK_URL")?,
            webhook_url: parse_url(&lookup, "SECURITY_ALERT_WEBHOOK_URL")?,
            webhook_secret: Secret::non_empty(lookup("SECURITY_ALERT_WEBHOOK_SECRET")),
            min_severity: match lookup("SECURITY_ALERT_MIN_SEVERITY") {
                Some(raw) => raw.parse().map_err(|message| ConfigError::Invalid {
                    key: "SECURITY_ALERT_MIN_SEVERITY".into(),
                    message,
                })?,
                None => Severity::High,
            },
            timeout: parse_number::<u64>(&lookup, "SECURITY_ALERT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_ALERT_TIMEOUT),
        };

        let mut rate_limits = HashMap::new();
        for class in OperationClass::ALL {
            let mut policy = class.default_policy();
            let prefix = format!("RATE_LIMIT_{}", class.as_str().to_ascii_uppercase());
            if let Some(limit) = parse_number::<u32>(&lookup, &format!("{prefix}_MAX"))? {
                policy.limit = limit;
            }
            if let Some(window) = parse_number::<u64>(&lookup, &format!("{prefix}_WINDOW_MS"))? {
                policy.window_ms = window;
            }
            rate_limits.insert(class, policy);
        }

        Ok(Self {
            mode,
            encryption_key: Secret::non_empty(lookup("AEGIS_ENCRYPTION_KEY")),
            password_pepper: Secret::non_empty(lookup("AEGIS_PASSWORD_PEPPER")),
            alerts,
            rate_limits,
            permission_catalog_path: lookup("AEGIS_PERMISSION_CATALOG")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Policy for an operation class (falls back to the built-in default).
    pub fn policy(&self, class: OperationClass) -> RateLimitPolicy {
        self.rate_limits
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_policy())
    }
}

fn parse_url(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Url>, ConfigError> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => Url::parse(raw.trim())
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rate_limit::StoreFailurePolicy;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_development_without_channels() {
        let config = SecurityConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.mode, DeploymentMode::Development);
        assert!(config.encryption_key.is_none());
        assert!(config.alerts.slack_webhook_url.is_none());
        assert_eq!(config.alerts.min_severity, Severity::High);
        assert_eq!(config.policy(OperationClass::Login).limit, 5);
    }

    #[test]
    fn reads_overrides_and_channels() {
        let config = SecurityConfig::from_lookup(lookup_from(&[
            ("AEGIS_ENV", "production"),
            ("AEGIS_ENCRYPTION_KEY", "k"),
            ("SECURITY_ALERT_WEBHOOK_URL", "https://hooks.example.com/sec"),
            ("SECURITY_ALERT_MIN_SEVERITY", "medium"),
            ("RATE_LIMIT_MFA_MAX", "3"),
            ("RATE_LIMIT_MFA_WINDOW_MS", "1000"),
        ]))
        .unwrap();
        assert!(config.mode.is_production());
        assert_eq!(config.encryption_key.as_ref().map(Secret::expose), Some("k"));
        assert!(config.alerts.webhook_url.is_some());
        assert_eq!(config.alerts.min_severity, Severity::Medium);
        let mfa = config.policy(OperationClass::Mfa);
        assert_eq!((mfa.limit, mfa.window_ms), (3, 1000));
        assert_eq!(mfa.on_store_error, StoreFailurePolicy::FailClosed);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(SecurityConfig::from_lookup(lookup_from(&[("AEGIS_ENV", "staging")])).is_err());
        assert!(
            SecurityConfig::from_lookup(lookup_from(&[("SECURITY_ALERT_WEBHOOK_URL", "not a url")]))
                .is_err()
        );
        assert!(SecurityConfig::from_lookup(lookup_from(&[("RATE_LIMIT_LOGIN_MAX", "-1")])).is_err());
    }
}
