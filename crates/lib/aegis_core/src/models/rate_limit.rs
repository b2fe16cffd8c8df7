//! Rate limiting models and per-operation policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Result of a rate-limit check. Being limited is an expected outcome the
/// caller branches on, so it is a value rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_in_ms: u64,
}

impl RateLimitDecision {
    pub fn denied(reset_in_ms: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_in_ms,
        }
    }
}

/// What to do when the backing store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// Deny the operation. Required for authentication-class operations.
    FailClosed,
    /// Admit the operation. Only for low-risk telemetry.
    FailOpen,
}

/// Operation classes with configured default limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Login,
    Register,
    Mfa,
    Redemption,
    ContactForm,
    Telemetry,
}

impl OperationClass {
    pub const ALL: [OperationClass; 6] = [
        OperationClass::Login,
        OperationClass::Register,
        OperationClass::Mfa,
        OperationClass::Redemption,
        OperationClass::ContactForm,
        OperationClass::Telemetry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Login => "login",
            OperationClass::Register => "register",
            OperationClass::Mfa => "mfa",
            OperationClass::Redemption => "redemption",
            OperationClass::ContactForm => "contact_form",
            OperationClass::Telemetry => "telemetry",
        }
    }

    /// Composite identifier for a subject under this class, e.g. `login:203.0.113.7`.
    pub fn identifier(&self, subject: &str) -> String {
        format!("{}:{subject}", self.as_str())
    }

    /// Class whose namespace `identifier` falls in, if any.
    pub fn of_identifier(identifier: &str) -> Option<OperationClass> {
        let (prefix, _) = identifier.split_once(':')?;
        prefix.trim().to_ascii_lowercase().parse().ok()
    }

    /// Classes counted by the server's own login and registration flows.
    pub fn is_server_owned(&self) -> bool {
        matches!(self, OperationClass::Login | OperationClass::Register)
    }

    /// Built-in policy for this class.
    pub fn default_policy(&self) -> RateLimitPolicy {
        match self {
            OperationClass::Login => RateLimitPolicy::fail_closed(5, 15 * 60_000),
            OperationClass::Register => RateLimitPolicy::fail_closed(5, 60 * 60_000),
            OperationClass::Mfa => RateLimitPolicy::fail_closed(5, 5 * 60_000),
            OperationClass::Redemption => RateLimitPolicy::fail_closed(10, 60 * 60_000),
            OperationClass::ContactForm => RateLimitPolicy::fail_closed(3, 60 * 60_000),
            OperationClass::Telemetry => RateLimitPolicy {
                limit: 120,
                window_ms: 60_000,
                on_store_error: StoreFailurePolicy::FailOpen,
            },
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationClass::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown operation class: {s}"))
    }
}

/// Limit, window and store-failure behaviour for one operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window_ms: u64,
    pub on_store_error: StoreFailurePolicy,
}

impl RateLimitPolicy {
    pub fn fail_closed(limit: u32, window_ms: u64) -> Self {
        Self {
            limit,
            window_ms,
            on_store_error: StoreFailurePolicy::FailClosed,
        }
    }
}
