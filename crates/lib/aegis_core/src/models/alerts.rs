//! Security alert models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Embed colour used by chat channels.
    pub fn color(&self) -> u32 {
        match self {
            Severity::Info => 0x3498db,
            Severity::Low => 0x2ecc71,
            Severity::Medium => 0xf1c40f,
            Severity::High => 0xe67e22,
            Severity::Critical => 0xe74c3c,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A high-severity security event for external channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlert {
    pub severity: Severity,
    /// Machine-readable type, e.g. `brute_force`.
    #[serde(rename = "type")]
    pub alert_type: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

impl SecurityAlert {
    pub fn new(
        severity: Severity,
        alert_type: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            alert_type: alert_type.into(),
            title: title.into(),
            description: description.into(),
            details: serde_json::Map::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Per-channel delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

/// Result of a fan-out. `outcomes` holds one entry per configured channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
    /// Set when the alert was below the configured severity floor.
    #[serde(default)]
    pub suppressed: bool,
}

impl DispatchReport {
    pub fn sent(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == DeliveryStatus::Sent)
            .map(|o| o.channel.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DeliveryStatus::Failed(_)))
            .map(|o| o.channel.as_str())
    }

    pub fn status_of(&self, channel: &str) -> Option<&DeliveryStatus> {
        self.outcomes
            .iter()
            .find(|o| o.channel == channel)
            .map(|o| &o.status)
    }
}
