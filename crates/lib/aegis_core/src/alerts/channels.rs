//! Webhook channels for security alerts.
//!
//! Each channel formats the alert for its receiver and performs a single
//! POST. Retries are not attempted: alerting is best effort and a slow
//! receiver must not hold up the others.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::AlertError;
use crate::config::Secret;
use crate::models::alerts::SecurityAlert;

/// Header carrying the callback signature.
pub const SIGNATURE_HEADER: &str = "X-Aegis-Signature";
const SIGNATURE_CONTEXT: &str = "aegis 2026-03 security alert webhook signature";

/// A destination for security alerts.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Stable name used in dispatch reports.
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &SecurityAlert) -> Result<(), AlertError>;
}

async fn post_json<T: Serialize + ?Sized>(
    client: &Client,
    url: &Url,
    body: &T,
) -> Result<(), AlertError> {
    let resp = client
        .post(url.clone())
        .json(body)
        .send()
        .await
        .map_err(|e| AlertError::Delivery(format!("request failed: {e}")))?;
    check_status(resp).await
}

async fn check_status(resp: reqwest::Response) -> Result<(), AlertError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(AlertError::Delivery(format!(
        "receiver returned {status}: {}",
        body.chars().take(200).collect::<String>()
    )))
}

fn detail_lines(alert: &SecurityAlert) -> String {
    alert
        .details
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("• {k}: {s}"),
            other => format!("• {k}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Slack-compatible chat webhook
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SlackPayload {
    text: String,
}

/// Incoming-webhook channel speaking the `{"text": ...}` format.
pub struct SlackChannel {
    client: Client,
    url: Url,
}

impl SlackChannel {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    fn payload(alert: &SecurityAlert) -> SlackPayload {
        let mut text = format!(
            "*[{}] {}*\n{}\n_type: {} · {}_",
            alert.severity.as_str().to_uppercase(),
            alert.title,
            alert.description,
            alert.alert_type,
            alert.occurred_at.to_rfc3339(),
        );
        let details = detail_lines(alert);
        if !details.is_empty() {
            text.push('\n');
            text.push_str(&details);
        }
        SlackPayload { text }
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, alert: &SecurityAlert) -> Result<(), AlertError> {
        post_json(&self.client, &self.url, &Self::payload(alert)).await
    }
}

// ---------------------------------------------------------------------------
// Discord webhook
// ---------------------------------------------------------------------------

// Embed limits enforced by Discord; longer values reject the whole message.
const DISCORD_CONTENT_MAX: usize = 2000;
const DISCORD_TITLE_MAX: usize = 256;
const DISCORD_DESCRIPTION_MAX: usize = 4096;
const DISCORD_FIELD_NAME_MAX: usize = 256;
const DISCORD_FIELD_VALUE_MAX: usize = 1024;

/// At most `max` characters of `s`, cut on a char boundary.
fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[derive(Serialize)]
struct DiscordPayload<'a> {
    content: String,
    embeds: [DiscordEmbed<'a>; 1],
}

#[derive(Serialize)]
struct DiscordEmbed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    fields: Vec<DiscordField>,
    timestamp: String,
}

#[derive(Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

pub struct DiscordChannel {
    client: Client,
    url: Url,
}

impl DiscordChannel {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    fn payload(alert: &SecurityAlert) -> DiscordPayload<'_> {
        let mut fields = vec![
            DiscordField {
                name: "Severity".into(),
                value: alert.severity.to_string(),
                inline: true,
            },
            DiscordField {
                name: "Type".into(),
                value: alert.alert_type.clone(),
                inline: true,
            },
        ];
        // Discord caps embeds at 25 fields.
        fields.extend(alert.details.iter().take(23).map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => clip(s, DISCORD_FIELD_VALUE_MAX).to_string(),
                other => clip(&other.to_string(), DISCORD_FIELD_VALUE_MAX).to_string(),
            };
            DiscordField {
                name: clip(k, DISCORD_FIELD_NAME_MAX).to_string(),
                value,
                inline: false,
            }
        }));

        let content = format!("Security alert: {}", alert.title);
        DiscordPayload {
            content: clip(&content, DISCORD_CONTENT_MAX).to_string(),
            embeds: [DiscordEmbed {
                title: clip(&alert.title, DISCORD_TITLE_MAX),
                description: clip(&alert.description, DISCORD_DESCRIPTION_MAX),
                color: alert.severity.color(),
                fields,
                timestamp: alert.occurred_at.to_rfc3339(),
            }],
        }
    }
}

#[async_trait]
impl AlertChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, alert: &SecurityAlert) -> Result<(), AlertError> {
        post_json(&self.client, &self.url, &Self::payload(alert)).await
    }
}

// ---------------------------------------------------------------------------
// Generic signed HTTP callback
// ---------------------------------------------------------------------------

/// Posts the alert JSON as-is. With a secret configured, the body is signed
/// with a BLAKE3 keyed MAC in [`SIGNATURE_HEADER`].
pub struct HttpCallbackChannel {
    client: Client,
    url: Url,
    secret: Option<Secret>,
}

impl HttpCallbackChannel {
    pub fn new(client: Client, url: Url, secret: Option<Secret>) -> Self {
        Self {
            client,
            url,
            secret,
        }
    }
}

/// Hex MAC of `body` under `secret`. Receivers recompute and compare.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let key = blake3::derive_key(SIGNATURE_CONTEXT, secret.as_bytes());
    blake3::keyed_hash(&key, body).to_hex().to_string()
}

#[async_trait]
impl AlertChannel for HttpCallbackChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, alert: &SecurityAlert) -> Result<(), AlertError> {
        let body = serde_json::to_vec(alert)
            .map_err(|e| AlertError::Delivery(format!("cannot encode alert: {e}")))?;

        let mut request = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_body(secret.expose(), &body));
        }

        let resp = request
            .body(body)
            .send()
            .await
            .map_err(|e| AlertError::Delivery(format!("request failed: {e}")))?;
        check_status(resp).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::alerts::Severity;

    fn alert() -> SecurityAlert {
        SecurityAlert::new(
            Severity::High,
            "brute_force",
            "Repeated login failures",
            "5 failed logins in 15 minutes",
        )
        .detail("ip", "203.0.113.7")
        .detail("attempts", 5)
    }

    #[test]
    fn slack_payload_is_text_only() {
        let value = serde_json::to_value(SlackChannel::payload(&alert())).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        let text = obj["text"].as_str().unwrap();
        assert!(text.contains("[HIGH] Repeated login failures"));
        assert!(text.contains("ip: 203.0.113.7"));
        assert!(text.contains("attempts: 5"));
    }

    #[test]
    fn discord_payload_has_embed() {
        let a = alert();
        let value = serde_json::to_value(DiscordChannel::payload(&a)).unwrap();
        assert!(value["content"].as_str().unwrap().contains("Repeated login failures"));
        let embed = &value["embeds"][0];
        assert_eq!(embed["color"], json!(Severity::High.color()));
        assert_eq!(embed["fields"][0]["value"], json!("high"));
        assert_eq!(embed["fields"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn discord_payload_respects_embed_limits() {
        let long = "é".repeat(5000);
        let a = SecurityAlert::new(Severity::Critical, "brute_force", long.clone(), long.clone())
            .detail(long.clone(), long.clone());
        let value = serde_json::to_value(DiscordChannel::payload(&a)).unwrap();
        let chars = |v: &serde_json::Value| v.as_str().unwrap().chars().count();
        assert_eq!(chars(&value["content"]), 2000);
        let embed = &value["embeds"][0];
        assert_eq!(chars(&embed["title"]), 256);
        assert_eq!(chars(&embed["description"]), 4096);
        assert_eq!(chars(&embed["fields"][2]["name"]), 256);
        assert_eq!(chars(&embed["fields"][2]["value"]), 1024);
        assert_eq!(clip("short", 256), "short");
    }

    #[test]
    fn signature_depends_on_secret_and_body() {
        let a = sign_body("s1", b"{}");
        assert_eq!(a, sign_body("s1", b"{}"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, sign_body("s2", b"{}"));
        assert_ne!(a, sign_body("s1", b"{ }"));
    }
}
