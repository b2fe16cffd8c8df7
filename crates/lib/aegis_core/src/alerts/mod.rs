// @awa-component: SEC-AlertDispatcher
//
//! Best-effort fan-out of security alerts to webhook channels.
//!
//! Channels are read from [`AlertConfig`] once. Each delivery is bounded by
//! its own timeout and a failing channel never affects the others. The
//! dispatcher does not write audit entries and the audit logger does not
//! call the dispatcher.

pub mod channels;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::models::alerts::{ChannelOutcome, DeliveryStatus, DispatchReport, SecurityAlert, Severity};
use crate::task::spawn_best_effort;

pub use channels::{
    AlertChannel, DiscordChannel, HttpCallbackChannel, SIGNATURE_HEADER, SlackChannel, sign_body,
};

/// Alert errors.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Fans alerts out to the configured channels.
#[derive(Clone)]
pub struct SecurityAlertDispatcher {
    channels: Vec<Arc<dyn AlertChannel>>,
    min_severity: Severity,
    timeout: Duration,
}

impl SecurityAlertDispatcher {
    /// Build channels from configuration. Unset URLs are skipped.
    pub fn from_config(config: &AlertConfig) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AlertError::Configuration(format!("HTTP client: {e}")))?;

        let mut channels: Vec<Arc<dyn AlertChannel>> = Vec::new();
        if let Some(url) = &config.slack_webhook_url {
            channels.push(Arc::new(SlackChannel::new(client.clone(), url.clone())));
        }
        if let Some(url) = &config.discord_webhook_url {
            channels.push(Arc::new(DiscordChannel::new(client.clone(), url.clone())));
        }
        if let Some(url) = &config.webhook_url {
            channels.push(Arc::new(HttpCallbackChannel::new(
                client.clone(),
                url.clone(),
                config.webhook_secret.clone(),
            )));
        }

        if channels.is_empty() {
            info!("no security alert channels configured");
        }
        Ok(Self::with_channels(channels, config.min_severity, config.timeout))
    }

    pub fn with_channels(
        channels: Vec<Arc<dyn AlertChannel>>,
        min_severity: Severity,
        timeout: Duration,
    ) -> Self {
        Self {
            channels,
            min_severity,
            timeout,
        }
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    /// Send to every channel concurrently. Alerts below the severity floor
    /// are not sent and the report is flagged `suppressed`.
    pub async fn dispatch(&self, alert: &SecurityAlert) -> DispatchReport {
        if alert.severity < self.min_severity {
            debug!(
                severity = %alert.severity,
                floor = %self.min_severity,
                alert_type = %alert.alert_type,
                "alert below severity floor"
            );
            return DispatchReport {
                outcomes: Vec::new(),
                suppressed: true,
            };
        }
        self.fan_out(alert).await
    }

    async fn fan_out(&self, alert: &SecurityAlert) -> DispatchReport {
        let deliveries = self.channels.iter().map(|channel| async move {
            let status = match tokio::time::timeout(self.timeout, channel.send(alert)).await {
                Ok(Ok(())) => DeliveryStatus::Sent,
                Ok(Err(e)) => DeliveryStatus::Failed(e.to_string()),
                Err(_) => DeliveryStatus::Failed(AlertError::Timeout(self.timeout).to_string()),
            };
            if let DeliveryStatus::Failed(reason) = &status {
                warn!(channel = channel.name(), alert_type = %alert.alert_type, %reason, "alert delivery failed");
            }
            ChannelOutcome {
                channel: channel.name().to_string(),
                status,
            }
        });

        let report = DispatchReport {
            outcomes: join_all(deliveries).await,
            suppressed: false,
        };
        info!(
            alert_type = %alert.alert_type,
            sent = report.sent().count(),
            failed = report.failed().count(),
            "security alert dispatched"
        );
        report
    }

    /// Dispatch on a detached task. Never blocks or fails the caller.
    pub fn dispatch_detached(&self, alert: SecurityAlert) -> JoinHandle<()> {
        let dispatcher = self.clone();
        let budget = self.timeout + Duration::from_secs(1);
        spawn_best_effort("alerts.dispatch", budget, async move {
            dispatcher.dispatch(&alert).await;
            Ok::<(), AlertError>(())
        })
    }

    /// Send a synthetic `info` alert to every channel, ignoring the severity floor.
    pub async fn self_test(&self) -> DispatchReport {
        let alert = SecurityAlert::new(
            Severity::Info,
            "channel_test",
            "Security alert channel test",
            "Synthetic alert sent to verify channel configuration.",
        );
        self.fan_out(&alert).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use tokio::sync::Mutex;
    use url::Url;

    use super::*;
    use crate::config::Secret;

    type Captured = Arc<Mutex<Vec<(HeaderMap, serde_json::Value)>>>;

    async fn receiver() -> (Url, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(c): State<Captured>, headers: HeaderMap, body: Bytes| async move {
                        let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
                        c.lock().await.push((headers, value));
                        "ok"
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/hook").parse().unwrap(), captured)
    }

    fn unreachable() -> Url {
        "http://127.0.0.1:1/hook".parse().unwrap()
    }

    fn high_alert() -> SecurityAlert {
        SecurityAlert::new(Severity::High, "brute_force", "Login failures", "Too many")
            .detail("ip", "198.51.100.4")
    }

    struct Slow;

    #[async_trait]
    impl AlertChannel for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn send(&self, _: &SecurityAlert) -> Result<(), AlertError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    struct Counting(AtomicUsize);

    #[async_trait]
    impl AlertChannel for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn send(&self, _: &SecurityAlert) -> Result<(), AlertError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_others() {
        let (url, captured) = receiver().await;
        let dispatcher = SecurityAlertDispatcher::from_config(&AlertConfig {
            slack_webhook_url: Some(url),
            discord_webhook_url: Some(unreachable()),
            ..AlertConfig::default()
        })
        .unwrap();

        let report = dispatcher.dispatch(&high_alert()).await;
        assert!(!report.suppressed);
        assert_eq!(report.status_of("slack"), Some(&DeliveryStatus::Sent));
        assert!(matches!(report.status_of("discord"), Some(DeliveryStatus::Failed(_))));
        assert_eq!(report.status_of("webhook"), None);

        let received = captured.lock().await;
        assert_eq!(received.len(), 1);
        assert!(received[0].1["text"].as_str().unwrap().contains("Login failures"));
    }

    #[tokio::test]
    async fn slow_channel_times_out_independently() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let dispatcher = SecurityAlertDispatcher::with_channels(
            vec![Arc::new(Slow), counting.clone()],
            Severity::Low,
            Duration::from_millis(50),
        );
        let report = dispatcher.dispatch(&high_alert()).await;
        assert!(matches!(report.status_of("slow"), Some(DeliveryStatus::Failed(r)) if r.contains("Timed out")));
        assert_eq!(report.status_of("counting"), Some(&DeliveryStatus::Sent));
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_is_signed_when_secret_configured() {
        let (url, captured) = receiver().await;
        let dispatcher = SecurityAlertDispatcher::from_config(&AlertConfig {
            webhook_url: Some(url),
            webhook_secret: Some(Secret::new("hook-secret")),
            ..AlertConfig::default()
        })
        .unwrap();
        let alert = high_alert();
        let report = dispatcher.dispatch(&alert).await;
        assert_eq!(report.status_of("webhook"), Some(&DeliveryStatus::Sent));

        let received = captured.lock().await;
        let (headers, body) = &received[0];
        assert_eq!(body["type"], "brute_force");
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        let expected = sign_body("hook-secret", &serde_json::to_vec(&alert).unwrap());
        assert_eq!(signature, expected);
    }

    #[tokio::test]
    async fn below_floor_is_suppressed_and_self_test_bypasses_it() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let dispatcher = SecurityAlertDispatcher::with_channels(
            vec![counting.clone()],
            Severity::High,
            Duration::from_secs(1),
        );
        let low = SecurityAlert::new(Severity::Low, "noise", "t", "d");
        let report = dispatcher.dispatch(&low).await;
        assert!(report.suppressed);
        assert!(report.outcomes.is_empty());
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);

        let report = dispatcher.self_test().await;
        assert_eq!(report.sent().collect::<Vec<_>>(), vec!["counting"]);
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_channels_is_an_empty_report() {
        let dispatcher = SecurityAlertDispatcher::from_config(&AlertConfig::default()).unwrap();
        assert!(dispatcher.channel_names().is_empty());
        let report = dispatcher.dispatch(&high_alert()).await;
        assert!(report.outcomes.is_empty());
        assert!(!report.suppressed);
    }

    #[tokio::test]
    async fn detached_dispatch_completes() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let dispatcher = SecurityAlertDispatcher::with_channels(
            vec![counting.clone(), Arc::new(Slow)],
            Severity::Info,
            Duration::from_millis(20),
        );
        dispatcher.dispatch_detached(high_alert()).await.unwrap();
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }
}
