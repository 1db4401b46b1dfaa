//! Webhook delivery for fired alerts.
//!
//! Posts Discord-compatible JSON to a configured webhook URL. Delivery is
//! best-effort: failures are logged and never propagate into the poll cycle.

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::model::TriggerKind;

pub struct Notifier {
    webhook_url: Option<String>,
    http: reqwest::Client,
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct WebhookMessage {
    content: String,
    username: String,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>, enabled: bool) -> Self {
        Self {
            enabled: enabled && webhook_url.is_some(),
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, message: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let Some(ref url) = self.webhook_url else {
            return Ok(());
        };

        let payload = WebhookMessage {
            content: message.to_string(),
            username: "AceWatch".to_string(),
        };

        match self.http.post(url).json(&payload).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    warn!(
                        status = %response.status(),
                        "Webhook returned non-success status"
                    );
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to deliver webhook");
            }
        }

        Ok(())
    }

    /// Deliver a fired alert. Always logged; pushed to the webhook when one
    /// is configured.
    pub async fn alert_fired(
        &self,
        user_id: i64,
        match_label: &str,
        trigger: TriggerKind,
    ) -> Result<()> {
        let headline = match trigger {
            TriggerKind::MatchStarted => "Match started",
            TriggerKind::TieBreak => "Tie break",
            TriggerKind::ThirdSet => "Third set underway",
            TriggerKind::MatchFinished => "Match finished",
        };

        let msg = format!(
            "**{headline}**\n\
             Match: {match_label}\n\
             Trigger: {trigger}\n\
             User: {user_id}"
        );
        self.send(&msg).await
    }

    /// Report a failed ingest cycle so operators hear about persistent
    /// upstream trouble.
    pub async fn ingest_failed(&self, cycle: u64, error: &str) -> Result<()> {
        let msg = format!(
            "**Ingest cycle failed**\n\
             Cycle: {cycle}\n\
             Error: {error}"
        );
        self.send(&msg).await
    }
}
