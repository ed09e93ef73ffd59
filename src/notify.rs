//! Discord webhook notification for successful redemptions.
//!
//! Sending is fire-and-forget: by the time a notification goes out the
//! redemption is already committed, and a failed send only produces a log line.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::{RedeemError, Result};

/// Embed accent color (0x7c20ed).
pub const EMBED_COLOR: u32 = 8_134_893;

const DISCORD_WEBHOOK_MARKER: &str = "discord.com/api/webhooks/";

#[derive(Clone, Debug)]
pub struct RedemptionNotice {
    pub username: String,
    pub code: String,
    pub remaining_uses: u32,
    pub at: DateTime<Utc>,
}

/// Message text; the last place gets a closing message that reveals the code.
pub fn describe(notice: &RedemptionNotice) -> String {
    if notice.remaining_uses == 0 {
        format!(
            "Congratulations {}, you got today's video reward! There are no places left, the code was {}",
            notice.username, notice.code
        )
    } else {
        format!(
            "Congratulations {}, you got today's video reward! {} place(s) left, go watch the new video quickly",
            notice.username, notice.remaining_uses
        )
    }
}

pub fn build_payload(notice: &RedemptionNotice) -> Value {
    json!({
        "embeds": [{
            "description": describe(notice),
            "color": EMBED_COLOR,
            "timestamp": notice.at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }]
    })
}

/// Empty (notifications off) or a Discord webhook URL.
pub fn is_valid_webhook_url(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url.contains(DISCORD_WEBHOOK_MARKER)
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, webhook_url: &str, notice: &RedemptionNotice) -> Result<()>;
}

pub struct DiscordWebhook {
    client: reqwest::Client,
}

impl DiscordWebhook {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn send(&self, webhook_url: &str, notice: &RedemptionNotice) -> Result<()> {
        let response = self
            .client
            .post(webhook_url)
            .json(&build_payload(notice))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RedeemError::Custom(format!(
                "Webhook responded with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Send `notice` on a background task, logging the outcome.
pub fn spawn_notification(
    notifier: Arc<dyn Notifier>,
    webhook_url: String,
    notice: RedemptionNotice,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.send(&webhook_url, &notice).await {
            Ok(()) => tracing::info!(username = %notice.username, "Webhook sent"),
            Err(e) => tracing::error!(username = %notice.username, error = %e, "Webhook failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notice(remaining: u32) -> RedemptionNotice {
        RedemptionNotice {
            username: "Alice".into(),
            code: "TESTE".into(),
            remaining_uses: remaining,
            at: Utc.with_ymd_and_hms(2025, 6, 15, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_wording_branches_on_last_place() {
        let last = describe(&notice(0));
        assert!(last.contains("no places left"));
        assert!(last.contains("TESTE"));

        let more = describe(&notice(3));
        assert!(more.contains("3 place(s) left"));
        assert!(!more.contains("TESTE"));
    }

    #[test]
    fn test_payload_shape() {
        let payload = build_payload(&notice(1));
        let embed = &payload["embeds"][0];
        assert_eq!(embed["color"], 8134893);
        assert_eq!(EMBED_COLOR, 0x7c20ed);
        assert_eq!(embed["timestamp"], "2025-06-15T10:30:00.000Z");
        assert!(embed["description"].as_str().unwrap().contains("Alice"));
    }

    #[test]
    fn test_webhook_url_validation() {
        assert!(is_valid_webhook_url(""));
        assert!(is_valid_webhook_url("https://discord.com/api/webhooks/123/abc"));
        assert!(!is_valid_webhook_url("https://example.com/hook"));
    }

    #[tokio::test]
    async fn test_posts_json_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/1/token"))
            .and(header("content-type", "application/json"))
            .and(body_json(build_payload(&notice(1))))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = DiscordWebhook::new(reqwest::Client::new());
        let url = format!("{}/api/webhooks/1/token", server.uri());
        webhook.send(&url, &notice(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let webhook = DiscordWebhook::new(reqwest::Client::new());
        let result = webhook.send(&server.uri(), &notice(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_spawned_failure_does_not_panic() {
        let webhook: Arc<dyn Notifier> = Arc::new(DiscordWebhook::new(reqwest::Client::new()));
        // Nothing listens on port 9
        let handle = spawn_notification(webhook, "http://127.0.0.1:9/hook".into(), notice(0));
        handle.await.unwrap();
    }
}
