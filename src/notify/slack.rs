use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::{Notifier, SlotAlert};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: Client::new(),
        }
    }

    /// Enabled only when `SLACK_WEBHOOK` is set.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SLACK_WEBHOOK").ok()?;
        Some(Self::new(url))
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, alert: &SlotAlert) -> Result<()> {
        let mut text = format!("*{}*\n{}", alert.title, alert.message);
        if let Some(url) = &alert.url {
            text.push_str(&format!("\n<{}|{}>", url, alert.url_title));
        }
        let body = serde_json::json!({ "text": text });

        self.client
            .post(&self.webhook_url)
            .timeout(Duration::from_secs(10))
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
