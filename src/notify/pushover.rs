use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::{Notifier, SlotAlert};

const API_URL: &str = "https://api.pushover.net/1/messages.json";

pub struct PushoverNotifier {
    token: String,
    user: String,
    client: Client,
}

impl PushoverNotifier {
    pub fn new(token: String, user: String) -> Self {
        Self {
            token,
            user,
            client: Client::new(),
        }
    }

    /// Enabled only when both `PUSHOVER_TOKEN` and `PUSHOVER_USER` are set.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("PUSHOVER_TOKEN").ok()?;
        let user = std::env::var("PUSHOVER_USER").ok()?;
        Some(Self::new(token, user))
    }
}

#[async_trait::async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, alert: &SlotAlert) -> Result<()> {
        let mut form: Vec<(&str, String)> = vec![
            ("token", self.token.clone()),
            ("user", self.user.clone()),
            ("title", alert.title.clone()),
            ("message", alert.message.clone()),
            ("priority", alert.priority.to_string()),
        ];
        if let Some(sound) = &alert.sound {
            form.push(("sound", sound.clone()));
        }
        if let Some(url) = &alert.url {
            form.push(("url", url.clone()));
            form.push(("url_title", alert.url_title.clone()));
        }

        self.client
            .post(API_URL)
            .timeout(Duration::from_secs(10))
            .form(&form)
            .send()
            .await
            .context("pushover post")?
            .error_for_status()
            .context("pushover non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "pushover"
    }
}
