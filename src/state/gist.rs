//! GitHub Gist backed state store.
//!
//! A private gist holds one JSON file per watcher key, so state survives
//! across scheduler-hosted runs without any infrastructure of our own.
//! Writes are last-writer-wins: the PATCH is a single small request, and
//! the engine only issues it once per invocation, after all decisions.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{StateStore, WatcherState};

const API_BASE: &str = "https://api.github.com/gists";
const USER_AGENT: &str = concat!("tablewatch/", env!("CARGO_PKG_VERSION"));

pub struct GistStore {
    gist_id: String,
    token: String,
    client: Client,
}

#[derive(Deserialize)]
struct GistResponse {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Deserialize)]
struct GistFile {
    content: Option<String>,
}

impl GistStore {
    pub fn new(gist_id: String, token: String) -> Self {
        Self {
            gist_id,
            token,
            client: Client::new(),
        }
    }

    /// Build from `GIST_ID` / `GIST_TOKEN` if both are set.
    pub fn from_env() -> Option<Self> {
        let gist_id = std::env::var("GIST_ID").ok()?;
        let token = std::env::var("GIST_TOKEN").ok()?;
        Some(Self::new(gist_id, token))
    }

    fn url(&self) -> String {
        format!("{API_BASE}/{}", self.gist_id)
    }

    fn file_name(key: &str) -> String {
        format!("{key}.json")
    }
}

#[async_trait::async_trait]
impl StateStore for GistStore {
    async fn load(&self, key: &str) -> Result<WatcherState> {
        let resp: GistResponse = self
            .client
            .get(self.url())
            .timeout(Duration::from_secs(15))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .context("fetch gist")?
            .error_for_status()
            .context("gist non-2xx")?
            .json()
            .await
            .context("decode gist response")?;

        match resp
            .files
            .get(&Self::file_name(key))
            .and_then(|f| f.content.as_deref())
        {
            Some(content) => {
                serde_json::from_str(content).with_context(|| format!("parse gist state {key}"))
            }
            None => Ok(WatcherState::default()),
        }
    }

    async fn save(&self, key: &str, state: &WatcherState) -> Result<()> {
        let content = serde_json::to_string(state).context("encode state")?;
        let mut files = serde_json::Map::new();
        files.insert(
            Self::file_name(key),
            serde_json::json!({ "content": content }),
        );
        let payload = serde_json::json!({ "files": files });

        self.client
            .patch(self.url())
            .timeout(Duration::from_secs(15))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .json(&payload)
            .send()
            .await
            .context("patch gist")?
            .error_for_status()
            .context("gist patch non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gist"
    }
}
