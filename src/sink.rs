//! Append-only observation log.
//!
//! Every slot the prober sees is appended here, before the notification
//! throttle runs. This is the analytics record (first-seen collapsing is a
//! downstream read concern) and is entirely independent of the anti-spam
//! state. A sink failure costs history, never a run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::probe::Slot;

/// One observed slot, as logged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    pub observed_at: DateTime<Utc>,
    pub slot_key: String,
    pub date_label: String,
    pub time_label: String,
    pub party_size: u32,
    pub service: String,
    pub slot_at: Option<DateTime<Utc>>,
    /// Seconds between observation and the slot itself, when the slot's
    /// instant resolved from the wire.
    pub lead_secs: Option<i64>,
    pub url: Option<String>,
}

impl ObservationRow {
    pub fn from_slot(slot: &Slot, observed_at: DateTime<Utc>) -> Self {
        Self {
            observed_at,
            slot_key: slot.key(),
            date_label: slot.date_label.clone(),
            time_label: slot.time_label.clone(),
            party_size: slot.party_size,
            service: slot.service.clone(),
            slot_at: slot.at,
            lead_secs: slot
                .at
                .map(|at| at.signed_duration_since(observed_at).num_seconds()),
            url: slot.url.clone(),
        }
    }
}

#[async_trait::async_trait]
pub trait ObservationSink: Send + Sync {
    async fn append(&self, rows: &[ObservationRow]) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// JSON-lines file sink, one row per line.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl ObservationSink for JsonlSink {
    async fn append(&self, rows: &[ObservationRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("create sink dir {}", parent.display()))?;
            }
        }

        let mut buf = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buf, row).context("encode observation row")?;
            buf.push(b'\n');
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("open observation log {}", self.path.display()))?;
        file.write_all(&buf).await.context("append observations")?;
        file.flush().await.context("flush observations")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

/// Used when no observation log is configured.
pub struct NullSink;

#[async_trait::async_trait]
impl ObservationSink for NullSink {
    async fn append(&self, _rows: &[ObservationRow]) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
