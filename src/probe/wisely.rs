//! HTTP client for the Wisely reservations inventory endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{AvailabilityClient, Slot, SlotQuery};

const DEFAULT_BASE_URL: &str = "https://loyaltyapi.wisely.io/v2/web/reservations/inventory";
const USER_AGENT: &str = concat!("tablewatch/", env!("CARGO_PKG_VERSION"));

pub struct WiselyClient {
    base_url: String,
    client: Client,
}

// Wire shape: { "types": [ { "reservation_type_id": ..., "times": [...] } ] }
#[derive(Debug, Deserialize)]
struct InventoryResponse {
    #[serde(default)]
    types: Vec<TypeBlock>,
}

#[derive(Debug, Deserialize)]
struct TypeBlock {
    reservation_type_id: Option<u32>,
    #[serde(default)]
    times: Vec<TimeEntry>,
}

#[derive(Debug, Deserialize)]
struct TimeEntry {
    time: Option<String>,
    label: Option<String>,
    display_time: Option<String>,
    booking_url: Option<String>,
    reserve_url: Option<String>,
}

impl WiselyClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            base_url,
            client: Client::new(),
        }
    }

    /// Honors `WISELY_BASE_URL` for staging/testing overrides.
    pub fn from_env() -> Self {
        match std::env::var("WISELY_BASE_URL") {
            Ok(url) => Self::with_base_url(url),
            Err(_) => Self::new(),
        }
    }
}

impl Default for WiselyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AvailabilityClient for WiselyClient {
    async fn search(&self, q: &SlotQuery) -> Result<Vec<Slot>> {
        let resp: InventoryResponse = self
            .client
            .get(&self.base_url)
            .timeout(Duration::from_secs(15))
            .query(&[
                ("merchant_id", q.merchant_id.clone()),
                ("party_size", q.party_size.to_string()),
                (
                    "reservation_type_id",
                    q.service.reservation_type_id.to_string(),
                ),
                ("search_ts", q.search_ts_ms().to_string()),
                ("show_reservation_types", "1".to_string()),
                ("limit", "3".to_string()),
            ])
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .context("inventory request")?
            .error_for_status()
            .context("inventory non-2xx")?
            .json()
            .await
            .context("decode inventory response")?;

        let mut slots = Vec::new();
        for block in resp.types {
            if block.reservation_type_id != Some(q.service.reservation_type_id) {
                continue;
            }
            for entry in block.times {
                let label = entry.label.as_deref().or(entry.display_time.as_deref());
                let (date_label, time_label, at) =
                    resolve_when(entry.time.as_deref(), label, q.at);
                slots.push(Slot {
                    date_label,
                    time_label,
                    party_size: q.party_size,
                    service: q.service.name.clone(),
                    reservation_type_id: q.service.reservation_type_id,
                    at,
                    url: entry.booking_url.or(entry.reserve_url),
                    search_ts_ms: q.search_ts_ms(),
                });
            }
        }
        Ok(slots)
    }

    fn name(&self) -> &'static str {
        "wisely"
    }
}

/// Resolve a slot's display date/time and, when possible, its instant.
///
/// Preference order: the wire ISO timestamp, then a `h:MM AM` label
/// re-anchored on the probed instant's date, then the probed instant with
/// the raw label as-is.
fn resolve_when(
    iso: Option<&str>,
    label: Option<&str>,
    probed: DateTime<FixedOffset>,
) -> (String, String, Option<DateTime<Utc>>) {
    if let Some(iso) = iso {
        if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
            let local = dt.with_timezone(probed.offset());
            return (
                fmt_date(&local),
                fmt_time(&local),
                Some(dt.with_timezone(&Utc)),
            );
        }
    }

    let label = label.map(str::trim).unwrap_or_default();
    if !label.is_empty() {
        if let Ok(t) = NaiveTime::parse_from_str(&label.to_uppercase(), "%I:%M %p") {
            if let Some(local) = probed
                .offset()
                .from_local_datetime(&probed.date_naive().and_time(t))
                .single()
            {
                return (
                    fmt_date(&local),
                    fmt_time(&local),
                    Some(local.with_timezone(&Utc)),
                );
            }
        }
        return (fmt_date(&probed), label.to_string(), None);
    }

    (fmt_date(&probed), "(time?)".to_string(), None)
}

fn fmt_date(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%a %b %d").to_string()
}

fn fmt_time(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%-I:%M %p").to_string()
}
