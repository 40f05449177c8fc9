//! Availability probing.
//!
//! One probe = one query to the reservation provider for a single
//! (instant, party size, service) combination. The loop here owns the two
//! traffic-shaping rules: every outbound call consumes exactly one
//! rate-limiter admission, and consecutive calls are separated by a small
//! random stagger.

pub mod wisely;

pub use wisely::WiselyClient;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use metrics::counter;
use rand::Rng;

use crate::grid::{ProbeInstant, Service};
use crate::ratelimit::RateLimiter;

/// One query to the provider.
#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub merchant_id: String,
    pub service: Service,
    pub party_size: u32,
    pub at: DateTime<FixedOffset>,
}

impl SlotQuery {
    /// The provider takes the search instant as epoch milliseconds.
    pub fn search_ts_ms(&self) -> i64 {
        self.at.timestamp_millis()
    }
}

/// One bookable opening returned by the provider.
///
/// `date_label`/`time_label` are venue-local display strings; together with
/// party size and service they form the slot's uniqueness key. `at` is the
/// resolved instant when the wire payload allowed one.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Slot {
    pub date_label: String,
    pub time_label: String,
    pub party_size: u32,
    pub service: String,
    pub reservation_type_id: u32,
    pub at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub search_ts_ms: i64,
}

impl Slot {
    /// Uniqueness key: `date|time|party|service`.
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.date_label, self.time_label, self.party_size, self.service
        )
    }
}

#[async_trait::async_trait]
pub trait AvailabilityClient: Send + Sync {
    async fn search(&self, q: &SlotQuery) -> Result<Vec<Slot>>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub struct ProbeOutcome {
    pub slots: Vec<Slot>,
    /// Calls actually issued (each consumed one limiter admission).
    pub sent: u32,
    /// Issued calls that failed; these still count against the ceiling.
    pub errors: u32,
    /// Grid entries skipped because the hourly ceiling was reached.
    pub skipped: u32,
}

/// Walk the grid in order, querying the provider for each instant.
///
/// When an admission is refused the rest of the grid is dropped for this
/// invocation; the remaining budget belongs to future runs. A failing probe
/// is logged and skipped, never escalated.
pub async fn probe_grid(
    client: &dyn AvailabilityClient,
    merchant_id: &str,
    grid: &[ProbeInstant],
    limiter: &RateLimiter,
    calls: &mut Vec<DateTime<Utc>>,
    stagger_ms: (u64, u64),
) -> ProbeOutcome {
    let mut out = ProbeOutcome::default();

    for (i, instant) in grid.iter().enumerate() {
        if !limiter.admit(calls, Utc::now()) {
            out.skipped = (grid.len() - i) as u32;
            counter!("probe_rate_limited_total").increment(out.skipped as u64);
            tracing::warn!(
                skipped = out.skipped,
                "hourly call ceiling reached, dropping remaining probes"
            );
            break;
        }

        stagger(stagger_ms).await;

        let q = SlotQuery {
            merchant_id: merchant_id.to_string(),
            service: instant.service.clone(),
            party_size: instant.party_size,
            at: instant.at,
        };
        out.sent += 1;
        counter!("probe_calls_total").increment(1);

        match client.search(&q).await {
            Ok(mut slots) => out.slots.append(&mut slots),
            Err(e) => {
                out.errors += 1;
                counter!("probe_errors_total").increment(1);
                tracing::warn!(
                    error = ?e,
                    at = %instant.at,
                    party = instant.party_size,
                    "probe failed"
                );
            }
        }
    }

    out
}

/// Bounded random delay between calls to avoid a bursty traffic pattern.
async fn stagger((lo, hi): (u64, u64)) {
    if hi == 0 {
        return;
    }
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let ms = rand::rng().random_range(lo..=hi);
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}
