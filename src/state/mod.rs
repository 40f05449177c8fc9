//! Persisted per-watcher state.
//!
//! Invocations are short-lived and share nothing in memory, so everything a
//! run needs to remember (rate-limit call log, last-notified map) is loaded
//! at the start and written back once, after all decisions are final.

pub mod file;
pub mod gist;

pub use file::FileStore;
pub use gist::GistStore;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything one logical watcher carries between invocations.
///
/// `version` increments once per run; the file store uses it to detect a
/// concurrent writer at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WatcherState {
    #[serde(default)]
    pub version: u64,
    /// Outbound call timestamps within the trailing hour (rate limiter).
    #[serde(default)]
    pub calls: Vec<DateTime<Utc>>,
    /// Slot key -> last notified at (notification throttle).
    #[serde(default)]
    pub notified: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Load the state for `key`. A key never seen before yields the default
    /// (empty) state; a present-but-unreadable record is an error, since
    /// running against corrupted state risks notify storms.
    async fn load(&self, key: &str) -> Result<WatcherState>;

    /// Persist the state for `key` in one atomic write.
    async fn save(&self, key: &str, state: &WatcherState) -> Result<()>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn state_round_trips_through_json() {
        let mut s = WatcherState::default();
        s.version = 3;
        s.calls.push(Utc.with_ymd_and_hms(2025, 11, 15, 12, 0, 0).unwrap());
        s.notified.insert(
            "Sat Nov 15|7:00 PM|2|Dinner".into(),
            Utc.with_ymd_and_hms(2025, 11, 15, 11, 59, 0).unwrap(),
        );
        let json = serde_json::to_string(&s).unwrap();
        let back: WatcherState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn missing_fields_default() {
        let back: WatcherState = serde_json::from_str("{}").unwrap();
        assert_eq!(back, WatcherState::default());
    }
}
