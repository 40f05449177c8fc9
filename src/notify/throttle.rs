// src/notify/throttle.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Keyed cooldown gate over the persisted last-notified map.
///
/// The anti-spam invariant: no two alerts for the same slot key within one
/// cooldown interval, no matter how many invocations happen in between.
/// The map entry is written at admission time, before any transport is
/// attempted, so a retried or failed delivery can never re-admit the slot.
#[derive(Debug, Clone)]
pub struct SlotThrottle {
    cooldown: ChronoDuration,
    retention: ChronoDuration,
}

impl SlotThrottle {
    /// Negative values are treated as 0. `retention` below `cooldown` would
    /// forget suppressions too early, so it is raised to at least `cooldown`.
    pub fn new(cooldown_secs: i64, retention_secs: i64) -> Self {
        let cooldown = ChronoDuration::seconds(cooldown_secs.max(0));
        let retention = ChronoDuration::seconds(retention_secs.max(cooldown_secs.max(0)));
        Self {
            cooldown,
            retention,
        }
    }

    /// Admit `key` at `now`, recording the admission into `notified`.
    ///
    /// Admitted iff the key was never notified or its last notification is
    /// at least one cooldown old. Duplicate sightings within one run
    /// collapse here too: the first admission stamps `now`, so the second
    /// lookup is inside the cooldown.
    pub fn admit(
        &self,
        notified: &mut BTreeMap<String, DateTime<Utc>>,
        key: &str,
        now: DateTime<Utc>,
    ) -> bool {
        match notified.get(key) {
            Some(last) if now.signed_duration_since(*last) < self.cooldown => false,
            _ => {
                notified.insert(key.to_string(), now);
                true
            }
        }
    }

    /// Drop entries older than the retention horizon to bound map growth.
    pub fn prune(&self, notified: &mut BTreeMap<String, DateTime<Utc>>, now: DateTime<Utc>) {
        let horizon = self.retention;
        notified.retain(|_, last| now.signed_duration_since(*last) <= horizon);
    }
}
