//! Sliding-hour rate limiter over the persisted call log.
//!
//! The call timestamps live inside [`crate::state::WatcherState`] so the
//! ceiling holds across invocations, not just within one process. The
//! limiter itself is a stateless policy applied to that record.

use chrono::{DateTime, Duration, Utc};

fn window() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    ceiling: u32,
}

impl RateLimiter {
    pub fn new(max_per_hour: u32) -> Self {
        Self {
            ceiling: max_per_hour.max(1),
        }
    }

    /// Admit one outbound call at `now`, recording it into `calls`.
    ///
    /// Entries older than one hour are pruned first, as are entries in the
    /// future of `now` (a backwards clock step must never let the record
    /// under-count the trailing hour).
    pub fn admit(&self, calls: &mut Vec<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        prune(calls, now);
        if (calls.len() as u32) < self.ceiling {
            calls.push(now);
            true
        } else {
            false
        }
    }

    /// Calls still available in the trailing hour, after pruning.
    pub fn remaining(&self, calls: &mut Vec<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
        prune(calls, now);
        self.ceiling.saturating_sub(calls.len() as u32)
    }
}

fn prune(calls: &mut Vec<DateTime<Utc>>, now: DateTime<Utc>) {
    calls.retain(|t| *t <= now && now.signed_duration_since(*t) < window());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn admits_until_ceiling() {
        let rl = RateLimiter::new(3);
        let mut calls = Vec::new();
        let now = t0();
        assert!(rl.admit(&mut calls, now));
        assert!(rl.admit(&mut calls, now));
        assert!(rl.admit(&mut calls, now));
        assert!(!rl.admit(&mut calls, now));
        assert_eq!(rl.remaining(&mut calls, now), 0);
    }

    #[test]
    fn entries_age_out_after_an_hour() {
        let rl = RateLimiter::new(2);
        let mut calls = vec![t0(), t0() + Duration::minutes(30)];
        // Still full half an hour in.
        assert!(!rl.admit(&mut calls, t0() + Duration::minutes(59)));
        // 61 minutes after the first call it has aged out.
        assert!(rl.admit(&mut calls, t0() + Duration::minutes(61)));
    }

    #[test]
    fn boundary_minute_is_dropped() {
        let rl = RateLimiter::new(1);
        let mut calls = vec![t0()];
        // Exactly one hour later the old entry no longer counts.
        assert!(rl.admit(&mut calls, t0() + window()));
    }

    #[test]
    fn future_timestamps_are_pruned_not_counted() {
        let rl = RateLimiter::new(2);
        // Clock moved backwards since these were recorded.
        let mut calls = vec![t0() + Duration::hours(2), t0() + Duration::hours(3)];
        assert!(rl.admit(&mut calls, t0()));
        assert_eq!(calls.len(), 1);
    }
}
