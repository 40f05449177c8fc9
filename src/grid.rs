//! # Probe Grid
//! Expands configured date/time windows into the concrete, time-ordered
//! sequence of (instant, party size) probes for one invocation.
//!
//! Windows are recomputed from configuration on every run and never
//! persisted. A window whose end has already passed yields nothing.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

/// A bookable service of the venue (e.g. Dinner), with the provider's
/// reservation type id and the daily time range it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub reservation_type_id: u32,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// One configured date/time window to monitor.
///
/// `service` is fixed for generated rolling windows; explicit windows leave
/// it empty and the service is inferred per instant from time of day.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub party_sizes: Vec<u32>,
    pub service: Option<Service>,
    pub label: String,
}

/// One concrete probe: query the provider for `party_size` seats at `at`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInstant {
    pub at: DateTime<FixedOffset>,
    pub party_size: u32,
    pub service: Service,
}

impl WindowSpec {
    /// Parse one config line: `YYYY-MM-DD,HH:MM,HH:MM,size[,size...]`.
    ///
    /// Each line is validated independently so one bad entry never takes
    /// down the rest of the list.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 4 {
            bail!("need date,start,end,party_sizes: {line:?}");
        }

        let date = NaiveDate::parse_from_str(parts[0], "%Y-%m-%d")
            .with_context(|| format!("bad date {:?}", parts[0]))?;
        let start = parse_hm(parts[1])?;
        let end = parse_hm(parts[2])?;
        if start >= end {
            bail!("start {start} must be before end {end}");
        }

        let mut party_sizes = Vec::new();
        for p in &parts[3..] {
            let n: u32 = p
                .parse()
                .map_err(|_| anyhow!("bad party size {p:?}"))?;
            if n == 0 {
                bail!("party size must be >= 1");
            }
            party_sizes.push(n);
        }
        if party_sizes.is_empty() {
            bail!("at least one party size required");
        }

        Ok(Self {
            date,
            start,
            end,
            party_sizes,
            service: None,
            label: line.to_string(),
        })
    }

    /// Whether the window's end is still ahead of `now`.
    pub fn is_active(&self, now: DateTime<FixedOffset>) -> bool {
        local_dt(self.date, self.end, *now.offset()) >= now
    }
}

/// `HH:MM` in 24h venue-local time.
fn parse_hm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").with_context(|| format!("bad time {s:?}"))
}

/// Generate the rolling monitor's windows: one per (day, enabled service)
/// for the next `days_ahead` days starting at `today`.
pub fn rolling_windows(
    today: NaiveDate,
    days_ahead: u32,
    services: &[Service],
    party_sizes: &[u32],
) -> Vec<WindowSpec> {
    let mut out = Vec::new();
    for i in 0..days_ahead {
        let date = today + Duration::days(i as i64);
        for svc in services {
            out.push(WindowSpec {
                date,
                start: svc.start,
                end: svc.end,
                party_sizes: party_sizes.to_vec(),
                service: Some(svc.clone()),
                label: format!("{date} {}", svc.name),
            });
        }
    }
    out
}

/// Expand windows into the ordered probe grid.
///
/// The grid is anchored to each window's own start minute (`start + k*step`),
/// never to the previous invocation, so repeated runs see the same instants.
/// Instants already in the past are excluded; both window boundaries are
/// inclusive. Instants whose time of day maps to no service are skipped.
pub fn expand(
    windows: &[WindowSpec],
    services: &[Service],
    now: DateTime<FixedOffset>,
    step_min: u32,
) -> Vec<ProbeInstant> {
    let off = *now.offset();
    let step = Duration::minutes(step_min.max(1) as i64);
    let mut out = Vec::new();

    for w in windows {
        let end = local_dt(w.date, w.end, off);
        if end < now {
            // Auto-expiration: the whole window is in the past.
            continue;
        }
        let mut t = local_dt(w.date, w.start, off);
        while t <= end {
            if t >= now {
                let svc = w
                    .service
                    .as_ref()
                    .or_else(|| service_for_time(services, t.time()));
                if let Some(svc) = svc {
                    for &party_size in &w.party_sizes {
                        out.push(ProbeInstant {
                            at: t,
                            party_size,
                            service: svc.clone(),
                        });
                    }
                }
            }
            t = t + step;
        }
    }

    out.sort_by(|a, b| (a.at, a.party_size).cmp(&(b.at, b.party_size)));
    out
}

/// First service whose daily range contains `t` (bounds inclusive).
pub fn service_for_time<'a>(services: &'a [Service], t: NaiveTime) -> Option<&'a Service> {
    services.iter().find(|s| t >= s.start && t <= s.end)
}

fn local_dt(date: NaiveDate, time: NaiveTime, off: FixedOffset) -> DateTime<FixedOffset> {
    // A fixed offset has no DST gaps, so a local wall time is never
    // ambiguous or skipped.
    off.from_local_datetime(&date.and_time(time))
        .single()
        .expect("fixed-offset local time is unambiguous")
}
