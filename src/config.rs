//! Watcher configuration.
//!
//! Env-first, matching how the external scheduler injects settings; VIP
//! windows can also come from a TOML file. One malformed window line is
//! rejected and logged on its own, the rest of the list still loads.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, NaiveTime};

use crate::grid::{Service, WindowSpec};
use crate::probe::Slot;

const ENV_WINDOWS: &str = "VIP_WINDOWS";
const ENV_WINDOWS_PATH: &str = "VIP_WINDOWS_PATH";
const DEFAULT_WINDOWS_PATH: &str = "config/vip_windows.toml";

/// Which logical watcher this invocation runs as. The two kinds share the
/// engine and differ only in configuration defaults and window source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherKind {
    /// Rolling monitor over the next few days of service hours.
    Base,
    /// Time-boxed urgent watcher over explicitly configured windows.
    Vip,
}

impl WatcherKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "vip" => Ok(Self::Vip),
            other => bail!("unknown watcher kind {other:?} (expected base or vip)"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Vip => "vip",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub kind: WatcherKind,
    pub merchant_id: String,
    pub venue_name: String,
    pub venue_offset: FixedOffset,
    pub link_base: String,
    /// Grid resolution in minutes.
    pub step_min: u32,
    /// Base kind: how many days forward the rolling windows cover.
    pub days_ahead: u32,
    /// Base kind: party sizes applied to every generated window.
    pub party_sizes: Vec<u32>,
    pub services: Vec<Service>,
    /// Vip kind: explicit windows.
    pub windows: Vec<WindowSpec>,
    pub max_calls_per_hour: u32,
    pub cooldown_secs: i64,
    pub retention_secs: i64,
    pub stagger_ms: (u64, u64),
    /// Random delay before the first probe (0 disables).
    pub startup_jitter_secs: u64,
    pub title_prefix: String,
    pub url_title: String,
    pub priority: i8,
    pub sound: Option<String>,
}

impl WatchConfig {
    pub fn from_env() -> Result<Self> {
        let kind = WatcherKind::parse(&env_or("WATCHER_KIND", "base"))?;
        let merchant_id = env_or("MERCHANT_ID", "278278");
        let venue_name = env_or("VENUE_NAME", "Hillstone NYC");
        let venue_offset = parse_offset(&env_or("VENUE_UTC_OFFSET", "-05:00"))?;
        let link_base = env_or("LINK_BASE", "https://example.com");

        let step_min: u32 = env_parsed("STEP_MIN", 15)?;
        if step_min == 0 {
            bail!("STEP_MIN must be >= 1");
        }
        let days_ahead: u32 = env_parsed("DAYS_AHEAD", 3)?;
        let party_sizes = parse_sizes(&env_or("PARTY_SIZES", "2,4"))?;

        let services = match kind {
            // The rolling monitor probes only the services switched on.
            WatcherKind::Base => {
                let mut svcs = Vec::new();
                if env_flag("ENABLE_DINNER", true) {
                    svcs.push(dinner());
                }
                if env_flag("ENABLE_LUNCH", false) {
                    svcs.push(lunch());
                }
                if svcs.is_empty() {
                    bail!("no services enabled, set ENABLE_DINNER or ENABLE_LUNCH");
                }
                svcs
            }
            // VIP windows infer the service per instant, so the full table
            // is always available.
            WatcherKind::Vip => vec![dinner(), lunch()],
        };

        let windows = match kind {
            WatcherKind::Base => Vec::new(),
            WatcherKind::Vip => load_windows()?,
        };

        let max_calls_per_hour: u32 = env_parsed("MAX_CHECKS_PER_HOUR", 120)?;

        let (default_cooldown, default_retention) = match kind {
            // The base monitor's dedupe horizon doubles as its cooldown.
            WatcherKind::Base => (5 * 24 * 3600, 5 * 24 * 3600),
            WatcherKind::Vip => (300, 7 * 24 * 3600),
        };
        let cooldown_secs: i64 = env_parsed("NOTIFY_COOLDOWN_SECS", default_cooldown)?;
        let retention_secs: i64 = env_parsed("NOTIFY_RETENTION_SECS", default_retention)?;

        let stagger_ms = parse_stagger(&env_or("RANDOM_STAGGER_MS", "50,200"));
        let startup_jitter_secs = if kind == WatcherKind::Vip && env_flag("RANDOMIZE_DELAY", true)
        {
            30
        } else {
            0
        };

        let title_prefix = env_or(
            "NOTIFICATION_PREFIX",
            match kind {
                WatcherKind::Base => "New table alert",
                WatcherKind::Vip => "VIP TABLE ALERT",
            },
        );
        let url_title = env_or(
            "PUSHOVER_URL_TITLE",
            match kind {
                WatcherKind::Base => "Book now",
                WatcherKind::Vip => "Book VIP table now",
            },
        );
        let priority: i8 = env_parsed(
            "PUSHOVER_PRIORITY",
            match kind {
                WatcherKind::Base => 0,
                WatcherKind::Vip => 1,
            },
        )?;
        let sound = match std::env::var("PUSHOVER_SOUND") {
            Ok(s) if !s.is_empty() => Some(s),
            _ => match kind {
                WatcherKind::Base => None,
                WatcherKind::Vip => Some("magic".to_string()),
            },
        };

        Ok(Self {
            kind,
            merchant_id,
            venue_name,
            venue_offset,
            link_base,
            step_min,
            days_ahead,
            party_sizes,
            services,
            windows,
            max_calls_per_hour,
            cooldown_secs,
            retention_secs,
            stagger_ms,
            startup_jitter_secs,
            title_prefix,
            url_title,
            priority,
            sound,
        })
    }

    /// Stable identity of the persisted state record.
    pub fn state_key(&self) -> String {
        format!("{}_{}", self.kind.as_str(), self.merchant_id)
    }

    /// Throttle key for a found slot. VIP keys carry the merchant so the
    /// two watcher kinds never collide in a shared store.
    pub fn slot_key(&self, slot: &Slot) -> String {
        match self.kind {
            WatcherKind::Base => slot.key(),
            WatcherKind::Vip => format!("VIP|{}|{}", self.merchant_id, slot.key()),
        }
    }
}

pub fn dinner() -> Service {
    Service {
        name: "Dinner".to_string(),
        reservation_type_id: 1695,
        start: hm(17, 0),
        end: hm(22, 15),
    }
}

pub fn lunch() -> Service {
    Service {
        name: "Lunch".to_string(),
        reservation_type_id: 1862,
        start: hm(11, 15),
        end: hm(14, 30),
    }
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("literal time")
}

/// Load VIP windows, one `date,start,end,sizes...` entry per line:
/// 1) `$VIP_WINDOWS` (inline, newline separated)
/// 2) `$VIP_WINDOWS_PATH` (TOML file)
/// 3) `config/vip_windows.toml`
/// Missing everywhere is fine (nothing to watch yet).
fn load_windows() -> Result<Vec<WindowSpec>> {
    if let Ok(raw) = std::env::var(ENV_WINDOWS) {
        if !raw.trim().is_empty() {
            return Ok(parse_window_lines(raw.lines()));
        }
    }
    if let Ok(p) = std::env::var(ENV_WINDOWS_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("VIP_WINDOWS_PATH points to non-existent path");
        }
        return load_windows_from(&pb);
    }
    let default = Path::new(DEFAULT_WINDOWS_PATH);
    if default.exists() {
        return load_windows_from(default);
    }
    Ok(Vec::new())
}

pub fn load_windows_from(path: &Path) -> Result<Vec<WindowSpec>> {
    #[derive(serde::Deserialize)]
    struct WindowsFile {
        windows: Vec<String>,
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading windows from {}", path.display()))?;
    let parsed: WindowsFile = toml::from_str(&content)
        .with_context(|| format!("parse windows file {}", path.display()))?;
    Ok(parse_window_lines(parsed.windows.iter().map(String::as_str)))
}

/// Parse entries one by one; a bad entry is logged and dropped without
/// touching its neighbours.
pub fn parse_window_lines<'a, I>(lines: I) -> Vec<WindowSpec>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match WindowSpec::parse(line) {
            Ok(w) => out.push(w),
            Err(e) => tracing::warn!(line, error = ?e, "rejected window entry"),
        }
    }
    out
}

fn parse_sizes(raw: &str) -> Result<Vec<u32>> {
    let mut sizes = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let n: u32 = part
            .parse()
            .with_context(|| format!("bad party size {part:?} in PARTY_SIZES"))?;
        if n == 0 {
            bail!("party sizes must be >= 1");
        }
        sizes.push(n);
    }
    if sizes.is_empty() {
        bail!("PARTY_SIZES must name at least one size");
    }
    Ok(sizes)
}

/// `+HH:MM` / `-HH:MM`. East-positive, same convention as RFC 3339.
fn parse_offset(s: &str) -> Result<FixedOffset> {
    let (sign, rest) = match s.chars().next() {
        Some('-') => (-1i32, &s[1..]),
        Some('+') => (1, &s[1..]),
        _ => (1, s),
    };
    let (h, m) = rest
        .split_once(':')
        .with_context(|| format!("offset {s:?} must look like -05:00"))?;
    let h: i32 = h.parse().with_context(|| format!("bad offset hours in {s:?}"))?;
    let m: i32 = m.parse().with_context(|| format!("bad offset minutes in {s:?}"))?;
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
        .with_context(|| format!("offset {s:?} out of range"))
}

/// `lo,hi` in milliseconds; anything malformed falls back to 50..200.
fn parse_stagger(raw: &str) -> (u64, u64) {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() == 2 {
        if let (Ok(lo), Ok(hi)) = (parts[0].parse(), parts[1].parse()) {
            return (lo, hi);
        }
    }
    tracing::warn!(raw, "bad RANDOM_STAGGER_MS, using 50,200");
    (50, 200)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => v.eq_ignore_ascii_case("true") || v == "1",
        Err(_) => default,
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("could not parse {name}={v:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_parses_both_signs() {
        assert_eq!(
            parse_offset("-05:00").unwrap(),
            FixedOffset::west_opt(5 * 3600).unwrap()
        );
        assert_eq!(
            parse_offset("+05:30").unwrap(),
            FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
        );
        assert!(parse_offset("late").is_err());
        assert!(parse_offset("-25:00").is_err());
    }

    #[test]
    fn sizes_parse_and_validate() {
        assert_eq!(parse_sizes("2,4").unwrap(), vec![2, 4]);
        assert_eq!(parse_sizes(" 2 , 6 ").unwrap(), vec![2, 6]);
        assert!(parse_sizes("2,0").is_err());
        assert!(parse_sizes("").is_err());
        assert!(parse_sizes("two").is_err());
    }

    #[test]
    fn stagger_falls_back_on_garbage() {
        assert_eq!(parse_stagger("10,20"), (10, 20));
        assert_eq!(parse_stagger("nope"), (50, 200));
        assert_eq!(parse_stagger("1,2,3"), (50, 200));
    }

    #[test]
    fn bad_window_lines_are_isolated() {
        let lines = [
            "# comment",
            "",
            "2025-11-15,18:00,20:00,2,4",
            "2025-11-16,20:00,18:00,2",
            "2025-11-17,11:30,13:00,6",
        ];
        let ws = parse_window_lines(lines);
        assert_eq!(ws.len(), 2);
        assert_eq!(ws[0].party_sizes, vec![2, 4]);
        assert_eq!(ws[1].party_sizes, vec![6]);
    }

    #[test]
    fn watcher_kind_round_trip() {
        assert_eq!(WatcherKind::parse("base").unwrap(), WatcherKind::Base);
        assert_eq!(WatcherKind::parse("VIP").unwrap(), WatcherKind::Vip);
        assert!(WatcherKind::parse("both").is_err());
    }
}
