//! # Watch Engine
//! One invocation, start to finish: load state, expand windows, probe the
//! grid under the rate ceiling, log observations, throttle, dispatch,
//! persist. Every decision is re-derived from persisted state plus the
//! current time, so a retried invocation is idempotent.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use rand::Rng;

use crate::config::{WatchConfig, WatcherKind};
use crate::grid::{self, rolling_windows};
use crate::notify::{NotifierMux, SlotAlert, SlotThrottle};
use crate::probe::{probe_grid, AvailabilityClient, Slot};
use crate::ratelimit::RateLimiter;
use crate::sink::{ObservationRow, ObservationSink};
use crate::state::StateStore;

/// One-time metrics registration (so series show up wherever they export).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("probe_calls_total", "Availability queries issued.");
        describe_counter!("probe_errors_total", "Availability queries that failed.");
        describe_counter!(
            "probe_rate_limited_total",
            "Grid entries skipped at the hourly ceiling."
        );
        describe_counter!("slots_found_total", "Open slots returned by the provider.");
        describe_counter!("alerts_sent_total", "Alerts admitted past the cooldown gate.");
        describe_counter!(
            "alerts_suppressed_total",
            "Found slots suppressed by the cooldown gate."
        );
        describe_gauge!("watch_last_run_ts", "Unix ts of the last completed run.");
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub windows_active: usize,
    pub grid_len: usize,
    pub probes_sent: u32,
    pub probe_errors: u32,
    pub rate_limited: u32,
    pub slots_found: usize,
    pub notified: usize,
    pub suppressed: usize,
    pub limit_remaining: u32,
}

/// Run one watcher invocation at `now`.
///
/// State is written exactly once, after all probe and notify decisions are
/// final; a failed load or save is the only fatal outcome. The external
/// scheduler's next tick is the retry mechanism for everything else.
pub async fn run_once(
    cfg: &WatchConfig,
    client: &dyn AvailabilityClient,
    store: &dyn StateStore,
    sink: &dyn ObservationSink,
    mux: &NotifierMux,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    ensure_metrics_described();

    let state_key = cfg.state_key();
    let mut state = store
        .load(&state_key)
        .await
        .with_context(|| format!("load state {state_key}"))?;
    state.version += 1;

    let now_local = now.with_timezone(&cfg.venue_offset);
    let windows = match cfg.kind {
        WatcherKind::Base => rolling_windows(
            now_local.date_naive(),
            cfg.days_ahead,
            &cfg.services,
            &cfg.party_sizes,
        ),
        WatcherKind::Vip => cfg.windows.clone(),
    };
    let windows_active = windows.iter().filter(|w| w.is_active(now_local)).count();
    let grid = grid::expand(&windows, &cfg.services, now_local, cfg.step_min);

    if grid.is_empty() {
        tracing::info!(
            watcher = cfg.kind.as_str(),
            windows = windows.len(),
            "nothing to probe this run"
        );
    } else if cfg.startup_jitter_secs > 0 {
        let secs = rand::rng().random_range(0..=cfg.startup_jitter_secs);
        tracing::debug!(secs, "startup jitter");
        tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
    }

    let limiter = RateLimiter::new(cfg.max_calls_per_hour);
    let outcome = probe_grid(
        client,
        &cfg.merchant_id,
        &grid,
        &limiter,
        &mut state.calls,
        cfg.stagger_ms,
    )
    .await;
    counter!("slots_found_total").increment(outcome.slots.len() as u64);

    if !outcome.slots.is_empty() {
        let rows: Vec<ObservationRow> = outcome
            .slots
            .iter()
            .map(|s| ObservationRow::from_slot(s, now))
            .collect();
        // History only; the run carries on without it.
        if let Err(e) = sink.append(&rows).await {
            tracing::warn!(sink = sink.name(), error = ?e, "observation append failed");
        }
    }

    let throttle = SlotThrottle::new(cfg.cooldown_secs, cfg.retention_secs);
    let mut alerts = Vec::new();
    let mut suppressed = 0usize;
    for slot in &outcome.slots {
        let key = cfg.slot_key(slot);
        if throttle.admit(&mut state.notified, &key, now) {
            alerts.push(build_alert(cfg, slot));
        } else {
            suppressed += 1;
            tracing::debug!(%key, "suppressed by cooldown");
        }
    }
    counter!("alerts_sent_total").increment(alerts.len() as u64);
    counter!("alerts_suppressed_total").increment(suppressed as u64);

    for alert in &alerts {
        mux.notify(alert).await;
    }

    throttle.prune(&mut state.notified, now);
    state.last_run_at = Some(now);
    let limit_remaining = limiter.remaining(&mut state.calls, Utc::now());

    store
        .save(&state_key, &state)
        .await
        .with_context(|| format!("persist state {state_key}"))?;
    gauge!("watch_last_run_ts").set(now.timestamp() as f64);

    let summary = RunSummary {
        windows_active,
        grid_len: grid.len(),
        probes_sent: outcome.sent,
        probe_errors: outcome.errors,
        rate_limited: outcome.skipped,
        slots_found: outcome.slots.len(),
        notified: alerts.len(),
        suppressed,
        limit_remaining,
    };
    tracing::info!(
        watcher = cfg.kind.as_str(),
        windows = summary.windows_active,
        grid = summary.grid_len,
        sent = summary.probes_sent,
        errors = summary.probe_errors,
        rate_limited = summary.rate_limited,
        found = summary.slots_found,
        notified = summary.notified,
        suppressed = summary.suppressed,
        remaining = summary.limit_remaining,
        "run complete"
    );
    Ok(summary)
}

/// Format one alert for one admitted slot.
fn build_alert(cfg: &WatchConfig, slot: &Slot) -> SlotAlert {
    let link = slot.url.clone().unwrap_or_else(|| {
        format!(
            "{}?reservation_type_id={}&party_size={}&search_ts={}",
            cfg.link_base, slot.reservation_type_id, slot.party_size, slot.search_ts_ms
        )
    });

    let (title, message) = match cfg.kind {
        WatcherKind::Base => (
            format!(
                "{}: table for {} ({})",
                cfg.title_prefix, slot.party_size, slot.service
            ),
            format!("{} @ {}. Act fast!", slot.date_label, slot.time_label),
        ),
        WatcherKind::Vip => (
            cfg.title_prefix.clone(),
            format!(
                "{} @ {}, party of {}. Book now!",
                slot.date_label, slot.time_label, slot.party_size
            ),
        ),
    };

    SlotAlert {
        title,
        message,
        url: Some(link),
        url_title: cfg.url_title.clone(),
        priority: cfg.priority,
        sound: cfg.sound.clone(),
    }
}
