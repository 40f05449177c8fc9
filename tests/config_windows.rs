// tests/config_windows.rs
use std::env;

use tablewatch::config::{load_windows_from, WatchConfig, WatcherKind};

const WATCHER_ENV: &[&str] = &[
    "WATCHER_KIND",
    "MERCHANT_ID",
    "VENUE_NAME",
    "VENUE_UTC_OFFSET",
    "LINK_BASE",
    "STEP_MIN",
    "DAYS_AHEAD",
    "PARTY_SIZES",
    "ENABLE_DINNER",
    "ENABLE_LUNCH",
    "VIP_WINDOWS",
    "VIP_WINDOWS_PATH",
    "MAX_CHECKS_PER_HOUR",
    "NOTIFY_COOLDOWN_SECS",
    "NOTIFY_RETENTION_SECS",
    "RANDOM_STAGGER_MS",
    "RANDOMIZE_DELAY",
    "NOTIFICATION_PREFIX",
    "PUSHOVER_URL_TITLE",
    "PUSHOVER_PRIORITY",
    "PUSHOVER_SOUND",
];

fn clear_watcher_env() {
    for k in WATCHER_ENV {
        env::remove_var(k);
    }
}

#[test]
fn windows_file_loads_and_isolates_bad_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vip_windows.toml");
    std::fs::write(
        &path,
        r#"
windows = [
  "2025-12-01,18:00,20:00,2,4",
  "definitely,not,a,window",
  "2025-12-02,11:30,13:00,6",
]
"#,
    )
    .unwrap();

    let ws = load_windows_from(&path).unwrap();
    assert_eq!(ws.len(), 2);
    assert_eq!(ws[0].party_sizes, vec![2, 4]);
    assert_eq!(ws[1].party_sizes, vec![6]);
}

#[test]
fn missing_windows_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_windows_from(&dir.path().join("nope.toml")).is_err());
}

#[serial_test::serial]
#[test]
fn vip_defaults_from_env() {
    clear_watcher_env();
    env::set_var("WATCHER_KIND", "vip");
    env::set_var(
        "VIP_WINDOWS",
        "2025-12-01,18:00,20:00,2\n# weekend brunch idea\nbad-line",
    );

    let cfg = WatchConfig::from_env().unwrap();
    assert_eq!(cfg.kind, WatcherKind::Vip);
    assert_eq!(cfg.state_key(), "vip_278278");
    assert_eq!(cfg.windows.len(), 1);
    assert_eq!(cfg.cooldown_secs, 300);
    assert_eq!(cfg.retention_secs, 7 * 24 * 3600);
    assert_eq!(cfg.priority, 1);
    assert_eq!(cfg.sound.as_deref(), Some("magic"));
    assert_eq!(cfg.startup_jitter_secs, 30);
    // VIP infers the service per instant, so both are present.
    assert_eq!(cfg.services.len(), 2);

    clear_watcher_env();
}

#[serial_test::serial]
#[test]
fn base_defaults_from_env() {
    clear_watcher_env();
    env::set_var("ENABLE_LUNCH", "true");

    let cfg = WatchConfig::from_env().unwrap();
    assert_eq!(cfg.kind, WatcherKind::Base);
    assert_eq!(cfg.state_key(), "base_278278");
    assert_eq!(cfg.services.len(), 2);
    assert_eq!(cfg.party_sizes, vec![2, 4]);
    assert_eq!(cfg.cooldown_secs, 5 * 24 * 3600);
    assert_eq!(cfg.priority, 0);
    assert_eq!(cfg.sound, None);
    assert_eq!(cfg.startup_jitter_secs, 0);
    assert_eq!(cfg.stagger_ms, (50, 200));

    clear_watcher_env();
}

#[serial_test::serial]
#[test]
fn disabling_every_service_fails_fast() {
    clear_watcher_env();
    env::set_var("ENABLE_DINNER", "false");
    env::set_var("ENABLE_LUNCH", "false");

    assert!(WatchConfig::from_env().is_err());

    clear_watcher_env();
}

#[serial_test::serial]
#[test]
fn tunables_override_defaults() {
    clear_watcher_env();
    env::set_var("WATCHER_KIND", "vip");
    env::set_var("VIP_WINDOWS", "2025-12-01,18:00,20:00,2");
    env::set_var("NOTIFY_COOLDOWN_SECS", "120");
    env::set_var("MAX_CHECKS_PER_HOUR", "30");
    env::set_var("RANDOM_STAGGER_MS", "10,20");
    env::set_var("RANDOMIZE_DELAY", "false");
    env::set_var("VENUE_UTC_OFFSET", "-08:00");

    let cfg = WatchConfig::from_env().unwrap();
    assert_eq!(cfg.cooldown_secs, 120);
    assert_eq!(cfg.max_calls_per_hour, 30);
    assert_eq!(cfg.stagger_ms, (10, 20));
    assert_eq!(cfg.startup_jitter_secs, 0);
    assert_eq!(
        cfg.venue_offset,
        chrono::FixedOffset::west_opt(8 * 3600).unwrap()
    );

    clear_watcher_env();
}
