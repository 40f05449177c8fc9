// tests/grid_expansion.rs
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use tablewatch::config::{dinner, lunch};
use tablewatch::grid::{expand, rolling_windows, WindowSpec};

fn off() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).unwrap()
}

fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
    off()
        .from_local_datetime(
            &NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, 0)
                .unwrap(),
        )
        .unwrap()
}

fn window(line: &str) -> WindowSpec {
    WindowSpec::parse(line).unwrap()
}

#[test]
fn nine_instants_for_two_hour_window_at_quarter_step() {
    let windows = [window("2025-11-15,18:00,20:00,2")];
    let now = local(2025, 11, 15, 17, 0);
    let grid = expand(&windows, &[dinner()], now, 15);

    // 18:00..20:00 inclusive at 15 min = 9 instants, one party size.
    assert_eq!(grid.len(), 9);
    assert_eq!(grid[0].at, local(2025, 11, 15, 18, 0));
    assert_eq!(grid[8].at, local(2025, 11, 15, 20, 0));
    assert!(grid.iter().all(|p| p.party_size == 2));
    assert!(grid.iter().all(|p| p.service.name == "Dinner"));
}

#[test]
fn expired_window_yields_nothing() {
    let windows = [window("2025-11-15,18:00,20:00,2,4")];
    let now = local(2025, 11, 15, 20, 1);
    assert!(expand(&windows, &[dinner()], now, 15).is_empty());
    assert!(!windows[0].is_active(now));
}

#[test]
fn past_instants_inside_active_window_are_dropped() {
    let windows = [window("2025-11-15,18:00,20:00,2")];
    let now = local(2025, 11, 15, 18, 10);
    let grid = expand(&windows, &[dinner()], now, 15);

    // Grid stays anchored to the window start: next instant is 18:15,
    // not 18:10 + step.
    assert_eq!(grid.len(), 8);
    assert_eq!(grid[0].at, local(2025, 11, 15, 18, 15));
}

#[test]
fn party_sizes_fan_out_and_order_is_stable() {
    let windows = [window("2025-11-15,18:00,19:00,4,2")];
    let now = local(2025, 11, 15, 12, 0);
    let grid = expand(&windows, &[dinner()], now, 30);

    // 3 instants x 2 sizes, ordered by time then size.
    assert_eq!(grid.len(), 6);
    let flat: Vec<(u32, u32)> = grid
        .iter()
        .map(|p| (p.at.time().format("%H%M").to_string().parse().unwrap(), p.party_size))
        .collect();
    assert_eq!(
        flat,
        vec![
            (1800, 2),
            (1800, 4),
            (1830, 2),
            (1830, 4),
            (1900, 2),
            (1900, 4)
        ]
    );
}

#[test]
fn every_instant_stays_within_its_window() {
    let windows = [
        window("2025-11-15,18:00,20:00,2"),
        window("2025-11-16,11:30,13:00,4"),
    ];
    let now = local(2025, 11, 14, 9, 0);
    let grid = expand(&windows, &[dinner(), lunch()], now, 15);
    for p in &grid {
        let t = p.at.time();
        let in_first = p.at.date_naive() == NaiveDate::from_ymd_opt(2025, 11, 15).unwrap()
            && t >= NaiveTime::from_hms_opt(18, 0, 0).unwrap()
            && t <= NaiveTime::from_hms_opt(20, 0, 0).unwrap();
        let in_second = p.at.date_naive() == NaiveDate::from_ymd_opt(2025, 11, 16).unwrap()
            && t >= NaiveTime::from_hms_opt(11, 30, 0).unwrap()
            && t <= NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        assert!(in_first || in_second, "stray instant {p:?}");
    }
}

#[test]
fn instants_outside_any_service_are_skipped() {
    // 16:30 to 17:30 straddles the dinner opening at 17:00.
    let windows = [window("2025-11-15,16:30,17:30,2")];
    let now = local(2025, 11, 15, 8, 0);
    let grid = expand(&windows, &[dinner(), lunch()], now, 15);

    let times: Vec<String> = grid
        .iter()
        .map(|p| p.at.time().format("%H:%M").to_string())
        .collect();
    assert_eq!(times, vec!["17:00", "17:15", "17:30"]);
}

#[test]
fn rolling_windows_expand_like_explicit_ones() {
    let today = NaiveDate::from_ymd_opt(2025, 11, 15).unwrap();
    let windows = rolling_windows(today, 2, &[dinner()], &[2]);
    let now = local(2025, 11, 15, 0, 0);
    let grid = expand(&windows, &[dinner()], now, 15);

    // Dinner 17:00-22:15 at 15 min = 22 instants per day.
    assert_eq!(grid.len(), 44);
    assert!(grid.iter().all(|p| p.service.reservation_type_id == 1695));
}
