//! Tests for utility functions

use chrono::{TimeDelta, TimeZone, Utc};
use prometheus_crawl_throttle::util::{elapsed_secs, init_tracing, Clock, ManualClock, SystemClock};

#[test]
fn test_manual_clock_set() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let later = start + TimeDelta::hours(5);
    clock.set(later);
    assert_eq!(clock.now(), later);
}

#[test]
fn test_system_clock_is_monotone_enough() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(elapsed_secs(a, b) >= 0.0);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
