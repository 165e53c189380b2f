//! Tests for the monitoring API surface

use std::sync::Arc;

use chrono::{TimeDelta, TimeZone, Utc};
use prometheus_crawl_throttle::core::{BucketSpec, ProjectBuckets, SharedProjectBuckets, Timezone};
use prometheus_crawl_throttle::runtime::{health, list_buckets, list_shared_buckets};
use prometheus_crawl_throttle::util::ManualClock;

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap()))
}

#[test]
fn test_snapshots_do_not_consume() {
    let clock = clock();
    let spec = BucketSpec::from_signed(1.0, 3.0, Some(Timezone::UTC)).unwrap();
    let mut registry = ProjectBuckets::with_clock(spec, Arc::clone(&clock));
    assert!(registry.try_consume("b.example", 2.0).unwrap());
    assert!(!registry.try_consume("b.example", 2.0).unwrap());
    assert!(registry.try_consume("a.example", 1.0).unwrap());

    clock.advance(TimeDelta::milliseconds(500));
    let first = list_buckets(&mut registry);
    let second = list_buckets(&mut registry);
    assert_eq!(first, second);

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].project, "a.example");
    assert_eq!(first[1].project, "b.example");
    assert_eq!(first[1].mode, "static");
    assert!((first[1].level - 1.5).abs() < 1e-9);
    assert_eq!(first[1].admitted, 1);
    assert_eq!(first[1].denied, 1);
    assert_eq!(first[1].timezone, "UTC");
}

#[test]
fn test_shared_snapshots_report_dynamic_rate() {
    let spec = BucketSpec::from_signed(5.0, -20.0, Some(Timezone::UTC)).unwrap();
    let registry = SharedProjectBuckets::with_clock(spec, clock());
    assert!(registry.try_consume("news.example", 1.0).unwrap());

    let snapshots = list_shared_buckets(&registry);
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].mode, "dynamic");
    assert!((snapshots[0].capacity - 20.0).abs() < f64::EPSILON);
    assert!(snapshots[0].current_rate <= 5.0);

    let json = serde_json::to_string(&snapshots[0]).unwrap();
    assert!(json.contains("\"project\":\"news.example\""));
}

#[test]
fn test_health() {
    let h = health(3);
    assert!(h.ok);
    assert_eq!(h.buckets, 3);
}
