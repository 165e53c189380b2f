//! Tests for builder modules

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use prometheus_crawl_throttle::builders::{build_registry, build_shared_registry};
use prometheus_crawl_throttle::config::{BucketConfig, ThrottleConfig};
use prometheus_crawl_throttle::util::ManualClock;

fn config() -> ThrottleConfig {
    let mut projects = HashMap::new();
    projects.insert(
        "news.example".to_string(),
        BucketConfig {
            rate: 5.0,
            burst: -20.0,
            timezone: Some("+00:00".into()),
            curve: None,
        },
    );
    ThrottleConfig {
        default: BucketConfig {
            rate: 1.0,
            burst: 3.0,
            timezone: Some("+00:00".into()),
            curve: None,
        },
        projects,
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap()))
}

#[test]
fn test_build_registry_creates_configured_projects() {
    let mut registry = build_registry(&config(), clock()).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.capacity("news.example"), Some(20.0));

    assert!(registry.try_consume("other.example", 1.0).unwrap());
    assert_eq!(registry.capacity("other.example"), Some(3.0));
}

#[test]
fn test_build_shared_registry() {
    let registry = build_shared_registry(&config(), clock()).unwrap();
    assert_eq!(registry.projects(), vec!["news.example".to_string()]);
    let rate = registry.current_rate("news.example").unwrap();
    assert!(rate > 0.0 && rate <= 5.0);
}

#[test]
fn test_build_registry_rejects_invalid_config() {
    let mut cfg = config();
    cfg.default.burst = 0.0;
    assert!(build_registry(&cfg, clock()).is_err());
}
