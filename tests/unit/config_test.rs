//! Tests for configuration validation

use std::collections::HashMap;
use std::io::Write;

use prometheus_crawl_throttle::config::{BucketConfig, ThrottleConfig, ENV_CONFIG_PATH, ENV_RATE};
use prometheus_crawl_throttle::core::ThrottleError;

fn bucket(rate: f64, burst: f64) -> BucketConfig {
    BucketConfig {
        rate,
        burst,
        timezone: None,
        curve: None,
    }
}

#[test]
fn test_bucket_config_validation() {
    assert!(bucket(1.0, 3.0).validate().is_ok());
    assert!(bucket(5.0, -20.0).validate().is_ok());
    assert!(bucket(0.0, 1.0).validate().is_ok());
}

#[test]
fn test_bucket_config_invalid_rate() {
    assert!(bucket(-1.0, 5.0).validate().is_err());
}

#[test]
fn test_bucket_config_invalid_burst() {
    assert!(bucket(5.0, 0.0).validate().is_err());
}

#[test]
fn test_bucket_config_accepts_iana_zone() {
    let cfg = BucketConfig {
        timezone: Some("Europe/Berlin".into()),
        ..bucket(5.0, -20.0)
    };
    let spec = cfg.to_spec().unwrap();
    assert!(spec.mode.is_dynamic());
    assert_eq!(spec.timezone.unwrap().to_string(), "Europe/Berlin");
}

#[test]
fn test_bucket_config_invalid_timezone() {
    let cfg = BucketConfig {
        timezone: Some("Europe/Nowhere".into()),
        ..bucket(1.0, 3.0)
    };
    assert!(matches!(cfg.validate(), Err(ThrottleError::InvalidConfig(_))));
}

#[test]
fn test_throttle_config_names_bad_project() {
    let mut projects = HashMap::new();
    projects.insert("broken".to_string(), bucket(1.0, 0.0));
    let cfg = ThrottleConfig {
        default: BucketConfig::default(),
        projects,
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_throttle_config_from_json() {
    let json = r#"{
        "default": { "rate": 1, "burst": 3 },
        "projects": {
            "news.example": { "rate": 5, "burst": -20, "timezone": "+01:00" },
            "shop.example": {
                "rate": 2,
                "burst": -10,
                "curve": {
                    "peaks": [
                        { "center_hour": 9, "spread_hours": 1.5, "weight": 1 },
                        { "center_hour": 20, "spread_hours": 2.5, "dof": 3, "weight": 0.8 }
                    ],
                    "jitter": { "center_hours": 0.25 },
                    "weekday": { "multipliers": [1, 1, 1, 1, 1, 0.5, 0.5] }
                }
            }
        }
    }"#;

    let cfg = ThrottleConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.projects.len(), 2);
    let spec = cfg.projects["shop.example"].to_spec().unwrap();
    assert!(spec.mode.is_dynamic());
}

#[test]
fn test_throttle_config_defaults_when_empty() {
    let cfg = ThrottleConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg.default, BucketConfig::default());
    assert!(cfg.projects.is_empty());
}

#[test]
fn test_throttle_config_parse_error() {
    assert!(matches!(
        ThrottleConfig::from_json_str("{ not json"),
        Err(ThrottleError::ConfigParse(_))
    ));
}

#[test]
fn test_throttle_config_from_file_and_lookup() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "default": {{ "rate": 4, "burst": -8 }} }}"#).unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let from_file = ThrottleConfig::from_json_file(file.path()).unwrap();
    assert!((from_file.default.rate - 4.0).abs() < f64::EPSILON);

    let cfg = ThrottleConfig::from_lookup(|key| match key {
        ENV_CONFIG_PATH => Some(path.clone()),
        ENV_RATE => Some("6".into()),
        _ => None,
    })
    .unwrap();
    assert!((cfg.default.rate - 6.0).abs() < f64::EPSILON);
    assert!((cfg.default.burst + 8.0).abs() < f64::EPSILON);
}

#[test]
fn test_throttle_config_missing_file() {
    assert!(ThrottleConfig::from_json_file("/nonexistent/throttle.json").is_err());
}
