//! Tests for error types

use prometheus_crawl_throttle::core::ThrottleError;

#[test]
fn test_invalid_config_error() {
    let err = ThrottleError::InvalidConfig("rate must be >= 0".to_string());
    assert_eq!(format!("{}", err), "invalid config: rate must be >= 0");
}

#[test]
fn test_config_parse_error() {
    let err = ThrottleError::ConfigParse("expected value".to_string());
    assert_eq!(format!("{}", err), "config parse error: expected value");
}

#[test]
fn test_error_converts_to_anyhow() {
    fn load() -> prometheus_crawl_throttle::core::AppResult<()> {
        Err(ThrottleError::InvalidConfig("capacity".into()).into())
    }
    let err = load().unwrap_err();
    assert!(err.to_string().contains("capacity"));
}
