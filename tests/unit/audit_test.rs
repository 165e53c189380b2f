//! Tests for audit sinks

use chrono::{TimeZone, Utc};
use prometheus_crawl_throttle::core::{
    build_admission_event, AdmissionAction, AuditSink, InMemoryAuditSink,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let at = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

    sink.record(build_admission_event("example.com", AdmissionAction::Admit, 1.0, 2.0, 0.5, at));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].project, "example.com");
    assert_eq!(events[0].action, AdmissionAction::Admit);
    assert_eq!(events[0].at, at);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    let at = Utc::now();

    sink.record(build_admission_event("a", AdmissionAction::Create, 0.0, 3.0, 1.0, at));
    sink.record(build_admission_event("b", AdmissionAction::Create, 0.0, 3.0, 1.0, at));
    sink.record(build_admission_event("c", AdmissionAction::Create, 0.0, 3.0, 1.0, at));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].project, "b"); // First one popped
    assert_eq!(events[1].project, "c");
}

#[test]
fn test_action_display() {
    assert_eq!(AdmissionAction::Defer.to_string(), "defer");
    assert_eq!(AdmissionAction::Reconfigure.to_string(), "reconfigure");
}

#[test]
fn test_registry_records_lifecycle() {
    use prometheus_crawl_throttle::core::{BucketSpec, ProjectBuckets, Timezone, TracingAuditSink};
    use prometheus_crawl_throttle::util::ManualClock;

    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
    let spec = BucketSpec::from_signed(1.0, 1.0, Some(Timezone::UTC)).unwrap();
    let mut registry = ProjectBuckets::with_clock(spec, clock).with_audit(Box::new(TracingAuditSink));

    assert!(registry.try_consume("a.example", 1.0).unwrap());
    assert!(!registry.try_consume("a.example", 1.0).unwrap());
    assert!(registry.remove("a.example").is_some());
}
