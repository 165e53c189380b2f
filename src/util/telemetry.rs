//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing for binaries embedding the throttle. Callers can install
/// their own subscriber; this helper installs a default env-filtered fmt
/// subscriber (`RUST_LOG=prometheus_crawl_throttle=debug`) if none is set.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}
