//! Wall-clock abstraction.
//!
//! Buckets only ever read the clock. Production code uses [`SystemClock`];
//! tests drive time explicitly with [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock with microsecond resolution.
///
/// Can be moved backward to simulate NTP adjustments.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    /// Move the clock by `delta` (may be negative).
    pub fn advance(&self, delta: TimeDelta) {
        let step = delta.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(step, Ordering::AcqRel);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        self.micros.store(at.timestamp_micros(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::Acquire))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Seconds elapsed from `earlier` to `later`, clamped at zero.
#[must_use]
pub fn elapsed_secs(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later.signed_duration_since(earlier);
    match delta.num_microseconds() {
        Some(us) if us > 0 => us as f64 / 1_000_000.0,
        Some(_) => 0.0,
        None if delta > TimeDelta::zero() => delta.num_seconds() as f64,
        None => 0.0,
    }
}
