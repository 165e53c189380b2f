//! Classic token bucket with lazy, timestamp-driven refill.
//!
//! A bucket holds up to `capacity` tokens and regains them continuously at
//! `rate` tokens per second. Refill happens on every read or consume, so no
//! background timer is involved. Buckets start full, which permits an
//! initial burst of `capacity` admissions.
//!
//! Access is single-writer: every mutating operation takes `&mut self`, and
//! the owning registry is responsible for serializing callers.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::ThrottleError;
use crate::util::clock::elapsed_secs;

/// Fixed-rate token bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    capacity: f64,
    level: f64,
    /// Tokens added per second.
    rate: f64,
    last_refill_at: DateTime<Utc>,
    admitted: u64,
    denied: u64,
}

impl Bucket {
    /// Create a full bucket, anchored at the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] when `rate` is negative or
    /// `capacity` is not strictly positive.
    pub fn new(rate: f64, capacity: f64) -> Result<Self, ThrottleError> {
        Self::new_at(rate, capacity, Utc::now())
    }

    /// Create a full bucket whose refill clock starts at `now`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Bucket::new`].
    pub fn new_at(rate: f64, capacity: f64, now: DateTime<Utc>) -> Result<Self, ThrottleError> {
        validate_rate(rate)?;
        validate_capacity(capacity)?;
        Ok(Self {
            capacity,
            level: capacity,
            rate,
            last_refill_at: now,
            admitted: 0,
            denied: 0,
        })
    }

    /// Add the tokens earned since the last refill, capped at capacity.
    ///
    /// A clock that moved backward earns nothing, and the refill anchor
    /// stays at the later instant so the same interval is never paid twice.
    fn refill(&mut self, now: DateTime<Utc>) {
        if now < self.last_refill_at {
            tracing::warn!(
                last_refill_at = %self.last_refill_at,
                now = %now,
                "clock moved backward; skipping refill"
            );
            return;
        }
        let elapsed = elapsed_secs(self.last_refill_at, now);
        self.level = (self.level + elapsed * self.rate).min(self.capacity);
        self.last_refill_at = now;
    }

    /// Try to take `n` tokens now.
    pub fn try_consume(&mut self, n: f64) -> bool {
        self.try_consume_at(n, Utc::now())
    }

    /// Try to take `n` tokens at `now`.
    ///
    /// Either all `n` tokens are removed and `true` is returned, or the level
    /// is left untouched and `false` is returned. Negative or non-finite
    /// requests are refused.
    pub fn try_consume_at(&mut self, n: f64, now: DateTime<Utc>) -> bool {
        self.refill(now);
        if !n.is_finite() || n < 0.0 {
            tracing::debug!(requested = n, "refusing malformed token request");
            self.denied += 1;
            return false;
        }
        if self.level >= n {
            self.level -= n;
            self.admitted += 1;
            true
        } else {
            tracing::trace!(requested = n, level = self.level, "insufficient tokens");
            self.denied += 1;
            false
        }
    }

    /// Refill and report the current level. Diagnostic only.
    pub fn peek(&mut self) -> f64 {
        self.peek_at(Utc::now())
    }

    /// Refill up to `now` and report the current level.
    pub fn peek_at(&mut self, now: DateTime<Utc>) -> f64 {
        self.refill(now);
        self.level
    }

    /// Time until `n` tokens are available at the current rate.
    ///
    /// `None` when the bucket can never hold `n` tokens or the rate is zero.
    pub fn wait_time_at(&mut self, n: f64, now: DateTime<Utc>) -> Option<Duration> {
        self.refill(now);
        if !n.is_finite() || n > self.capacity {
            return None;
        }
        let deficit = n - self.level;
        if deficit <= 0.0 {
            return Some(Duration::ZERO);
        }
        if self.rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(deficit / self.rate).ok()
    }

    /// Maximum token level.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Refill rate in tokens per second.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Instant of the last level update.
    #[must_use]
    pub const fn last_refill_at(&self) -> DateTime<Utc> {
        self.last_refill_at
    }

    /// Number of successful consume calls.
    #[must_use]
    pub const fn admitted(&self) -> u64 {
        self.admitted
    }

    /// Number of refused consume calls.
    #[must_use]
    pub const fn denied(&self) -> u64 {
        self.denied
    }

    /// Replace the refill rate for subsequent refills.
    pub(crate) fn set_rate(&mut self, rate: f64) {
        self.rate = rate.max(0.0);
    }

    /// Settle tokens earned at the old rate up to `now`, then switch rate and
    /// capacity. The level is clamped to the new capacity.
    pub(crate) fn reshape_at(
        &mut self,
        rate: f64,
        capacity: f64,
        now: DateTime<Utc>,
    ) -> Result<(), ThrottleError> {
        validate_rate(rate)?;
        validate_capacity(capacity)?;
        self.refill(now);
        self.rate = rate;
        self.capacity = capacity;
        self.level = self.level.min(capacity);
        Ok(())
    }
}

pub(crate) fn validate_rate(rate: f64) -> Result<(), ThrottleError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(ThrottleError::invalid(format!(
            "rate must be a finite value >= 0, got {rate}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_capacity(capacity: f64) -> Result<(), ThrottleError> {
    if !capacity.is_finite() || capacity <= 0.0 {
        return Err(ThrottleError::invalid(format!(
            "capacity must be a finite value > 0, got {capacity}"
        )));
    }
    Ok(())
}
