//! Token bucket whose refill rate follows the time of day.
//!
//! In static mode a [`DiurnalRateBucket`] is a plain [`Bucket`]. In dynamic
//! mode the rate is read from a per-minute [`RateCurve`] evaluated in the
//! bucket's timezone and scaled so the curve's peak equals the nominal rate.
//!
//! Operators configure the mode through the sign of the capacity: a negative
//! value enables diurnal shaping and its magnitude is the capacity. That
//! convention is translated into [`BucketMode`] once, by
//! [`BucketMode::from_signed`]; nothing past that boundary looks at signs.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::core::bucket::{validate_capacity, validate_rate};
use crate::core::curve::{CurveParams, RateCurve};
use crate::core::timezone::{random_timezone, Timezone};
use crate::core::{Bucket, ThrottleError};

/// How a bucket derives its refill rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BucketMode {
    /// Constant rate.
    Static {
        /// Maximum token level.
        capacity: f64,
    },
    /// Rate sampled from a diurnal curve.
    Dynamic {
        /// Maximum token level.
        capacity: f64,
        /// Curve construction parameters.
        curve: CurveParams,
    },
}

impl BucketMode {
    /// Translate the operator-facing signed capacity: negative enables
    /// diurnal shaping, the magnitude is the capacity.
    ///
    /// `curve` is only used in dynamic mode; `None` selects the default curve.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] for a zero or non-finite
    /// capacity, or invalid curve parameters.
    pub fn from_signed(
        signed_capacity: f64,
        curve: Option<CurveParams>,
    ) -> Result<Self, ThrottleError> {
        let mode = if signed_capacity < 0.0 {
            Self::Dynamic {
                capacity: -signed_capacity,
                curve: curve.unwrap_or_default(),
            }
        } else {
            Self::Static {
                capacity: signed_capacity,
            }
        };
        mode.validate()?;
        Ok(mode)
    }

    /// Check capacity and curve parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ThrottleError> {
        validate_capacity(self.capacity())?;
        if let Self::Dynamic { curve, .. } = self {
            curve.validate()?;
        }
        Ok(())
    }

    /// Unsigned capacity.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        match self {
            Self::Static { capacity } | Self::Dynamic { capacity, .. } => *capacity,
        }
    }

    /// Operator-facing signed form of this mode.
    #[must_use]
    pub fn signed_capacity(&self) -> f64 {
        match self {
            Self::Static { capacity } => *capacity,
            Self::Dynamic { capacity, .. } => -*capacity,
        }
    }

    /// Whether the rate follows the diurnal curve.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }
}

/// Token bucket with an optional time-of-day dependent refill rate.
#[derive(Debug, Clone)]
pub struct DiurnalRateBucket {
    inner: Bucket,
    nominal_rate: f64,
    mode: BucketMode,
    timezone: Timezone,
    /// Table for the most recent local date seen; `None` in static mode.
    curve: Option<RateCurve>,
    /// Table for the day after `curve`, when tables vary by date.
    upcoming: Option<RateCurve>,
}

impl DiurnalRateBucket {
    /// Create a bucket from the operator-facing signed capacity.
    ///
    /// Without a timezone a random common zone is assigned and kept for the
    /// bucket's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] for a negative rate, a zero
    /// capacity magnitude, or invalid curve parameters.
    pub fn new(
        nominal_rate: f64,
        signed_capacity: f64,
        timezone: Option<Timezone>,
        curve: Option<CurveParams>,
    ) -> Result<Self, ThrottleError> {
        let mode = BucketMode::from_signed(signed_capacity, curve)?;
        Self::with_mode_at(nominal_rate, mode, timezone, Utc::now())
    }

    /// Create a bucket from an explicit mode, anchored at `now`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DiurnalRateBucket::new`].
    pub fn with_mode_at(
        nominal_rate: f64,
        mode: BucketMode,
        timezone: Option<Timezone>,
        now: DateTime<Utc>,
    ) -> Result<Self, ThrottleError> {
        validate_rate(nominal_rate)?;
        mode.validate()?;
        let timezone = timezone.unwrap_or_else(random_timezone);
        let (curve, upcoming) = Self::tables_for(&mode, timezone, now);
        let mut bucket = Self {
            inner: Bucket::new_at(nominal_rate, mode.capacity(), now)?,
            nominal_rate,
            mode,
            timezone,
            curve,
            upcoming,
        };
        bucket.inner.set_rate(bucket.effective_rate(now));
        Ok(bucket)
    }

    fn tables_for(
        mode: &BucketMode,
        timezone: Timezone,
        now: DateTime<Utc>,
    ) -> (Option<RateCurve>, Option<RateCurve>) {
        match mode {
            BucketMode::Static { .. } => (None, None),
            BucketMode::Dynamic { curve, .. } => {
                let today = timezone.local(now).date();
                (Some(curve.build(today)), Self::upcoming_for(curve, today))
            }
        }
    }

    fn upcoming_for(params: &CurveParams, today: NaiveDate) -> Option<RateCurve> {
        if !params.varies_by_date() {
            return None;
        }
        today.succ_opt().map(|tomorrow| params.build(tomorrow))
    }

    /// Refill rate in effect at `now`, in tokens per second.
    ///
    /// Pure: never mutates the bucket. In dynamic mode this is a table
    /// lookup in the cached table or the next day's. A `now` on any other
    /// local date builds a throwaway table, which costs a full curve build.
    #[must_use]
    pub fn effective_rate(&self, now: DateTime<Utc>) -> f64 {
        let BucketMode::Dynamic { curve: params, .. } = &self.mode else {
            return self.nominal_rate;
        };
        let local = self.timezone.local(now);
        let minute = (local.hour() * 60 + local.minute()) as usize;
        let date = local.date();
        let cached = [&self.curve, &self.upcoming]
            .into_iter()
            .flatten()
            .find(|curve| curve.applies_to(date));
        match cached {
            Some(curve) => curve.rate_at(minute, self.nominal_rate),
            None => params.build(date).rate_at(minute, self.nominal_rate),
        }
    }

    /// Refill rate in effect right now.
    #[must_use]
    pub fn current_rate(&self) -> f64 {
        self.effective_rate(Utc::now())
    }

    /// Move the cached tables forward when the local date has changed, then
    /// push the rate at `now` into the inner bucket.
    fn sync_rate(&mut self, now: DateTime<Utc>) {
        if let BucketMode::Dynamic { curve: params, .. } = &self.mode {
            let today = self.timezone.local(now).date();
            if !self.curve.as_ref().is_some_and(|c| c.applies_to(today)) {
                if self.upcoming.as_ref().is_some_and(|c| c.applies_to(today)) {
                    self.curve = self.upcoming.take();
                } else {
                    tracing::debug!(
                        date = %today,
                        weekday = ?today.weekday(),
                        "rebuilding diurnal rate curve"
                    );
                    self.curve = Some(params.build(today));
                }
                self.upcoming = Self::upcoming_for(params, today);
            }
        }
        let rate = self.effective_rate(now);
        self.inner.set_rate(rate);
    }

    /// Try to take `n` tokens now.
    pub fn try_consume(&mut self, n: f64) -> bool {
        self.try_consume_at(n, Utc::now())
    }

    /// Try to take `n` tokens at `now`.
    ///
    /// The refill since the previous call uses the rate at `now` for the
    /// whole interval; callers should tick at least once per minute.
    pub fn try_consume_at(&mut self, n: f64, now: DateTime<Utc>) -> bool {
        self.sync_rate(now);
        self.inner.try_consume_at(n, now)
    }

    /// Refill up to `now` and report the current level.
    pub fn peek_at(&mut self, now: DateTime<Utc>) -> f64 {
        self.sync_rate(now);
        self.inner.peek_at(now)
    }

    /// Time until `n` tokens are available at the rate in effect at `now`.
    pub fn wait_time_at(&mut self, n: f64, now: DateTime<Utc>) -> Option<Duration> {
        self.sync_rate(now);
        self.inner.wait_time_at(n, now)
    }

    /// Switch rate and mode, keeping the tokens already earned.
    ///
    /// Tokens accrued up to `now` are settled at the old rate, then the level
    /// is clamped to the new capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] and leaves the bucket
    /// unchanged when the new settings are invalid.
    pub fn reconfigure_at(
        &mut self,
        nominal_rate: f64,
        mode: BucketMode,
        now: DateTime<Utc>,
    ) -> Result<(), ThrottleError> {
        validate_rate(nominal_rate)?;
        mode.validate()?;
        self.sync_rate(now);
        let current = self.inner.rate();
        self.inner.reshape_at(current, mode.capacity(), now)?;
        (self.curve, self.upcoming) = Self::tables_for(&mode, self.timezone, now);
        self.nominal_rate = nominal_rate;
        self.mode = mode;
        self.sync_rate(now);
        Ok(())
    }

    /// Unsigned capacity, whatever the mode.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.inner.capacity()
    }

    /// Configured rate: the constant rate, or the curve's peak rate.
    #[must_use]
    pub const fn nominal_rate(&self) -> f64 {
        self.nominal_rate
    }

    /// Active mode.
    #[must_use]
    pub const fn mode(&self) -> &BucketMode {
        &self.mode
    }

    /// Timezone used to compute the time of day.
    #[must_use]
    pub const fn timezone(&self) -> Timezone {
        self.timezone
    }

    /// Cached rate table; `None` in static mode.
    #[must_use]
    pub const fn rate_curve(&self) -> Option<&RateCurve> {
        self.curve.as_ref()
    }

    /// Prebuilt table for the day after [`Self::rate_curve`]; `None` unless
    /// tables vary by date.
    #[must_use]
    pub const fn upcoming_curve(&self) -> Option<&RateCurve> {
        self.upcoming.as_ref()
    }

    /// Number of successful consume calls.
    #[must_use]
    pub const fn admitted(&self) -> u64 {
        self.inner.admitted()
    }

    /// Number of refused consume calls.
    #[must_use]
    pub const fn denied(&self) -> u64 {
        self.inner.denied()
    }
}
