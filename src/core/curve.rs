//! Diurnal rate curves.
//!
//! A curve is the sum of two heavy-tailed peaks over the 24-hour day,
//! sampled once per minute into a 1440-entry table. Two optional
//! refinements can be baked into the table:
//!
//! - [`DailyJitter`]: nudges each peak's center and spread by an amount
//!   derived from the calendar date, so the same day always yields the same
//!   curve while consecutive days differ.
//! - [`WeekdayScaling`]: multiplies the whole day by a per-weekday factor.
//!
//! Distances between an hour and a peak center wrap around midnight, so the
//! table is continuous from minute 1439 to minute 0.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::ThrottleError;

/// Samples per table, one per minute of the day.
pub const MINUTES_PER_DAY: usize = 24 * 60;

const HOURS_PER_DAY: f64 = 24.0;

/// One unimodal activity peak, shaped as a scaled Student-t density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Hour of day of the peak, in `[0, 24)`.
    pub center_hour: f64,
    /// Width of the peak in hours.
    pub spread_hours: f64,
    /// Degrees of freedom; 1 gives a Cauchy shape, large values approach a
    /// Gaussian.
    #[serde(default = "default_dof")]
    pub dof: f64,
    /// Relative height of this peak in the mixture.
    pub weight: f64,
}

const fn default_dof() -> f64 {
    1.0
}

impl Peak {
    /// Peak with a Cauchy shape (one degree of freedom).
    #[must_use]
    pub const fn new(center_hour: f64, spread_hours: f64, weight: f64) -> Self {
        Self {
            center_hour,
            spread_hours,
            dof: 1.0,
            weight,
        }
    }

    /// Late-morning activity peak.
    #[must_use]
    pub const fn morning() -> Self {
        Self::new(11.0, 2.0, 0.5)
    }

    /// Wider afternoon/evening peak.
    #[must_use]
    pub const fn evening() -> Self {
        Self::new(16.0, 3.0, 1.0 / 3.0)
    }

    fn density(&self, hour: f64) -> f64 {
        let mut distance = (hour - self.center_hour).rem_euclid(HOURS_PER_DAY);
        if distance > HOURS_PER_DAY / 2.0 {
            distance = HOURS_PER_DAY - distance;
        }
        let z = distance / self.spread_hours;
        self.weight * (1.0 + z * z / self.dof).powf(-(self.dof + 1.0) / 2.0)
    }

    fn validate(&self) -> Result<(), ThrottleError> {
        if !self.center_hour.is_finite() || !(0.0..HOURS_PER_DAY).contains(&self.center_hour) {
            return Err(ThrottleError::invalid(format!(
                "peak center must be within [0, 24), got {}",
                self.center_hour
            )));
        }
        if !self.spread_hours.is_finite() || self.spread_hours <= 0.0 {
            return Err(ThrottleError::invalid(format!(
                "peak spread must be > 0, got {}",
                self.spread_hours
            )));
        }
        if !self.dof.is_finite() || self.dof <= 0.0 {
            return Err(ThrottleError::invalid(format!(
                "peak dof must be > 0, got {}",
                self.dof
            )));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(ThrottleError::invalid(format!(
                "peak weight must be >= 0, got {}",
                self.weight
            )));
        }
        Ok(())
    }
}

/// Per-date perturbation of peak centers and spreads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyJitter {
    /// Maximum shift of each peak center, in hours.
    pub center_hours: f64,
    /// Maximum relative change of each spread (0.1 = ±10%).
    pub spread_fraction: f64,
    /// Mixed into the date seed; buckets sharing a seed share their jitter.
    pub seed: u64,
}

impl Default for DailyJitter {
    fn default() -> Self {
        Self {
            center_hours: 0.5,
            spread_fraction: 0.1,
            seed: 0,
        }
    }
}

impl DailyJitter {
    fn validate(&self) -> Result<(), ThrottleError> {
        if !self.center_hours.is_finite() || !(0.0..12.0).contains(&self.center_hours) {
            return Err(ThrottleError::invalid(format!(
                "jitter center_hours must be within [0, 12), got {}",
                self.center_hours
            )));
        }
        if !self.spread_fraction.is_finite() || !(0.0..1.0).contains(&self.spread_fraction) {
            return Err(ThrottleError::invalid(format!(
                "jitter spread_fraction must be within [0, 1), got {}",
                self.spread_fraction
            )));
        }
        Ok(())
    }

    /// The stream for a date must not change across platforms or `rand`
    /// releases.
    fn rng_for(&self, date: NaiveDate) -> ChaCha8Rng {
        let day = u64::from(date.num_days_from_ce().unsigned_abs());
        ChaCha8Rng::seed_from_u64(self.seed ^ day.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn perturb(&self, peak: Peak, rng: &mut ChaCha8Rng) -> Peak {
        let shift = if self.center_hours > 0.0 {
            rng.random_range(-self.center_hours..=self.center_hours)
        } else {
            0.0
        };
        let stretch = if self.spread_fraction > 0.0 {
            rng.random_range(-self.spread_fraction..=self.spread_fraction)
        } else {
            0.0
        };
        Peak {
            center_hour: (peak.center_hour + shift).rem_euclid(HOURS_PER_DAY),
            spread_hours: peak.spread_hours * (1.0 + stretch),
            ..peak
        }
    }
}

/// Per-weekday activity multipliers, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekdayScaling {
    /// Multiplier for each day, Monday through Sunday.
    pub multipliers: [f64; 7],
}

impl Default for WeekdayScaling {
    fn default() -> Self {
        Self {
            multipliers: [1.0, 1.0, 1.0, 1.0, 1.0, 0.6, 0.6],
        }
    }
}

impl WeekdayScaling {
    fn validate(&self) -> Result<(), ThrottleError> {
        if self.multipliers.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(ThrottleError::invalid(
                "weekday multipliers must be finite and >= 0",
            ));
        }
        if self.busiest() <= 0.0 {
            return Err(ThrottleError::invalid(
                "at least one weekday multiplier must be > 0",
            ));
        }
        Ok(())
    }

    fn busiest(&self) -> f64 {
        self.multipliers.iter().copied().fold(0.0, f64::max)
    }

    /// Multiplier for `day`.
    #[must_use]
    pub fn factor(&self, day: Weekday) -> f64 {
        self.multipliers[day.num_days_from_monday() as usize]
    }
}

/// Parameters of the diurnal curve. Jitter and weekday scaling are
/// independently optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParams {
    /// The two peaks summed into the curve.
    pub peaks: [Peak; 2],
    /// Per-date perturbation; `None` keeps every day identical.
    pub jitter: Option<DailyJitter>,
    /// Per-weekday multiplier; `None` treats all days alike.
    pub weekday: Option<WeekdayScaling>,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            peaks: [Peak::morning(), Peak::evening()],
            jitter: None,
            weekday: None,
        }
    }
}

impl CurveParams {
    /// Enable daily jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: DailyJitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Enable weekday scaling.
    #[must_use]
    pub fn with_weekday_scaling(mut self, weekday: WeekdayScaling) -> Self {
        self.weekday = Some(weekday);
        self
    }

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ThrottleError> {
        for peak in &self.peaks {
            peak.validate()?;
        }
        if self.peaks.iter().map(|p| p.weight).sum::<f64>() <= 0.0 {
            return Err(ThrottleError::invalid("peak weights must not all be zero"));
        }
        if let Some(jitter) = &self.jitter {
            jitter.validate()?;
        }
        if let Some(weekday) = &self.weekday {
            weekday.validate()?;
        }
        Ok(())
    }

    /// Whether tables built for different dates can differ.
    #[must_use]
    pub const fn varies_by_date(&self) -> bool {
        self.jitter.is_some() || self.weekday.is_some()
    }

    /// Build the table for the local calendar date `date`.
    ///
    /// Parameters are assumed valid; see [`CurveParams::validate`].
    #[must_use]
    pub fn build(&self, date: NaiveDate) -> RateCurve {
        let peaks = match &self.jitter {
            Some(jitter) => {
                let mut rng = jitter.rng_for(date);
                self.peaks.map(|peak| jitter.perturb(peak, &mut rng))
            }
            None => self.peaks,
        };

        let mut samples: Vec<f64> = (0..MINUTES_PER_DAY)
            .map(|minute| {
                let hour = minute as f64 / 60.0;
                peaks.iter().map(|peak| peak.density(hour)).sum()
            })
            .collect();
        let mut curve_max = samples.iter().copied().fold(0.0, f64::max);

        // The busiest weekday keeps its full height; quieter days are scaled
        // down relative to it, so normalization still maps the weekly peak
        // to the nominal rate.
        if let Some(weekday) = &self.weekday {
            let factor = weekday.factor(date.weekday());
            for sample in &mut samples {
                *sample *= factor;
            }
            curve_max *= weekday.busiest();
        }

        RateCurve {
            samples,
            curve_max,
            day: self.varies_by_date().then_some(date),
        }
    }
}

/// Precomputed per-minute table of relative rates.
#[derive(Debug, Clone, PartialEq)]
pub struct RateCurve {
    samples: Vec<f64>,
    curve_max: f64,
    day: Option<NaiveDate>,
}

impl RateCurve {
    /// Raw table values, one per minute starting at local midnight.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Normalization constant: the value that maps to the nominal rate.
    #[must_use]
    pub const fn curve_max(&self) -> f64 {
        self.curve_max
    }

    /// Date the table was built for, or `None` if it is valid for every day.
    #[must_use]
    pub const fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    /// Whether this table can be used for the local date `date`.
    #[must_use]
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.day.is_none_or(|day| day == date)
    }

    /// Rate at `minute` of the day for a curve peaking at `nominal_rate`.
    ///
    /// A negative or NaN `nominal_rate` yields zero.
    #[must_use]
    pub fn rate_at(&self, minute: usize, nominal_rate: f64) -> f64 {
        if self.curve_max <= 0.0 || nominal_rate.is_nan() || nominal_rate <= 0.0 {
            return 0.0;
        }
        let sample = self.samples[minute % MINUTES_PER_DAY];
        (sample * nominal_rate / self.curve_max).clamp(0.0, nominal_rate)
    }

    /// Minute of the day with the highest value.
    #[must_use]
    pub fn peak_minute(&self) -> usize {
        self.extreme_minute(|candidate, best| candidate > best)
    }

    /// Minute of the day with the lowest value.
    #[must_use]
    pub fn trough_minute(&self) -> usize {
        self.extreme_minute(|candidate, best| candidate < best)
    }

    fn extreme_minute(&self, better: impl Fn(f64, f64) -> bool) -> usize {
        let mut best = 0;
        for (minute, value) in self.samples.iter().enumerate() {
            if better(*value, self.samples[best]) {
                best = minute;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_default_curve_shape() {
        let curve = CurveParams::default().build(monday());
        assert_eq!(curve.samples().len(), MINUTES_PER_DAY);
        assert!(curve.samples().iter().all(|v| *v > 0.0));
        assert!(curve.day().is_none());

        let peak = curve.peak_minute();
        assert!((10 * 60..=13 * 60).contains(&peak), "peak at minute {peak}");
        assert!((curve.rate_at(peak, 5.0) - 5.0).abs() < 1e-12);

        let trough = curve.trough_minute();
        assert!(trough < 6 * 60 || trough > 22 * 60, "trough at minute {trough}");
    }

    #[test]
    fn test_wraps_around_midnight() {
        let curve = CurveParams::default().build(monday());
        let samples = curve.samples();
        let wrap = (samples[MINUTES_PER_DAY - 1] - samples[0]).abs();
        let steepest = samples
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0, f64::max);
        assert!(wrap <= steepest);
    }

    #[test]
    fn test_jitter_is_deterministic_per_date() {
        let params = CurveParams::default().with_jitter(DailyJitter::default());
        let a = params.build(monday());
        let b = params.build(monday());
        assert_eq!(a, b);

        let next = params.build(monday().succ_opt().unwrap());
        assert_ne!(a.samples(), next.samples());
        assert_eq!(a.day(), Some(monday()));
    }

    #[test]
    fn test_jittered_curve_is_stable_across_releases() {
        let params = CurveParams::default().with_jitter(DailyJitter::default());

        let first = params.build(monday());
        assert_eq!(first.peak_minute(), 695);
        assert_eq!(first.trough_minute(), 150);
        assert!((first.rate_at(0, 5.0) - 0.457_353_014_480_922).abs() < 1e-9);
        assert!((first.rate_at(720, 5.0) - 4.843_939_619_239_3).abs() < 1e-9);
        assert!((first.rate_at(1080, 5.0) - 2.152_584_400_730_958).abs() < 1e-9);

        let second = params.build(NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
        assert_eq!(second.peak_minute(), 650);
        assert_eq!(second.trough_minute(), 101);
        assert!((second.rate_at(720, 5.0) - 4.266_124_731_881_487).abs() < 1e-9);
    }

    #[test]
    fn test_rate_at_negative_nominal_is_zero() {
        let curve = CurveParams::default().build(monday());
        assert!(curve.rate_at(0, -1.0).abs() < f64::EPSILON);
        assert!(curve.rate_at(curve.peak_minute(), f64::NAN).abs() < f64::EPSILON);
        assert!(curve.rate_at(curve.peak_minute(), 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weekday_scaling_keeps_busiest_day_peak() {
        let params = CurveParams::default().with_weekday_scaling(WeekdayScaling::default());
        let weekday = params.build(monday());
        let saturday = params.build(NaiveDate::from_ymd_opt(2024, 6, 8).unwrap());

        let peak = weekday.peak_minute();
        assert!((weekday.rate_at(peak, 10.0) - 10.0).abs() < 1e-9);
        assert!((saturday.rate_at(peak, 10.0) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation() {
        assert!(CurveParams::default().validate().is_ok());

        let mut bad = CurveParams::default();
        bad.peaks[0].spread_hours = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = CurveParams::default();
        bad.peaks[1].center_hour = 24.0;
        assert!(bad.validate().is_err());

        let mut bad = CurveParams::default();
        bad.peaks[0].weight = 0.0;
        bad.peaks[1].weight = 0.0;
        assert!(bad.validate().is_err());

        let bad = CurveParams::default().with_weekday_scaling(WeekdayScaling {
            multipliers: [0.0; 7],
        });
        assert!(bad.validate().is_err());

        let bad = CurveParams::default().with_jitter(DailyJitter {
            spread_fraction: 1.5,
            ..DailyJitter::default()
        });
        assert!(bad.validate().is_err());
    }
}
