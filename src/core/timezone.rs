//! Clock frames for the time of day.
//!
//! A bucket evaluates its curve in local time. Named IANA zones follow
//! daylight-saving transitions; fixed offsets such as `"+05:30"` never move.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rand::seq::IndexedRandom;

use crate::core::ThrottleError;

/// Zones an unconfigured bucket may be assigned, spread across the globe.
const COMMON_ZONES: &[Tz] = &[
    Tz::Pacific__Honolulu,
    Tz::America__Anchorage,
    Tz::America__Los_Angeles,
    Tz::America__Denver,
    Tz::America__Chicago,
    Tz::America__Mexico_City,
    Tz::America__New_York,
    Tz::America__Toronto,
    Tz::America__Bogota,
    Tz::America__Santiago,
    Tz::America__Sao_Paulo,
    Tz::America__Argentina__Buenos_Aires,
    Tz::Atlantic__Azores,
    Tz::Europe__London,
    Tz::Europe__Lisbon,
    Tz::Europe__Paris,
    Tz::Europe__Berlin,
    Tz::Europe__Madrid,
    Tz::Europe__Warsaw,
    Tz::Europe__Athens,
    Tz::Europe__Istanbul,
    Tz::Europe__Moscow,
    Tz::Africa__Lagos,
    Tz::Africa__Cairo,
    Tz::Africa__Johannesburg,
    Tz::Africa__Nairobi,
    Tz::Asia__Dubai,
    Tz::Asia__Tehran,
    Tz::Asia__Karachi,
    Tz::Asia__Kolkata,
    Tz::Asia__Kathmandu,
    Tz::Asia__Dhaka,
    Tz::Asia__Bangkok,
    Tz::Asia__Jakarta,
    Tz::Asia__Shanghai,
    Tz::Asia__Singapore,
    Tz::Asia__Hong_Kong,
    Tz::Asia__Seoul,
    Tz::Asia__Tokyo,
    Tz::Australia__Perth,
    Tz::Australia__Adelaide,
    Tz::Australia__Sydney,
    Tz::Pacific__Auckland,
];

/// Timezone a bucket reads its local time of day in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timezone {
    /// IANA zone such as `Europe/Berlin`, with daylight-saving rules.
    Named(Tz),
    /// Constant UTC offset.
    Fixed(FixedOffset),
}

impl Timezone {
    /// Coordinated Universal Time.
    pub const UTC: Self = Self::Named(Tz::UTC);

    /// Local wall-clock time at the instant `at`.
    #[must_use]
    pub fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Named(tz) => at.with_timezone(tz).naive_local(),
            Self::Fixed(offset) => at.with_timezone(offset).naive_local(),
        }
    }

    /// Parse an IANA name (`"America/New_York"`), `"UTC"`, `"Z"` or a UTC
    /// offset (`"+05:30"`).
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] when the text is neither.
    pub fn parse(text: &str) -> Result<Self, ThrottleError> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
            return Ok(Self::UTC);
        }
        if trimmed.starts_with(['+', '-']) {
            return trimmed.parse::<FixedOffset>().map(Self::Fixed).map_err(|e| {
                ThrottleError::invalid(format!("timezone `{text}` is not a UTC offset: {e}"))
            });
        }
        trimmed.parse::<Tz>().map(Self::Named).map_err(|e| {
            ThrottleError::invalid(format!("timezone `{text}` is not an IANA zone: {e}"))
        })
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tz) => f.write_str(tz.name()),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for Timezone {
    type Err = ThrottleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Tz> for Timezone {
    fn from(tz: Tz) -> Self {
        Self::Named(tz)
    }
}

impl From<FixedOffset> for Timezone {
    fn from(offset: FixedOffset) -> Self {
        Self::Fixed(offset)
    }
}

/// Pick a common zone at random so unconfigured buckets peak at different
/// wall-clock times.
#[must_use]
pub fn random_timezone() -> Timezone {
    COMMON_ZONES
        .choose(&mut rand::rng())
        .copied()
        .map_or(Timezone::UTC, Timezone::Named)
}

/// Parse a timezone; see [`Timezone::parse`].
///
/// # Errors
///
/// Returns [`ThrottleError::InvalidConfig`] for unknown zones and
/// malformed offsets.
pub fn parse_timezone(text: &str) -> Result<Timezone, ThrottleError> {
    Timezone::parse(text)
}
