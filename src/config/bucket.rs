//! Bucket and throttle configuration structures.
//!
//! `burst` is the operator-facing signed capacity: a negative value enables
//! diurnal shaping and its magnitude is the capacity. It is translated into
//! a [`BucketMode`] by [`BucketConfig::to_spec`] and nowhere else.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{parse_timezone, AppResult, BucketMode, BucketSpec, CurveParams, ThrottleError};

/// Environment variable naming a JSON configuration file.
pub const ENV_CONFIG_PATH: &str = "CRAWL_THROTTLE_CONFIG";
/// Environment variable overriding the default rate.
pub const ENV_RATE: &str = "CRAWL_THROTTLE_RATE";
/// Environment variable overriding the default signed capacity.
pub const ENV_BURST: &str = "CRAWL_THROTTLE_BURST";
/// Environment variable overriding the default timezone.
pub const ENV_TIMEZONE: &str = "CRAWL_THROTTLE_TIMEZONE";

/// Per-project bucket settings as operators write them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Tokens per second; the peak rate when `burst` is negative.
    pub rate: f64,
    /// Signed capacity: negative enables diurnal shaping.
    pub burst: f64,
    /// IANA zone such as `"Europe/Berlin"` or a UTC offset such as
    /// `"+02:00"`; unset picks a random common zone per bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Curve parameters for diurnal shaping; unset uses the default curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<CurveParams>,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            burst: 3.0,
            timezone: None,
            curve: None,
        }
    }
}

impl BucketConfig {
    /// Translate into resolved bucket settings.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] for a negative rate, zero
    /// capacity, bad timezone or bad curve parameters.
    pub fn to_spec(&self) -> Result<BucketSpec, ThrottleError> {
        let timezone = self.timezone.as_deref().map(parse_timezone).transpose()?;
        let spec = BucketSpec {
            rate: self.rate,
            mode: BucketMode::from_signed(self.burst, self.curve.clone())?,
            timezone,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Validate bucket configuration values.
    ///
    /// # Errors
    ///
    /// Same conditions as [`BucketConfig::to_spec`].
    pub fn validate(&self) -> Result<(), ThrottleError> {
        self.to_spec().map(|_| ())
    }
}

/// Root throttle configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Settings for projects without an override.
    #[serde(default)]
    pub default: BucketConfig,
    /// Map of project key to settings.
    #[serde(default)]
    pub projects: HashMap<String, BucketConfig>,
}

impl ThrottleConfig {
    /// Validate the default and every project override.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] naming the offending entry.
    pub fn validate(&self) -> Result<(), ThrottleError> {
        self.default
            .validate()
            .map_err(|e| ThrottleError::invalid(format!("default bucket invalid: {e}")))?;
        for (name, project) in &self.projects {
            project
                .validate()
                .map_err(|e| ThrottleError::invalid(format!("project `{name}` invalid: {e}")))?;
        }
        Ok(())
    }

    /// Parse throttle configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::ConfigParse`] for malformed JSON and
    /// [`ThrottleError::InvalidConfig`] for out-of-range values.
    pub fn from_json_str(input: &str) -> Result<Self, ThrottleError> {
        let cfg: Self =
            serde_json::from_str(input).map_err(|e| ThrottleError::ConfigParse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not hold a valid config.
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading throttle config {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("loading throttle config {}", path.display()))
    }

    /// Load configuration from the process environment, after reading a
    /// `.env` file if one exists.
    ///
    /// `CRAWL_THROTTLE_CONFIG` names a JSON file to start from; the
    /// `CRAWL_THROTTLE_RATE`, `CRAWL_THROTTLE_BURST` and
    /// `CRAWL_THROTTLE_TIMEZONE` variables then override the default bucket.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, unparseable numbers or invalid values.
    pub fn from_env() -> AppResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ThrottleConfig::from_env`], reading variables through
    /// `lookup`.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, unparseable numbers or invalid values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut cfg = match lookup(ENV_CONFIG_PATH) {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        if let Some(rate) = lookup(ENV_RATE) {
            cfg.default.rate = rate
                .trim()
                .parse()
                .with_context(|| format!("{ENV_RATE} is not a number: `{rate}`"))?;
        }
        if let Some(burst) = lookup(ENV_BURST) {
            cfg.default.burst = burst
                .trim()
                .parse()
                .with_context(|| format!("{ENV_BURST} is not a number: `{burst}`"))?;
        }
        if let Some(timezone) = lookup(ENV_TIMEZONE) {
            cfg.default.timezone = Some(timezone);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
