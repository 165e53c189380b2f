//! Configuration models for project buckets.

pub mod bucket;

pub use bucket::{BucketConfig, ThrottleConfig, ENV_BURST, ENV_CONFIG_PATH, ENV_RATE, ENV_TIMEZONE};
