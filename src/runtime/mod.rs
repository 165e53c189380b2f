//! Monitoring API surface.

pub mod api;

pub use api::{health, list_buckets, list_shared_buckets, snapshot_bucket, BucketSnapshot, Health};
