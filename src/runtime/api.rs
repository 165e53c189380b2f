//! Monitoring models for admin surfaces.
//!
//! Snapshots refill buckets up to the current instant but never consume
//! tokens, so reading them cannot change an admission decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{DiurnalRateBucket, ProjectBuckets, SharedProjectBuckets};
use crate::util::clock::Clock;

/// Point-in-time view of one project's bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    /// Project key.
    pub project: String,
    /// `"static"` or `"dynamic"`.
    pub mode: String,
    /// Unsigned capacity.
    pub capacity: f64,
    /// Tokens available.
    pub level: f64,
    /// Configured rate (peak rate in dynamic mode).
    pub nominal_rate: f64,
    /// Rate in effect at `taken_at`.
    pub current_rate: f64,
    /// Timezone the time of day is computed in (IANA name or UTC offset).
    pub timezone: String,
    /// Successful consume calls.
    pub admitted: u64,
    /// Refused consume calls.
    pub denied: u64,
    /// Snapshot time.
    pub taken_at: DateTime<Utc>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Live buckets.
    pub buckets: usize,
}

/// Snapshot a single bucket at `now`.
pub fn snapshot_bucket(
    project: &str,
    bucket: &mut DiurnalRateBucket,
    now: DateTime<Utc>,
) -> BucketSnapshot {
    let level = bucket.peek_at(now);
    BucketSnapshot {
        project: project.to_owned(),
        mode: if bucket.mode().is_dynamic() {
            "dynamic".into()
        } else {
            "static".into()
        },
        capacity: bucket.capacity(),
        level,
        nominal_rate: bucket.nominal_rate(),
        current_rate: bucket.effective_rate(now),
        timezone: bucket.timezone().to_string(),
        admitted: bucket.admitted(),
        denied: bucket.denied(),
        taken_at: now,
    }
}

/// Snapshot every bucket in a registry, sorted by project key.
pub fn list_buckets<C: Clock>(registry: &mut ProjectBuckets<C>) -> Vec<BucketSnapshot> {
    let now = registry.clock().now();
    let mut snapshots: Vec<_> = registry
        .iter_mut()
        .map(|(project, bucket)| snapshot_bucket(project, bucket, now))
        .collect();
    snapshots.sort_by(|a, b| a.project.cmp(&b.project));
    snapshots
}

/// Snapshot every bucket in a shared registry, sorted by project key.
pub fn list_shared_buckets<C: Clock>(registry: &SharedProjectBuckets<C>) -> Vec<BucketSnapshot> {
    let now = registry.clock().now();
    let mut snapshots: Vec<_> = registry
        .handles()
        .into_iter()
        .map(|(project, handle)| snapshot_bucket(&project, &mut handle.lock(), now))
        .collect();
    snapshots.sort_by(|a, b| a.project.cmp(&b.project));
    snapshots
}

/// Return a health payload.
#[must_use]
pub const fn health(buckets: usize) -> Health {
    Health { ok: true, buckets }
}
