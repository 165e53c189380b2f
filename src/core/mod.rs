//! Token buckets, diurnal rate curves and per-project registries.

pub mod audit;
pub mod bucket;
pub mod curve;
pub mod diurnal;
pub mod error;
pub mod registry;
pub mod timezone;

pub use audit::{
    build_admission_event, AdmissionAction, AdmissionEvent, AuditSink, InMemoryAuditSink,
    TracingAuditSink,
};
pub use bucket::Bucket;
pub use curve::{CurveParams, DailyJitter, Peak, RateCurve, WeekdayScaling, MINUTES_PER_DAY};
pub use diurnal::{BucketMode, DiurnalRateBucket};
pub use error::{AppResult, ThrottleError};
pub use registry::{create_bucket, BucketHandle, BucketSpec, ProjectBuckets, SharedProjectBuckets};
pub use timezone::{parse_timezone, random_timezone, Timezone};
