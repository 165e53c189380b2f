//! # Prometheus Crawl Throttle
//!
//! Per-project admission control for crawl schedulers.
//!
//! A crawl scheduler keeps one token bucket per project (crawl target) and
//! asks it for a token before releasing each fetch task. A successful
//! consume admits one dispatch this tick; a refusal defers the project to a
//! later tick.
//!
//! ## Key Features
//!
//! - **Token bucket**: fixed capacity, constant refill, starts full. Refill
//!   is lazy and driven by timestamps; a clock that moves backward never
//!   grants tokens.
//! - **Diurnal rate shaping**: the refill rate follows a precomputed
//!   24-hour curve with a morning and an evening peak, evaluated in the
//!   bucket's timezone and scaled so the peak equals the configured rate.
//!   Optional per-day jitter and weekday scaling keep the cadence from
//!   repeating week over week.
//! - **Signed capacity**: operators enable shaping with a negative capacity
//!   (`burst = -20` means "diurnal, capacity 20"). The sign is translated to
//!   [`core::BucketMode`] at the configuration boundary.
//! - **Registries**: create-on-demand, one bucket per project, with a
//!   single-threaded and a lock-per-bucket shared variant.
//!
//! ```rust
//! use prometheus_crawl_throttle::core::{BucketSpec, ProjectBuckets};
//!
//! let defaults = BucketSpec::from_signed(1.0, 3.0, None)?;
//! let mut registry = ProjectBuckets::new(defaults);
//!
//! if registry.try_consume("example.com", 1.0)? {
//!     // dispatch one fetch task for example.com
//! }
//! assert_eq!(registry.capacity("example.com"), Some(3.0));
//! # Ok::<(), prometheus_crawl_throttle::core::ThrottleError>(())
//! ```
//!
//! Buckets are in-memory only and are not coordinated across processes.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Token buckets, rate curves and registries.
pub mod core;
/// Configuration models for project buckets.
pub mod config;
/// Builders to construct registries from configuration.
pub mod builders;
/// Monitoring API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
