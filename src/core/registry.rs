//! Per-project bucket registries.
//!
//! A scheduler owns one bucket per project and asks it for a token before
//! releasing each fetch task. Buckets are created on first use from the
//! project's override, or from the registry defaults.
//!
//! [`ProjectBuckets`] is for a dispatch loop that visits projects
//! sequentially. [`SharedProjectBuckets`] serves several threads: the map sits
//! behind a `parking_lot::RwLock` and each bucket behind its own
//! `parking_lot::Mutex`, so two threads never touch the same bucket at once.
//! Locks are taken in the order bucket map, overrides, bucket, audit sink.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::core::audit::{build_admission_event, AdmissionAction, AuditSink};
use crate::core::bucket::validate_rate;
use crate::core::{BucketMode, DiurnalRateBucket, ThrottleError, Timezone};
use crate::util::clock::{Clock, SystemClock};

/// Resolved settings for one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSpec {
    /// Constant rate, or peak rate in dynamic mode (tokens per second).
    pub rate: f64,
    /// Static or diurnal rate.
    pub mode: BucketMode,
    /// Clock frame for the time of day; `None` picks a random zone per
    /// bucket.
    pub timezone: Option<Timezone>,
}

impl BucketSpec {
    /// Settings from the operator-facing signed capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] for invalid values.
    pub fn from_signed(
        rate: f64,
        signed_capacity: f64,
        timezone: Option<Timezone>,
    ) -> Result<Self, ThrottleError> {
        let spec = Self {
            rate,
            mode: BucketMode::from_signed(signed_capacity, None)?,
            timezone,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check rate and mode.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ThrottleError> {
        validate_rate(self.rate)?;
        self.mode.validate()
    }

    /// Build a bucket anchored at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] for invalid values.
    pub fn build_at(&self, now: DateTime<Utc>) -> Result<DiurnalRateBucket, ThrottleError> {
        DiurnalRateBucket::with_mode_at(self.rate, self.mode.clone(), self.timezone, now)
    }
}

/// Create a standalone bucket from the operator-facing settings.
///
/// # Errors
///
/// Returns [`ThrottleError::InvalidConfig`] for a negative rate or a zero
/// capacity magnitude.
pub fn create_bucket(
    nominal_rate: f64,
    signed_capacity: f64,
    timezone: Option<Timezone>,
) -> Result<DiurnalRateBucket, ThrottleError> {
    DiurnalRateBucket::new(nominal_rate, signed_capacity, timezone, None)
}

fn record_event(
    audit: Option<&mut Box<dyn AuditSink>>,
    project: &str,
    action: AdmissionAction,
    tokens: f64,
    bucket: &mut DiurnalRateBucket,
    now: DateTime<Utc>,
) {
    if let Some(sink) = audit {
        let level = bucket.peek_at(now);
        let rate = bucket.effective_rate(now);
        sink.record(build_admission_event(
            project, action, tokens, level, rate, now,
        ));
    }
}

/// Single-threaded registry: one bucket per project key.
pub struct ProjectBuckets<C: Clock = SystemClock> {
    defaults: BucketSpec,
    overrides: HashMap<String, BucketSpec>,
    buckets: HashMap<String, DiurnalRateBucket>,
    clock: C,
    audit: Option<Box<dyn AuditSink>>,
}

impl ProjectBuckets<SystemClock> {
    /// Registry on the system clock.
    #[must_use]
    pub fn new(defaults: BucketSpec) -> Self {
        Self::with_clock(defaults, SystemClock)
    }
}

impl<C: Clock> ProjectBuckets<C> {
    /// Registry reading time from `clock`.
    #[must_use]
    pub fn with_clock(defaults: BucketSpec, clock: C) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            buckets: HashMap::new(),
            clock,
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Clock used by this registry.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Settings a new bucket for `project` would be built with.
    #[must_use]
    pub fn spec_for(&self, project: &str) -> &BucketSpec {
        self.overrides.get(project).unwrap_or(&self.defaults)
    }

    /// Bucket for `project`, created from its settings if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] when the project's settings
    /// cannot produce a bucket.
    pub fn register(&mut self, project: &str) -> Result<&mut DiurnalRateBucket, ThrottleError> {
        if !self.buckets.contains_key(project) {
            let now = self.clock.now();
            let mut bucket = self.spec_for(project).build_at(now)?;
            tracing::info!(
                project,
                capacity = bucket.capacity(),
                rate = bucket.nominal_rate(),
                dynamic = bucket.mode().is_dynamic(),
                timezone = %bucket.timezone(),
                "created project bucket"
            );
            record_event(
                self.audit.as_mut(),
                project,
                AdmissionAction::Create,
                0.0,
                &mut bucket,
                now,
            );
            self.buckets.insert(project.to_owned(), bucket);
        }
        self.buckets
            .get_mut(project)
            .ok_or_else(|| ThrottleError::invalid(format!("project `{project}` unavailable")))
    }

    /// Ask for `n` tokens on behalf of `project`, creating its bucket on
    /// demand. `Ok(true)` admits one dispatch; `Ok(false)` defers the project.
    ///
    /// # Errors
    ///
    /// Only bucket creation can fail.
    pub fn try_consume(&mut self, project: &str, n: f64) -> Result<bool, ThrottleError> {
        let now = self.clock.now();
        self.register(project)?;
        let Some(bucket) = self.buckets.get_mut(project) else {
            return Ok(false);
        };
        let admitted = bucket.try_consume_at(n, now);
        if !admitted {
            tracing::debug!(project, requested = n, "project deferred: insufficient tokens");
        }
        let action = if admitted {
            AdmissionAction::Admit
        } else {
            AdmissionAction::Defer
        };
        record_event(self.audit.as_mut(), project, action, n, bucket, now);
        Ok(admitted)
    }

    /// Unsigned capacity of the project's bucket.
    #[must_use]
    pub fn capacity(&self, project: &str) -> Option<f64> {
        self.buckets.get(project).map(DiurnalRateBucket::capacity)
    }

    /// Rate currently in effect for the project's bucket.
    #[must_use]
    pub fn current_rate(&self, project: &str) -> Option<f64> {
        let now = self.clock.now();
        self.buckets.get(project).map(|b| b.effective_rate(now))
    }

    /// Time until the project could be admitted for `n` tokens.
    pub fn wait_time(&mut self, project: &str, n: f64) -> Option<Duration> {
        let now = self.clock.now();
        self.buckets
            .get_mut(project)
            .and_then(|b| b.wait_time_at(n, now))
    }

    /// Apply new settings to `project`, now and for future re-creation.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] and changes nothing when the
    /// settings are invalid.
    pub fn reconfigure(&mut self, project: &str, spec: BucketSpec) -> Result<(), ThrottleError> {
        spec.validate()?;
        let now = self.clock.now();
        if let Some(bucket) = self.buckets.get_mut(project) {
            bucket.reconfigure_at(spec.rate, spec.mode.clone(), now)?;
            tracing::info!(
                project,
                capacity = bucket.capacity(),
                rate = bucket.nominal_rate(),
                dynamic = bucket.mode().is_dynamic(),
                "reconfigured project bucket"
            );
            record_event(
                self.audit.as_mut(),
                project,
                AdmissionAction::Reconfigure,
                0.0,
                bucket,
                now,
            );
        }
        self.overrides.insert(project.to_owned(), spec);
        Ok(())
    }

    /// Drop the project's bucket and settings.
    pub fn remove(&mut self, project: &str) -> Option<DiurnalRateBucket> {
        self.overrides.remove(project);
        let mut bucket = self.buckets.remove(project)?;
        let now = self.clock.now();
        tracing::info!(project, "removed project bucket");
        record_event(
            self.audit.as_mut(),
            project,
            AdmissionAction::Remove,
            0.0,
            &mut bucket,
            now,
        );
        Some(bucket)
    }

    /// Number of live buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no bucket has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Iterate over live buckets.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut DiurnalRateBucket)> {
        self.buckets.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

/// Shared handle to one project's bucket.
pub type BucketHandle = Arc<Mutex<DiurnalRateBucket>>;

/// Thread-safe registry with one lock per bucket.
pub struct SharedProjectBuckets<C: Clock = SystemClock> {
    defaults: BucketSpec,
    overrides: RwLock<HashMap<String, BucketSpec>>,
    buckets: RwLock<HashMap<String, BucketHandle>>,
    clock: C,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl SharedProjectBuckets<SystemClock> {
    /// Shared registry on the system clock.
    #[must_use]
    pub fn new(defaults: BucketSpec) -> Self {
        Self::with_clock(defaults, SystemClock)
    }
}

impl<C: Clock> SharedProjectBuckets<C> {
    /// Shared registry reading time from `clock`.
    #[must_use]
    pub fn with_clock(defaults: BucketSpec, clock: C) -> Self {
        Self {
            defaults,
            overrides: RwLock::new(HashMap::new()),
            buckets: RwLock::new(HashMap::new()),
            clock,
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Handle to the project's bucket, created on demand.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] when the project's settings
    /// cannot produce a bucket.
    pub fn handle(&self, project: &str) -> Result<BucketHandle, ThrottleError> {
        if let Some(handle) = self.buckets.read().get(project) {
            return Ok(Arc::clone(handle));
        }

        let mut buckets = self.buckets.write();
        // Another thread may have created it between the two locks.
        if let Some(handle) = buckets.get(project) {
            return Ok(Arc::clone(handle));
        }
        // Resolved under the map's write lock so a concurrent reconfigure
        // either finds this bucket or lands its override first.
        let spec = self
            .overrides
            .read()
            .get(project)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone());
        let now = self.clock.now();
        let mut bucket = spec.build_at(now)?;
        tracing::info!(
            project,
            capacity = bucket.capacity(),
            rate = bucket.nominal_rate(),
            dynamic = bucket.mode().is_dynamic(),
            timezone = %bucket.timezone(),
            "created project bucket"
        );
        self.record(project, AdmissionAction::Create, 0.0, &mut bucket, now);
        let handle = Arc::new(Mutex::new(bucket));
        buckets.insert(project.to_owned(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Ask for `n` tokens on behalf of `project`.
    ///
    /// # Errors
    ///
    /// Only bucket creation can fail.
    pub fn try_consume(&self, project: &str, n: f64) -> Result<bool, ThrottleError> {
        let handle = self.handle(project)?;
        let mut bucket = handle.lock();
        let now = self.clock.now();
        let admitted = bucket.try_consume_at(n, now);
        if !admitted {
            tracing::debug!(project, requested = n, "project deferred: insufficient tokens");
        }
        let action = if admitted {
            AdmissionAction::Admit
        } else {
            AdmissionAction::Defer
        };
        self.record(project, action, n, &mut bucket, now);
        Ok(admitted)
    }

    /// Unsigned capacity of the project's bucket.
    #[must_use]
    pub fn capacity(&self, project: &str) -> Option<f64> {
        self.buckets
            .read()
            .get(project)
            .map(|handle| handle.lock().capacity())
    }

    /// Rate currently in effect for the project's bucket.
    #[must_use]
    pub fn current_rate(&self, project: &str) -> Option<f64> {
        let now = self.clock.now();
        self.buckets
            .read()
            .get(project)
            .map(|handle| handle.lock().effective_rate(now))
    }

    /// Apply new settings to `project`, now and for future re-creation.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] and changes nothing when the
    /// settings are invalid.
    pub fn reconfigure(&self, project: &str, spec: BucketSpec) -> Result<(), ThrottleError> {
        spec.validate()?;
        let buckets = self.buckets.write();
        if let Some(handle) = buckets.get(project) {
            let mut bucket = handle.lock();
            let now = self.clock.now();
            bucket.reconfigure_at(spec.rate, spec.mode.clone(), now)?;
            tracing::info!(project, "reconfigured project bucket");
            self.record(project, AdmissionAction::Reconfigure, 0.0, &mut bucket, now);
        }
        self.overrides.write().insert(project.to_owned(), spec);
        drop(buckets);
        Ok(())
    }

    /// Drop the project's bucket and settings.
    pub fn remove(&self, project: &str) -> Option<BucketHandle> {
        let mut buckets = self.buckets.write();
        self.overrides.write().remove(project);
        let handle = buckets.remove(project)?;
        drop(buckets);
        tracing::info!(project, "removed project bucket");
        let now = self.clock.now();
        self.record(project, AdmissionAction::Remove, 0.0, &mut handle.lock(), now);
        Some(handle)
    }

    /// Number of live buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.read().len()
    }

    /// Whether no bucket has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    /// Project keys with live buckets.
    #[must_use]
    pub fn projects(&self) -> Vec<String> {
        self.buckets.read().keys().cloned().collect()
    }

    /// Handles to every live bucket, without creating any.
    #[must_use]
    pub fn handles(&self) -> Vec<(String, BucketHandle)> {
        self.buckets
            .read()
            .iter()
            .map(|(project, handle)| (project.clone(), Arc::clone(handle)))
            .collect()
    }

    /// Clock used by this registry.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    fn record(
        &self,
        project: &str,
        action: AdmissionAction,
        tokens: f64,
        bucket: &mut DiurnalRateBucket,
        now: DateTime<Utc>,
    ) {
        if let Some(audit) = &self.audit {
            let mut sink = audit.lock();
            record_event(Some(&mut *sink), project, action, tokens, bucket, now);
        }
    }
}
