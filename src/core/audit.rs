//! Admission audit trail.
//!
//! Registries can record every bucket lifecycle change and admission
//! decision into an [`AuditSink`] for monitoring surfaces.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a project's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionAction {
    /// Bucket created for the project.
    Create,
    /// Tokens consumed; a task may be dispatched.
    Admit,
    /// Not enough tokens; the project waits for a later tick.
    Defer,
    /// Rate or mode changed.
    Reconfigure,
    /// Bucket dropped with its project.
    Remove,
}

impl fmt::Display for AdmissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Admit => "admit",
            Self::Defer => "defer",
            Self::Reconfigure => "reconfigure",
            Self::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionEvent {
    /// Project key.
    pub project: String,
    /// Action taken.
    pub action: AdmissionAction,
    /// Tokens requested (zero for lifecycle events).
    pub tokens: f64,
    /// Bucket level after the action.
    pub level: f64,
    /// Rate in effect when the action happened.
    pub rate: f64,
    /// When the action happened.
    pub at: DateTime<Utc>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AdmissionEvent);
}

/// In-memory audit sink with a bounded buffer; the oldest events are
/// evicted first.
pub struct InMemoryAuditSink {
    events: VecDeque<AdmissionEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink holding at most `max_events`.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AdmissionEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AdmissionEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that forwards events to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AdmissionEvent) {
        tracing::debug!(
            project = %event.project,
            action = %event.action,
            tokens = event.tokens,
            level = event.level,
            rate = event.rate,
            "admission event"
        );
    }
}

/// Helper to build an audit event from context.
pub fn build_admission_event(
    project: impl Into<String>,
    action: AdmissionAction,
    tokens: f64,
    level: f64,
    rate: f64,
    at: DateTime<Utc>,
) -> AdmissionEvent {
    AdmissionEvent {
        project: project.into(),
        action,
        tokens,
        level,
        rate,
        at,
    }
}
