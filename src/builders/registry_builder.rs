//! Builders to construct project registries from configuration.

use crate::config::ThrottleConfig;
use crate::core::{ProjectBuckets, SharedProjectBuckets, ThrottleError};
use crate::util::clock::Clock;

/// Build a registry from throttle configuration.
///
/// Every project listed in the configuration gets its bucket immediately;
/// other projects are created on demand from the default settings.
///
/// # Errors
///
/// Returns [`ThrottleError::InvalidConfig`] when any entry is invalid.
pub fn build_registry<C: Clock>(
    cfg: &ThrottleConfig,
    clock: C,
) -> Result<ProjectBuckets<C>, ThrottleError> {
    cfg.validate()?;

    let mut registry = ProjectBuckets::with_clock(cfg.default.to_spec()?, clock);
    for (name, project_cfg) in &cfg.projects {
        registry.reconfigure(name, project_cfg.to_spec()?)?;
        registry.register(name)?;
    }
    tracing::info!(projects = cfg.projects.len(), "built project registry");
    Ok(registry)
}

/// Build a thread-safe registry from throttle configuration.
///
/// # Errors
///
/// Returns [`ThrottleError::InvalidConfig`] when any entry is invalid.
pub fn build_shared_registry<C: Clock>(
    cfg: &ThrottleConfig,
    clock: C,
) -> Result<SharedProjectBuckets<C>, ThrottleError> {
    cfg.validate()?;

    let registry = SharedProjectBuckets::with_clock(cfg.default.to_spec()?, clock);
    for (name, project_cfg) in &cfg.projects {
        registry.reconfigure(name, project_cfg.to_spec()?)?;
        registry.handle(name)?;
    }
    tracing::info!(projects = cfg.projects.len(), "built shared project registry");
    Ok(registry)
}
