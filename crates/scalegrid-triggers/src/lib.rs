//! scalegrid-triggers: concrete metric sources.
//!
//! Each trigger implements [`scalegrid_autoscale::Trigger`] and exposes
//! a builder for the [`TriggerRegistry`].
//!
//! | Type | Source |
//! |---|---|
//! | `metrics-api` | a number inside a JSON document served over HTTP |

pub mod client;
pub mod metrics_api;

use scalegrid_autoscale::TriggerRegistry;

pub use metrics_api::{AuthMode, MetricsApiConfig, MetricsApiTrigger};

/// Add every built-in trigger type to `registry`.
pub fn register_builtin(registry: &mut TriggerRegistry) {
    registry.register(metrics_api::TRIGGER_TYPE, metrics_api::build);
}

/// A registry holding every built-in trigger type.
pub fn builtin_registry() -> TriggerRegistry {
    let mut registry = TriggerRegistry::new();
    register_builtin(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_metrics_api() {
        assert_eq!(builtin_registry().types(), vec!["metrics-api".to_string()]);
    }
}
