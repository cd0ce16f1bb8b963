//! Trigger interface and registry.
//!
//! A trigger is one external metric source attached to a workload. The
//! autoscaler only sees it through [`Trigger::evaluate`]; how the value
//! is obtained is the implementation's business.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use scalegrid_core::{MetricSpec, ScaledWorkloadSpec, ScalerConfig};

/// Boxed future returned by trigger evaluation and scale callbacks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One trigger's answer for a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerReading {
    pub is_active: bool,
    /// Qualified metric name the value belongs to.
    pub metric_name: String,
    pub value: i64,
}

/// An external metric source.
///
/// Implementations must be safe to evaluate concurrently with other
/// triggers; an evaluation may be dropped mid-flight when its timeout
/// elapses or the workload is deleted.
pub trait Trigger: Send + Sync {
    /// The metric this trigger publishes.
    fn metric_spec(&self) -> &MetricSpec;

    /// Report activity and the current metric value.
    fn evaluate(&self) -> BoxFuture<'_, anyhow::Result<TriggerReading>>;
}

/// Builds a trigger from its configuration snapshot.
pub type TriggerBuilder =
    Arc<dyn Fn(&ScalerConfig) -> anyhow::Result<Arc<dyn Trigger>> + Send + Sync>;

/// A trigger built for a workload, with the config it was built from.
#[derive(Clone)]
pub struct RegisteredTrigger {
    pub config: ScalerConfig,
    pub trigger: Arc<dyn Trigger>,
}

impl RegisteredTrigger {
    pub fn metric_spec(&self) -> &MetricSpec {
        self.trigger.metric_spec()
    }
}

impl fmt::Debug for RegisteredTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTrigger")
            .field("label", &self.config.label())
            .field("metric", &self.metric_spec().name)
            .finish()
    }
}

/// A trigger that could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationFailure {
    pub scaler_index: usize,
    pub label: String,
    pub error: String,
}

/// The triggers built for one generation of a workload spec.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    pub generation: u64,
    pub triggers: Vec<RegisteredTrigger>,
    pub failures: Vec<RegistrationFailure>,
}

/// Maps trigger type names to builders.
#[derive(Clone, Default)]
pub struct TriggerRegistry {
    builders: HashMap<String, TriggerBuilder>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder for `trigger_type`, replacing any previous one.
    pub fn register<F>(&mut self, trigger_type: &str, builder: F)
    where
        F: Fn(&ScalerConfig) -> anyhow::Result<Arc<dyn Trigger>> + Send + Sync + 'static,
    {
        self.builders
            .insert(trigger_type.to_string(), Arc::new(builder));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, trigger_type: &str, builder: F) -> Self
    where
        F: Fn(&ScalerConfig) -> anyhow::Result<Arc<dyn Trigger>> + Send + Sync + 'static,
    {
        self.register(trigger_type, builder);
        self
    }

    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.builders.keys().cloned().collect();
        types.sort();
        types
    }

    /// Build a single trigger.
    pub fn build(&self, cfg: &ScalerConfig) -> anyhow::Result<Arc<dyn Trigger>> {
        let builder = self
            .builders
            .get(&cfg.trigger_type)
            .ok_or_else(|| anyhow::anyhow!("unknown trigger type {:?}", cfg.trigger_type))?;
        builder(cfg)
    }

    /// Build every trigger of a workload.
    ///
    /// A trigger that fails to build is left out and recorded as a
    /// failure; the others are unaffected.
    pub fn build_all(&self, spec: &ScaledWorkloadSpec) -> TriggerSet {
        let mut set = TriggerSet {
            generation: spec.generation,
            ..Default::default()
        };

        for config in spec.scaler_configs() {
            match self.build(&config) {
                Ok(trigger) => {
                    debug!(
                        workload = %config.workload_id,
                        trigger = %config.label(),
                        metric = %trigger.metric_spec().name,
                        "trigger registered"
                    );
                    set.triggers.push(RegisteredTrigger { config, trigger });
                }
                Err(e) => {
                    warn!(
                        workload = %config.workload_id,
                        trigger = %config.label(),
                        error = %e,
                        "trigger registration failed"
                    );
                    set.failures.push(RegistrationFailure {
                        scaler_index: config.scaler_index,
                        label: config.label(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        set
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use scalegrid_core::{MetricType, TriggerSpec};

    use super::testing::*;
    use super::*;

    fn trigger(trigger_type: &str, target: Option<&str>) -> TriggerSpec {
        let mut metadata = HashMap::new();
        if let Some(t) = target {
            metadata.insert("targetValue".to_string(), t.to_string());
        }
        TriggerSpec {
            trigger_type: trigger_type.to_string(),
            name: None,
            metric_type: MetricType::Unset,
            metadata,
            auth_params: HashMap::new(),
        }
    }

    fn spec(triggers: Vec<TriggerSpec>) -> ScaledWorkloadSpec {
        ScaledWorkloadSpec {
            namespace: "default".to_string(),
            name: "api".to_string(),
            polling_interval_secs: 30,
            cooldown_period_secs: 300,
            min_replicas: 0,
            max_replicas: 10,
            initial_replicas: None,
            triggers,
            generation: 7,
        }
    }

    #[test]
    fn build_all_registers_each_trigger_with_its_index() {
        let registry = registry(vec![script(true, 1), script(false, 0)]);
        let set = registry.build_all(&spec(vec![
            trigger("fake", Some("5")),
            trigger("fake", Some("10")),
        ]));

        assert_eq!(set.generation, 7);
        assert!(set.failures.is_empty());
        assert_eq!(set.triggers.len(), 2);
        assert_eq!(set.triggers[0].metric_spec().name, "s0-fake");
        assert_eq!(set.triggers[1].metric_spec().name, "s1-fake");
        assert_eq!(set.triggers[1].metric_spec().target.average_value(), Some(10));
    }

    #[test]
    fn bad_trigger_does_not_block_others() {
        let registry = registry(vec![script(true, 1), script(true, 1), script(true, 1)]);
        let set = registry.build_all(&spec(vec![
            trigger("fake", None),
            trigger("fake", Some("3")),
            trigger("kafka", Some("3")),
        ]));

        assert_eq!(set.triggers.len(), 1);
        assert_eq!(set.triggers[0].config.scaler_index, 1);

        assert_eq!(set.failures.len(), 2);
        assert_eq!(set.failures[0].scaler_index, 0);
        assert!(set.failures[0].error.contains("targetValue"));
        assert!(set.failures[1].error.contains("unknown trigger type"));
    }

    #[test]
    fn utilization_metric_type_fails_registration() {
        let registry = registry(vec![script(true, 1)]);
        let mut t = trigger("fake", Some("1"));
        t.metric_type = MetricType::Utilization;
        let set = registry.build_all(&spec(vec![t]));
        assert!(set.triggers.is_empty());
        assert!(set.failures[0].error.contains("Utilization"));
    }

    #[test]
    fn registry_lists_types() {
        let registry = registry(vec![]).with("other", |_| anyhow::bail!("nope"));
        assert_eq!(registry.types(), vec!["fake".to_string(), "other".to_string()]);
    }
}
