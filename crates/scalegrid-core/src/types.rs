//! Shared types used across scalegrid crates.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a scaled workload (`{namespace}/{name}`).
pub type WorkloadId = String;

/// Target type declared by a trigger author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MetricType {
    /// Not set; resolves to `AverageValue`.
    #[default]
    #[serde(rename = "")]
    Unset,
    AverageValue,
    Value,
    Utilization,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Unset => "",
            MetricType::AverageValue => "AverageValue",
            MetricType::Value => "Value",
            MetricType::Utilization => "Utilization",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable configuration snapshot for a single trigger.
///
/// Built once per reconcile from a [`ScaledWorkloadSpec`] and replaced
/// wholesale when the spec changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScalerConfig {
    /// Workload the trigger belongs to.
    pub workload_id: WorkloadId,
    /// Trigger type, e.g. `metrics-api`.
    pub trigger_type: String,
    /// Optional author-supplied trigger name.
    pub trigger_name: Option<String>,
    /// Trigger-authored metadata.
    pub trigger_metadata: HashMap<String, String>,
    /// Parameters resolved from an authentication reference.
    pub auth_params: HashMap<String, String>,
    /// Declaration order of the trigger within its workload.
    pub scaler_index: usize,
    pub metric_type: MetricType,
}

impl ScalerConfig {
    /// Human-readable label for logs: the trigger name if set, otherwise
    /// `{type}[{index}]`.
    pub fn label(&self) -> String {
        match &self.trigger_name {
            Some(name) => name.clone(),
            None => format!("{}[{}]", self.trigger_type, self.scaler_index),
        }
    }
}

// ── Workload spec ──────────────────────────────────────────────────

/// One trigger attached to a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metric_type: MetricType,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Already-resolved authentication parameters.
    #[serde(default)]
    pub auth_params: HashMap<String, String>,
}

/// Autoscaling specification for one workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledWorkloadSpec {
    pub namespace: String,
    pub name: String,
    /// Seconds between trigger evaluations. 0 means every scheduler tick.
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,
    /// Seconds to wait after the last active tick before scaling down.
    #[serde(default = "default_cooldown_period")]
    pub cooldown_period_secs: u64,
    #[serde(default)]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    /// Replica count observed when the workload was registered.
    #[serde(default)]
    pub initial_replicas: Option<u32>,
    pub triggers: Vec<TriggerSpec>,
    /// Bumped by the store on every write.
    #[serde(default)]
    pub generation: u64,
}

pub fn default_polling_interval() -> u64 {
    30
}

pub fn default_cooldown_period() -> u64 {
    300
}

pub fn default_max_replicas() -> u32 {
    100
}

impl ScaledWorkloadSpec {
    pub fn id(&self) -> WorkloadId {
        format!("{}/{}", self.namespace, self.name)
    }

    /// One `ScalerConfig` per trigger, indexed by declaration order.
    pub fn scaler_configs(&self) -> Vec<ScalerConfig> {
        let workload_id = self.id();
        self.triggers
            .iter()
            .enumerate()
            .map(|(index, trigger)| ScalerConfig {
                workload_id: workload_id.clone(),
                trigger_type: trigger.trigger_type.clone(),
                trigger_name: trigger.name.clone(),
                trigger_metadata: trigger.metadata.clone(),
                auth_params: trigger.auth_params.clone(),
                scaler_index: index,
                metric_type: trigger.metric_type,
            })
            .collect()
    }

    /// Check replica bounds and trigger presence.
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.is_empty() || self.name.is_empty() {
            return Err("namespace and name must not be empty".to_string());
        }
        if self.max_replicas == 0 {
            return Err("max_replicas must be greater than 0".to_string());
        }
        if self.min_replicas > self.max_replicas {
            return Err(format!(
                "min_replicas {} exceeds max_replicas {}",
                self.min_replicas, self.max_replicas
            ));
        }
        if self.triggers.is_empty() {
            return Err("at least one trigger is required".to_string());
        }
        Ok(())
    }
}
