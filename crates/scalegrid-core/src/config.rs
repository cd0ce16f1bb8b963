//! scalegrid.toml configuration parser.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::types::{
    MetricType, ScaledWorkloadSpec, TriggerSpec, default_cooldown_period, default_max_replicas,
    default_polling_interval,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalegridConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub authentications: Vec<AuthenticationConfig>,
    #[serde(default)]
    pub workloads: Vec<WorkloadConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Fastest loop cadence; used when a workload's polling interval is 0.
    #[serde(default = "default_scheduler_tick")]
    pub scheduler_tick: String,
    /// Per-trigger evaluation timeout.
    #[serde(default = "default_trigger_timeout")]
    pub trigger_timeout: String,
    /// How often the daemon reconciles the set of running workload loops.
    #[serde(default = "default_sync_interval")]
    pub sync_interval: String,
}

fn default_scheduler_tick() -> String {
    "1s".to_string()
}

fn default_trigger_timeout() -> String {
    "3s".to_string()
}

fn default_sync_interval() -> String {
    "5s".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            scheduler_tick: default_scheduler_tick(),
            trigger_timeout: default_trigger_timeout(),
            sync_interval: default_sync_interval(),
        }
    }
}

impl ControllerConfig {
    pub fn scheduler_tick(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.scheduler_tick).context("controller.scheduler_tick")
    }

    pub fn trigger_timeout(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.trigger_timeout).context("controller.trigger_timeout")
    }

    pub fn sync_interval(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.sync_interval).context("controller.sync_interval")
    }
}

/// Named set of auth params that triggers can reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    pub name: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,
    #[serde(default = "default_cooldown_period")]
    pub cooldown_period: u64,
    #[serde(default)]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    pub initial_replicas: Option<u32>,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub name: Option<String>,
    #[serde(default)]
    pub metric_type: MetricType,
    pub authentication_ref: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ScalegridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ScalegridConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Convert every `[[workloads]]` entry into a validated spec,
    /// attaching the auth params named by each trigger's
    /// `authentication_ref`.
    pub fn workload_specs(&self) -> anyhow::Result<Vec<ScaledWorkloadSpec>> {
        let auths: HashMap<&str, &HashMap<String, String>> = self
            .authentications
            .iter()
            .map(|a| (a.name.as_str(), &a.params))
            .collect();

        let mut specs = Vec::with_capacity(self.workloads.len());
        for workload in &self.workloads {
            let mut triggers = Vec::with_capacity(workload.triggers.len());
            for trigger in &workload.triggers {
                let auth_params = match &trigger.authentication_ref {
                    Some(name) => match auths.get(name.as_str()) {
                        Some(params) => (*params).clone(),
                        None => bail!(
                            "workload {}/{}: unknown authentication_ref {name:?}",
                            workload.namespace,
                            workload.name
                        ),
                    },
                    None => HashMap::new(),
                };
                triggers.push(TriggerSpec {
                    trigger_type: trigger.trigger_type.clone(),
                    name: trigger.name.clone(),
                    metric_type: trigger.metric_type,
                    metadata: trigger.metadata.clone(),
                    auth_params,
                });
            }

            let spec = ScaledWorkloadSpec {
                namespace: workload.namespace.clone(),
                name: workload.name.clone(),
                polling_interval_secs: workload.polling_interval,
                cooldown_period_secs: workload.cooldown_period,
                min_replicas: workload.min_replicas,
                max_replicas: workload.max_replicas,
                initial_replicas: workload.initial_replicas,
                triggers,
                generation: 0,
            };
            if let Err(reason) = spec.validate() {
                bail!("workload {}: {reason}", spec.id());
            }
            specs.push(spec);
        }
        Ok(specs)
    }
}

/// Parse a duration string: `"500ms"`, `"30s"`, `"5m"`, `"1h"`, or a
/// bare number of seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    if digits.is_empty() {
        bail!("invalid duration {s:?}");
    }
    let n: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration {s:?}"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        _ => bail!("invalid duration unit in {s:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[controller]
scheduler_tick = "500ms"
trigger_timeout = "2s"

[[authentications]]
name = "metrics-auth"
params = { username = "user", password = "secret" }

[[workloads]]
name = "api"
polling_interval = 15
cooldown_period = 60
max_replicas = 5

[[workloads.triggers]]
type = "metrics-api"
metric_type = "Value"
authentication_ref = "metrics-auth"
metadata = { targetValue = "1", url = "http://metrics/api/value", valueLocation = "value" }
"#;

    #[test]
    fn parse_sample_config() {
        let config = ScalegridConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(
            config.controller.scheduler_tick().unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(config.controller.sync_interval().unwrap(), Duration::from_secs(5));

        let specs = config.workload_specs().unwrap();
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert_eq!(spec.id(), "default/api");
        assert_eq!(spec.polling_interval_secs, 15);
        assert_eq!(spec.cooldown_period_secs, 60);
        assert_eq!(spec.min_replicas, 0);
        assert_eq!(spec.triggers[0].metric_type, MetricType::Value);
        assert_eq!(spec.triggers[0].auth_params["username"], "user");
    }

    #[test]
    fn workload_defaults_apply() {
        let config = ScalegridConfig::from_toml(
            r#"
[[workloads]]
name = "worker"
[[workloads.triggers]]
type = "metrics-api"
"#,
        )
        .unwrap();
        let spec = &config.workload_specs().unwrap()[0];
        assert_eq!(spec.polling_interval_secs, 30);
        assert_eq!(spec.cooldown_period_secs, 300);
        assert_eq!(spec.max_replicas, 100);
        assert_eq!(spec.triggers[0].metric_type, MetricType::Unset);
    }

    #[test]
    fn unknown_authentication_ref_is_an_error() {
        let config = ScalegridConfig::from_toml(
            r#"
[[workloads]]
name = "worker"
[[workloads.triggers]]
type = "metrics-api"
authentication_ref = "missing"
"#,
        )
        .unwrap();
        let err = config.workload_specs().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let config = ScalegridConfig::from_toml(
            r#"
[[workloads]]
name = "worker"
min_replicas = 4
max_replicas = 2
[[workloads.triggers]]
type = "metrics-api"
"#,
        )
        .unwrap();
        assert!(config.workload_specs().is_err());
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("").is_err());
    }
}
