//! Resolved-environment provider.
//!
//! A trigger metadata entry `urlFromEnv = "METRICS_URL"` names an
//! environment variable. Before the spec is stored the entry's value is
//! replaced with the variable's value, so parameter resolution sees the
//! resolved string under the same `FromEnv` key.

use scalegrid_core::ScaledWorkloadSpec;
use scalegrid_core::params::RESOLVED_ENV_SUFFIX;
use tracing::{debug, warn};

/// Look a variable up in the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Replace every `*FromEnv` metadata value with the value of the
/// variable it names.
///
/// An entry whose variable is not set is removed, so the trigger reports
/// the parameter as missing instead of using the variable name.
pub fn resolve_env_refs<F>(spec: &mut ScaledWorkloadSpec, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let workload = spec.id();
    for (index, trigger) in spec.triggers.iter_mut().enumerate() {
        let keys: Vec<String> = trigger
            .metadata
            .keys()
            .filter(|k| k.len() > RESOLVED_ENV_SUFFIX.len() && k.ends_with(RESOLVED_ENV_SUFFIX))
            .cloned()
            .collect();

        for key in keys {
            let Some(variable) = trigger.metadata.remove(&key) else {
                continue;
            };
            match lookup(&variable) {
                Some(value) => {
                    debug!(%workload, trigger = index, %key, %variable, "resolved env reference");
                    trigger.metadata.insert(key, value);
                }
                None => warn!(
                    %workload,
                    trigger = index,
                    %key,
                    %variable,
                    "environment variable not set, parameter dropped"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use scalegrid_core::{MetricType, TriggerSpec};

    use super::*;

    fn spec(metadata: &[(&str, &str)]) -> ScaledWorkloadSpec {
        ScaledWorkloadSpec {
            namespace: "default".to_string(),
            name: "api".to_string(),
            polling_interval_secs: 30,
            cooldown_period_secs: 300,
            min_replicas: 0,
            max_replicas: 10,
            initial_replicas: None,
            triggers: vec![TriggerSpec {
                trigger_type: "metrics-api".to_string(),
                name: None,
                metric_type: MetricType::Unset,
                metadata: metadata
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                auth_params: HashMap::new(),
            }],
            generation: 0,
        }
    }

    fn env(name: &str) -> Option<String> {
        match name {
            "METRICS_URL" => Some("http://metrics:8080/api".to_string()),
            _ => None,
        }
    }

    #[test]
    fn replaces_reference_with_value() {
        let mut s = spec(&[("urlFromEnv", "METRICS_URL"), ("targetValue", "5")]);
        resolve_env_refs(&mut s, env);
        let md = &s.triggers[0].metadata;
        assert_eq!(md["urlFromEnv"], "http://metrics:8080/api");
        assert_eq!(md["targetValue"], "5");
    }

    #[test]
    fn unset_variable_removes_entry() {
        let mut s = spec(&[("urlFromEnv", "MISSING")]);
        resolve_env_refs(&mut s, env);
        assert!(!s.triggers[0].metadata.contains_key("urlFromEnv"));
    }

    #[test]
    fn bare_suffix_is_not_a_reference() {
        let mut s = spec(&[("FromEnv", "METRICS_URL")]);
        resolve_env_refs(&mut s, env);
        assert_eq!(s.triggers[0].metadata["FromEnv"], "METRICS_URL");
    }
}
