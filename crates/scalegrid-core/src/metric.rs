//! Metric identity and target model.
//!
//! Every trigger publishes its metric under a name qualified with its
//! scaler index (`s{index}-{base}`), so two triggers on one workload can
//! never collide. The target describes how the consumer interprets the
//! value: a per-replica average or an absolute value.

use std::fmt;

use serde::Serialize;

use crate::error::{ScalerError, ScalerResult};
use crate::types::{MetricType, ScalerConfig};

/// Target types this engine can hand to a consumer.
///
/// There is no `Utilization` variant: utilization targets need a resource
/// baseline that external metrics do not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetricTargetType {
    AverageValue,
    Value,
}

impl fmt::Display for MetricTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricTargetType::AverageValue => f.write_str("AverageValue"),
            MetricTargetType::Value => f.write_str("Value"),
        }
    }
}

/// Resolve the author-declared metric type into a target type.
///
/// Unset defaults to `AverageValue`; `Utilization` is rejected.
pub fn resolve_target_type(cfg: &ScalerConfig) -> ScalerResult<MetricTargetType> {
    match cfg.metric_type {
        MetricType::Utilization => Err(ScalerError::UnsupportedUtilizationMetricType),
        MetricType::Value => Ok(MetricTargetType::Value),
        MetricType::AverageValue | MetricType::Unset => Ok(MetricTargetType::AverageValue),
    }
}

/// A metric target. Exactly one of `average_value` / `value` is set,
/// matching `target_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTarget {
    #[serde(rename = "type")]
    target_type: MetricTargetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    average_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<i64>,
}

impl MetricTarget {
    /// Build a target of the given type. Negative amounts are passed
    /// through; validating them is the trigger's job.
    pub fn new(target_type: MetricTargetType, amount: i64) -> Self {
        match target_type {
            MetricTargetType::AverageValue => Self {
                target_type,
                average_value: Some(amount),
                value: None,
            },
            MetricTargetType::Value => Self {
                target_type,
                average_value: None,
                value: Some(amount),
            },
        }
    }

    pub fn target_type(&self) -> MetricTargetType {
        self.target_type
    }

    pub fn average_value(&self) -> Option<i64> {
        self.average_value
    }

    pub fn value(&self) -> Option<i64> {
        self.value
    }

    /// The populated amount, whichever field holds it.
    pub fn amount(&self) -> i64 {
        match self.target_type {
            MetricTargetType::AverageValue => self.average_value.unwrap_or_default(),
            MetricTargetType::Value => self.value.unwrap_or_default(),
        }
    }
}

// ── Identity ───────────────────────────────────────────────────────

/// Qualify a base metric name with its scaler index: `s{index}-{base}`.
pub fn qualify(scaler_index: usize, base_name: &str) -> String {
    format!("s{scaler_index}-{base_name}")
}

/// Strip the scaler index prefix from a qualified metric name.
///
/// The prefix must match `scaler_index` exactly. A name carrying some
/// other trigger's index is an [`ScalerError::IndexMismatch`], a name
/// with no `s<digits>-` prefix at all is a
/// [`ScalerError::MissingIndexPrefix`].
pub fn unqualify(scaler_index: usize, qualified: &str) -> ScalerResult<String> {
    let prefix = format!("s{scaler_index}-");
    if let Some(rest) = qualified.strip_prefix(&prefix) {
        if rest.is_empty() {
            return Err(ScalerError::EmptyMetricName(qualified.to_string()));
        }
        return Ok(rest.to_string());
    }

    if parse_index_prefix(qualified).is_some() {
        Err(ScalerError::IndexMismatch {
            index: scaler_index,
            name: qualified.to_string(),
        })
    } else {
        Err(ScalerError::MissingIndexPrefix(qualified.to_string()))
    }
}

/// Read the scaler index out of a qualified name, if it has one.
pub fn parse_index_prefix(qualified: &str) -> Option<usize> {
    let rest = qualified.strip_prefix('s')?;
    let (digits, _) = rest.split_once('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Replace characters that are not valid in a metric name with `-`.
pub fn normalize_metric_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// A trigger's published metric: its qualified name and target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSpec {
    pub name: String,
    pub target: MetricTarget,
}

impl MetricSpec {
    /// Build the metric spec a trigger publishes: normalize and qualify
    /// `base_name`, resolve the target type from `cfg`.
    pub fn new(cfg: &ScalerConfig, base_name: &str, target_amount: i64) -> ScalerResult<Self> {
        let target_type = resolve_target_type(cfg)?;
        Ok(Self {
            name: qualify(cfg.scaler_index, &normalize_metric_name(base_name)),
            target: MetricTarget::new(target_type, target_amount),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(metric_type: MetricType) -> ScalerConfig {
        ScalerConfig {
            metric_type,
            ..Default::default()
        }
    }

    #[test]
    fn utilization_is_rejected() {
        let err = resolve_target_type(&config(MetricType::Utilization)).unwrap_err();
        assert_eq!(err, ScalerError::UnsupportedUtilizationMetricType);
    }

    #[test]
    fn explicit_types_pass_through() {
        assert_eq!(
            resolve_target_type(&config(MetricType::AverageValue)).unwrap(),
            MetricTargetType::AverageValue
        );
        assert_eq!(
            resolve_target_type(&config(MetricType::Value)).unwrap(),
            MetricTargetType::Value
        );
    }

    #[test]
    fn unset_defaults_to_average_value() {
        assert_eq!(
            resolve_target_type(&ScalerConfig::default()).unwrap(),
            MetricTargetType::AverageValue
        );
    }

    #[test]
    fn average_value_target() {
        let target = MetricTarget::new(MetricTargetType::AverageValue, 10);
        assert_eq!(target.target_type(), MetricTargetType::AverageValue);
        assert_eq!(target.average_value(), Some(10));
        assert_eq!(target.value(), None);
        assert_eq!(target.amount(), 10);
    }

    #[test]
    fn value_target() {
        let target = MetricTarget::new(MetricTargetType::Value, 20);
        assert_eq!(target.target_type(), MetricTargetType::Value);
        assert_eq!(target.value(), Some(20));
        assert_eq!(target.average_value(), None);
    }

    #[test]
    fn negative_amount_is_passed_through() {
        let target = MetricTarget::new(MetricTargetType::AverageValue, -3);
        assert_eq!(target.average_value(), Some(-3));
    }

    #[test]
    fn target_serializes_single_field() {
        let json = serde_json::to_value(MetricTarget::new(MetricTargetType::Value, 20)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Value", "value": 20}));
    }

    #[test]
    fn qualify_prefixes_index() {
        assert_eq!(qualify(0, "metricName"), "s0-metricName");
        assert_eq!(qualify(123, "queue"), "s123-queue");
    }

    #[test]
    fn unqualify_strips_matching_prefix() {
        assert_eq!(unqualify(0, "s0-metricName").unwrap(), "metricName");
        assert_eq!(unqualify(123, "s123-metricName").unwrap(), "metricName");
        // Only the prefix is removed; later dashes are part of the name.
        assert_eq!(unqualify(2, "s2-metric-api-value").unwrap(), "metric-api-value");
    }

    #[test]
    fn unqualify_rejects_other_index() {
        let err = unqualify(1, "s0-metricName").unwrap_err();
        assert!(matches!(err, ScalerError::IndexMismatch { index: 1, .. }));
        // s1 is not a prefix of s12.
        assert!(matches!(
            unqualify(1, "s12-metricName").unwrap_err(),
            ScalerError::IndexMismatch { .. }
        ));
    }

    #[test]
    fn unqualify_rejects_missing_prefix() {
        assert_eq!(
            unqualify(0, "0-metricName").unwrap_err(),
            ScalerError::MissingIndexPrefix("0-metricName".to_string())
        );
        assert_eq!(
            unqualify(0, "metricName").unwrap_err(),
            ScalerError::MissingIndexPrefix("metricName".to_string())
        );
        assert!(matches!(
            unqualify(0, "sx-metricName").unwrap_err(),
            ScalerError::MissingIndexPrefix(_)
        ));
    }

    #[test]
    fn unqualify_rejects_empty_base() {
        assert!(matches!(
            unqualify(0, "s0-").unwrap_err(),
            ScalerError::EmptyMetricName(_)
        ));
    }

    #[test]
    fn parse_index_prefix_reads_digits() {
        assert_eq!(parse_index_prefix("s7-x"), Some(7));
        assert_eq!(parse_index_prefix("s-x"), None);
        assert_eq!(parse_index_prefix("7-x"), None);
    }

    #[test]
    fn metric_spec_normalizes_and_qualifies() {
        let cfg = ScalerConfig {
            scaler_index: 3,
            metric_type: MetricType::Value,
            ..Default::default()
        };
        let spec = MetricSpec::new(&cfg, "metric-api-data.queue/depth", 5).unwrap();
        assert_eq!(spec.name, "s3-metric-api-data-queue-depth");
        assert_eq!(spec.target.value(), Some(5));

        let bad = ScalerConfig {
            metric_type: MetricType::Utilization,
            ..Default::default()
        };
        assert!(MetricSpec::new(&bad, "x", 1).is_err());
    }
}
