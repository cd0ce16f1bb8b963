//! Error taxonomy for parameter resolution and metric identity.

use thiserror::Error;

use crate::coerce::ValueKind;

/// Result type alias for scaler configuration operations.
pub type ScalerResult<T> = Result<T, ScalerError>;

/// Errors raised while turning a trigger's configuration into typed
/// parameters and metric descriptors.
///
/// None of these are fatal to the controller: they fail one trigger's
/// registration (or one tick) and are retried on the next reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalerError {
    #[error("cannot convert {value:?} to {kind}: {reason}")]
    Coercion {
        value: String,
        kind: ValueKind,
        reason: String,
    },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error(
        "key not found: {0}. Either set the correct key or mark the parameter optional and provide a default value"
    )]
    ParameterNotFound(String),

    #[error("'Utilization' metric type is unsupported for external metrics, allowed values are 'Value' or 'AverageValue'")]
    UnsupportedUtilizationMetricType,

    #[error("metric name {name:?} does not belong to scaler index {index}")]
    IndexMismatch { index: usize, name: String },

    #[error("metric name {0:?} has no scaler index prefix")]
    MissingIndexPrefix(String),

    #[error("metric name {0:?} has an empty base name")]
    EmptyMetricName(String),
}
