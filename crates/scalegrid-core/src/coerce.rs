//! String-to-scalar coercion for trigger parameters.
//!
//! Trigger metadata and auth params are always strings. Triggers declare
//! the scalar kind they want and [`coerce`] parses the raw string into a
//! [`TypedValue`] of that kind. The set of kinds is closed: anything else
//! is rejected when the kind name is parsed, before any value is looked at.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ScalerError, ScalerResult};

/// Scalar kinds a parameter can be coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Int64,
    Uint64,
    Float32,
    Float64,
    Bool,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Int64 => "int64",
            ValueKind::Uint64 => "uint64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::Bool => "bool",
        }
    }

    /// The value an optional parameter takes when it is absent and has
    /// no default.
    pub fn zero(&self) -> TypedValue {
        match self {
            ValueKind::String => TypedValue::String(String::new()),
            ValueKind::Int64 => TypedValue::Int64(0),
            ValueKind::Uint64 => TypedValue::Uint64(0),
            ValueKind::Float32 => TypedValue::Float32(0.0),
            ValueKind::Float64 => TypedValue::Float64(0.0),
            ValueKind::Bool => TypedValue::Bool(false),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = ScalerError;

    /// Parse a kind name. Aliases `int`/`uint`/`float`/`boolean` are
    /// accepted; collection kinds such as `[]int` are not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" | "str" => Ok(ValueKind::String),
            "int" | "int64" | "i64" => Ok(ValueKind::Int64),
            "uint" | "uint64" | "u64" => Ok(ValueKind::Uint64),
            "float32" | "f32" => Ok(ValueKind::Float32),
            "float" | "float64" | "f64" => Ok(ValueKind::Float64),
            "bool" | "boolean" => Ok(ValueKind::Bool),
            other => Err(ScalerError::UnsupportedType(other.to_string())),
        }
    }
}

/// A coerced parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    String(String),
    Int64(i64),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::String(_) => ValueKind::String,
            TypedValue::Int64(_) => ValueKind::Int64,
            TypedValue::Uint64(_) => ValueKind::Uint64,
            TypedValue::Float32(_) => ValueKind::Float32,
            TypedValue::Float64(_) => ValueKind::Float64,
            TypedValue::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TypedValue::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            TypedValue::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Convert a raw string into a value of the requested kind.
pub fn coerce(raw: &str, kind: ValueKind) -> ScalerResult<TypedValue> {
    let fail = |reason: String| ScalerError::Coercion {
        value: raw.to_string(),
        kind,
        reason,
    };

    match kind {
        ValueKind::String => Ok(TypedValue::String(raw.to_string())),
        ValueKind::Int64 => raw
            .parse::<i64>()
            .map(TypedValue::Int64)
            .map_err(|e| fail(e.to_string())),
        ValueKind::Uint64 => raw
            .parse::<u64>()
            .map(TypedValue::Uint64)
            .map_err(|e| fail(e.to_string())),
        ValueKind::Float32 => raw
            .parse::<f32>()
            .map(TypedValue::Float32)
            .map_err(|e| fail(e.to_string())),
        ValueKind::Float64 => raw
            .parse::<f64>()
            .map(TypedValue::Float64)
            .map_err(|e| fail(e.to_string())),
        ValueKind::Bool => {
            if raw.eq_ignore_ascii_case("true") {
                Ok(TypedValue::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Ok(TypedValue::Bool(false))
            } else {
                Err(fail("expected true or false".to_string()))
            }
        }
    }
}

/// Rust types that can be produced by parameter resolution.
///
/// Lets callers write `cfg.param::<u64>(...)` and get the kind checked
/// at compile time instead of matching on [`TypedValue`].
pub trait ParamValue: Sized {
    const KIND: ValueKind;

    fn from_typed(value: TypedValue) -> Option<Self>;
}

macro_rules! param_value {
    ($ty:ty, $kind:ident) => {
        impl ParamValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_typed(value: TypedValue) -> Option<Self> {
                match value {
                    TypedValue::$kind(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

param_value!(String, String);
param_value!(i64, Int64);
param_value!(u64, Uint64);
param_value!(f32, Float32);
param_value!(f64, Float64);
param_value!(bool, Bool);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_is_passed_through() {
        assert_eq!(
            coerce("test", ValueKind::String).unwrap(),
            TypedValue::String("test".to_string())
        );
        assert_eq!(
            coerce("", ValueKind::String).unwrap(),
            TypedValue::String(String::new())
        );
    }

    #[test]
    fn int64_extremes() {
        assert_eq!(coerce("6", ValueKind::Int64).unwrap(), TypedValue::Int64(6));
        assert_eq!(
            coerce("9223372036854775807", ValueKind::Int64).unwrap(),
            TypedValue::Int64(i64::MAX)
        );
        assert_eq!(
            coerce("-9223372036854775808", ValueKind::Int64).unwrap(),
            TypedValue::Int64(i64::MIN)
        );
    }

    #[test]
    fn int64_out_of_range_fails() {
        let err = coerce("9223372036854775808", ValueKind::Int64).unwrap_err();
        assert!(matches!(err, ScalerError::Coercion { kind: ValueKind::Int64, .. }));
        assert!(coerce("12abc", ValueKind::Int64).is_err());
    }

    #[test]
    fn uint64_max_and_negative() {
        assert_eq!(
            coerce("18446744073709551615", ValueKind::Uint64).unwrap(),
            TypedValue::Uint64(u64::MAX)
        );
        assert!(coerce("-1", ValueKind::Uint64).is_err());
    }

    #[test]
    fn floats_at_requested_width() {
        assert_eq!(
            coerce("3.14", ValueKind::Float32).unwrap(),
            TypedValue::Float32(3.14)
        );
        assert_eq!(
            coerce("0.123456789121212121212", ValueKind::Float64).unwrap(),
            TypedValue::Float64(0.123456789121212121212)
        );
        assert!(coerce("three", ValueKind::Float64).is_err());
    }

    #[test]
    fn bool_is_case_insensitive() {
        for raw in ["true", "True", "TRUE", "tRuE"] {
            assert_eq!(coerce(raw, ValueKind::Bool).unwrap(), TypedValue::Bool(true));
        }
        for raw in ["false", "False", "FALSE"] {
            assert_eq!(coerce(raw, ValueKind::Bool).unwrap(), TypedValue::Bool(false));
        }
        assert!(coerce("yes", ValueKind::Bool).is_err());
        assert!(coerce("1", ValueKind::Bool).is_err());
    }

    #[test]
    fn collection_kind_is_rejected_by_name() {
        let err = "[]int".parse::<ValueKind>().unwrap_err();
        assert_eq!(err, ScalerError::UnsupportedType("[]int".to_string()));
        assert!(err.to_string().contains("unsupported type: []int"));
    }

    #[test]
    fn kind_aliases_parse() {
        assert_eq!("int".parse::<ValueKind>().unwrap(), ValueKind::Int64);
        assert_eq!("boolean".parse::<ValueKind>().unwrap(), ValueKind::Bool);
        assert_eq!("float".parse::<ValueKind>().unwrap(), ValueKind::Float64);
    }

    #[test]
    fn param_value_extracts_matching_variant_only() {
        assert_eq!(i64::from_typed(TypedValue::Int64(4)), Some(4));
        assert_eq!(i64::from_typed(TypedValue::Uint64(4)), None);
        assert_eq!(<bool as ParamValue>::KIND, ValueKind::Bool);
    }
}
