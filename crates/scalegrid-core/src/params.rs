//! Layered parameter resolution for trigger configuration.
//!
//! A trigger parameter can come from the trigger's auth params, its
//! metadata, or a metadata entry that an upstream provider already
//! dereferenced from an environment variable (`{name}FromEnv`). Each
//! lookup enables a subset of these sources; the first enabled source
//! holding the key wins, in this fixed order:
//!
//! ```text
//! AuthParams[name]            if use_auth_params
//! TriggerMetadata[name]       if use_metadata
//! TriggerMetadata[nameFromEnv] if use_resolved_env
//! default                     if optional
//! ```
//!
//! The raw string is then coerced to the requested kind.

use serde::{Deserialize, Serialize};

use crate::coerce::{ParamValue, TypedValue, ValueKind, coerce};
use crate::error::{ScalerError, ScalerResult};
use crate::types::ScalerConfig;

/// Suffix of metadata keys holding values resolved from the environment.
pub const RESOLVED_ENV_SUFFIX: &str = "FromEnv";

/// Where a resolved parameter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSource {
    AuthParams,
    TriggerMetadata,
    ResolvedEnv,
    Default,
}

/// Which sources a lookup may read, and what to do when none has the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamOptions {
    pub use_metadata: bool,
    pub use_auth_params: bool,
    pub use_resolved_env: bool,
    pub optional: bool,
    pub default_value: String,
}

impl ParamOptions {
    /// Look up trigger metadata only.
    pub fn metadata() -> Self {
        Self {
            use_metadata: true,
            ..Default::default()
        }
    }

    /// Look up auth params only.
    pub fn auth() -> Self {
        Self {
            use_auth_params: true,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self) -> Self {
        self.use_metadata = true;
        self
    }

    pub fn with_auth(mut self) -> Self {
        self.use_auth_params = true;
        self
    }

    pub fn with_resolved_env(mut self) -> Self {
        self.use_resolved_env = true;
        self
    }

    /// Mark the parameter optional; it resolves to the kind's zero value
    /// when absent.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the parameter optional with a default used when absent.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.optional = true;
        self.default_value = value.into();
        self
    }
}

type Lookup = for<'a> fn(&'a ScalerConfig, &str) -> Option<&'a str>;

fn from_auth_params<'a>(cfg: &'a ScalerConfig, name: &str) -> Option<&'a str> {
    cfg.auth_params.get(name).map(String::as_str)
}

fn from_metadata<'a>(cfg: &'a ScalerConfig, name: &str) -> Option<&'a str> {
    cfg.trigger_metadata.get(name).map(String::as_str)
}

fn from_resolved_env<'a>(cfg: &'a ScalerConfig, name: &str) -> Option<&'a str> {
    cfg.trigger_metadata
        .get(&format!("{name}{RESOLVED_ENV_SUFFIX}"))
        .map(String::as_str)
}

/// Find the raw string for `name` and the source it came from.
///
/// Returns `None` when no enabled source holds the key, regardless of
/// `optional`.
pub fn lookup<'a>(
    cfg: &'a ScalerConfig,
    name: &str,
    opts: &ParamOptions,
) -> Option<(ParameterSource, &'a str)> {
    let sources: [(bool, ParameterSource, Lookup); 3] = [
        (opts.use_auth_params, ParameterSource::AuthParams, from_auth_params),
        (opts.use_metadata, ParameterSource::TriggerMetadata, from_metadata),
        (opts.use_resolved_env, ParameterSource::ResolvedEnv, from_resolved_env),
    ];

    sources
        .into_iter()
        .filter(|(enabled, _, _)| *enabled)
        .find_map(|(_, source, get)| get(cfg, name).map(|raw| (source, raw)))
}

/// Resolve a parameter and coerce it to `kind`.
pub fn resolve_with_source(
    cfg: &ScalerConfig,
    name: &str,
    opts: &ParamOptions,
    kind: ValueKind,
) -> ScalerResult<(ParameterSource, TypedValue)> {
    if let Some((source, raw)) = lookup(cfg, name, opts) {
        return Ok((source, coerce(raw, kind)?));
    }

    if !opts.optional {
        return Err(ScalerError::ParameterNotFound(name.to_string()));
    }

    let value = if opts.default_value.is_empty() {
        kind.zero()
    } else {
        coerce(&opts.default_value, kind)?
    };
    Ok((ParameterSource::Default, value))
}

/// Resolve a parameter and coerce it to `kind`.
pub fn resolve(
    cfg: &ScalerConfig,
    name: &str,
    opts: &ParamOptions,
    kind: ValueKind,
) -> ScalerResult<TypedValue> {
    resolve_with_source(cfg, name, opts, kind).map(|(_, value)| value)
}

impl ScalerConfig {
    /// Typed parameter lookup, e.g. `cfg.param::<f64>("targetValue", &ParamOptions::metadata())`.
    pub fn param<T: ParamValue>(&self, name: &str, opts: &ParamOptions) -> ScalerResult<T> {
        let value = resolve(self, name, opts, T::KIND)?;
        T::from_typed(value).ok_or_else(|| ScalerError::UnsupportedType(T::KIND.to_string()))
    }
}
