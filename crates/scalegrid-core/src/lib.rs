//! scalegrid-core: the scaling decision engine's configuration layer.
//!
//! Turns heterogeneous, partially-overlapping trigger configuration into
//! typed parameters, and gives every trigger a collision-free metric
//! identity and a target the autoscaler can act on.
//!
//! - [`coerce`]: string to scalar conversion over a closed set of kinds
//! - [`params`]: layered lookup across auth params, metadata, and
//!   resolved env entries
//! - [`metric`]: metric target types and `s{index}-{name}` identities
//! - [`config`]: `scalegrid.toml` parsing

pub mod coerce;
pub mod config;
pub mod error;
pub mod metric;
pub mod params;
pub mod types;

pub use coerce::{ParamValue, TypedValue, ValueKind, coerce};
pub use config::ScalegridConfig;
pub use error::{ScalerError, ScalerResult};
pub use metric::{MetricSpec, MetricTarget, MetricTargetType, qualify, resolve_target_type, unqualify};
pub use params::{ParamOptions, ParameterSource, resolve};
pub use types::*;
