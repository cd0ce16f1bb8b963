//! `metrics-api` trigger: reads a number out of a JSON HTTP endpoint.
//!
//! ```toml
//! [[workloads.triggers]]
//! type = "metrics-api"
//! metadata = { url = "http://metrics:8080/api/queue", valueLocation = "stats.depth", targetValue = "5" }
//! ```

use std::sync::Arc;

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Uri};
use serde_json::Value;
use tracing::debug;

use scalegrid_autoscale::{BoxFuture, Trigger, TriggerReading};
use scalegrid_core::{MetricSpec, ParamOptions, ScalerConfig};

use crate::client;

pub const TRIGGER_TYPE: &str = "metrics-api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsApiConfig {
    pub url: Uri,
    /// Dot-separated path to the value in the response body.
    pub value_location: String,
    pub target_value: f64,
    /// The trigger is active while the value is above this.
    pub activation_target_value: f64,
    pub auth: AuthMode,
}

impl MetricsApiConfig {
    pub fn from_config(cfg: &ScalerConfig) -> anyhow::Result<Self> {
        let url: String = cfg.param("url", &ParamOptions::metadata().with_resolved_env())?;
        let url: Uri = url.parse().with_context(|| format!("invalid url {url:?}"))?;
        client::validate_uri(&url)?;

        let value_location: String = cfg.param("valueLocation", &ParamOptions::metadata())?;
        if value_location.is_empty() {
            bail!("valueLocation must not be empty");
        }

        let target_value: f64 = cfg.param("targetValue", &ParamOptions::metadata())?;
        if target_value <= 0.0 || !target_value.is_finite() {
            bail!("targetValue must be a positive number, got {target_value}");
        }
        let activation_target_value: f64 = cfg.param(
            "activationTargetValue",
            &ParamOptions::metadata().with_default("0"),
        )?;

        Ok(Self {
            url,
            value_location,
            target_value,
            activation_target_value,
            auth: parse_auth(cfg)?,
        })
    }

    /// Target handed to the autoscaler, rounded up to a whole number.
    pub fn target_amount(&self) -> i64 {
        self.target_value.ceil() as i64
    }
}

fn parse_auth(cfg: &ScalerConfig) -> anyhow::Result<AuthMode> {
    let mode: String = cfg.param(
        "authMode",
        &ParamOptions::auth().with_metadata().optional(),
    )?;
    let username: String = cfg.param("username", &ParamOptions::auth().optional())?;
    let password: String = cfg.param("password", &ParamOptions::auth().optional())?;
    let token: String = cfg.param("token", &ParamOptions::auth().optional())?;

    match mode.to_ascii_lowercase().as_str() {
        "" if !username.is_empty() => Ok(AuthMode::Basic { username, password }),
        "" if !token.is_empty() => Ok(AuthMode::Bearer { token }),
        "" => Ok(AuthMode::None),
        "basic" => {
            if username.is_empty() {
                bail!("authMode basic requires a username auth param");
            }
            Ok(AuthMode::Basic { username, password })
        }
        "bearer" => {
            if token.is_empty() {
                bail!("authMode bearer requires a token auth param");
            }
            Ok(AuthMode::Bearer { token })
        }
        other => bail!("unsupported authMode {other:?}"),
    }
}

/// Follow `location` (`a.b.0.c`) into `body` and read a number.
///
/// Numeric segments index into arrays. Numbers and numeric strings are
/// accepted at the end of the path.
pub fn extract_value(body: &Value, location: &str) -> anyhow::Result<f64> {
    let mut current = body;
    for segment in location.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next
            .with_context(|| format!("valueLocation {location:?}: no value at {segment:?}"))?;
    }

    let value = match current {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .with_context(|| format!("valueLocation {location:?} does not hold a number: {current}"))?;

    if !value.is_finite() {
        bail!("valueLocation {location:?} holds a non-finite number");
    }
    Ok(value)
}

pub struct MetricsApiTrigger {
    config: MetricsApiConfig,
    spec: MetricSpec,
    headers: HeaderMap,
}

impl MetricsApiTrigger {
    pub fn new(cfg: &ScalerConfig) -> anyhow::Result<Self> {
        let config = MetricsApiConfig::from_config(cfg)?;
        let spec = MetricSpec::new(
            cfg,
            &format!("metric-api-{}", config.value_location),
            config.target_amount(),
        )?;

        let mut headers = HeaderMap::new();
        let authorization = match &config.auth {
            AuthMode::None => None,
            AuthMode::Basic { username, password } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{username}:{password}"))
            )),
            AuthMode::Bearer { token } => Some(format!("Bearer {token}")),
        };
        if let Some(value) = authorization {
            let mut value =
                HeaderValue::from_str(&value).context("credentials are not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        debug!(
            trigger = %cfg.label(),
            url = %config.url,
            metric = %spec.name,
            "metrics-api trigger configured"
        );
        Ok(Self {
            config,
            spec,
            headers,
        })
    }

    async fn fetch_value(&self) -> anyhow::Result<f64> {
        let resp = client::get(&self.config.url, &self.headers).await?;
        if !resp.status.is_success() {
            bail!("{} returned {}", self.config.url, resp.status);
        }
        let body: Value = serde_json::from_slice(&resp.body)
            .with_context(|| format!("{} did not return JSON", self.config.url))?;
        extract_value(&body, &self.config.value_location)
    }
}

impl Trigger for MetricsApiTrigger {
    fn metric_spec(&self) -> &MetricSpec {
        &self.spec
    }

    fn evaluate(&self) -> BoxFuture<'_, anyhow::Result<TriggerReading>> {
        Box::pin(async move {
            let value = self.fetch_value().await?;
            Ok(TriggerReading {
                is_active: value > self.config.activation_target_value,
                metric_name: self.spec.name.clone(),
                value: value.round() as i64,
            })
        })
    }
}

/// Registry builder for [`TRIGGER_TYPE`].
pub fn build(cfg: &ScalerConfig) -> anyhow::Result<Arc<dyn Trigger>> {
    Ok(Arc::new(MetricsApiTrigger::new(cfg)?))
}
