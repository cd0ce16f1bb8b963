//! One tick's trigger evaluation and aggregation.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use scalegrid_core::unqualify;

use crate::replicas::desired_for_metric;
use crate::trigger::RegisteredTrigger;

/// What one trigger contributed to a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerOutcome {
    pub scaler_index: usize,
    pub label: String,
    /// The trigger's qualified metric name.
    pub metric_name: String,
    pub is_active: bool,
    /// Present only for a validated reading.
    pub value: Option<i64>,
    pub error: Option<String>,
}

impl TriggerOutcome {
    fn failed(trigger: &RegisteredTrigger, error: String) -> Self {
        Self {
            scaler_index: trigger.config.scaler_index,
            label: trigger.config.label(),
            metric_name: trigger.metric_spec().name.clone(),
            is_active: false,
            value: None,
            error: Some(error),
        }
    }
}

/// The aggregated signal of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSignal {
    /// OR over every trigger's activity.
    pub desired_active: bool,
    /// Most demanding replica count among active triggers.
    pub proposal: Option<u32>,
}

/// Evaluate every trigger concurrently.
///
/// Each evaluation gets `timeout`; a failed, timed-out or panicked
/// trigger yields an inactive outcome carrying the error. Outcomes are
/// returned in trigger order. Dropping the returned future aborts any
/// evaluation still in flight.
pub async fn evaluate_triggers(
    workload_id: &str,
    triggers: &[RegisteredTrigger],
    timeout: Duration,
) -> Vec<TriggerOutcome> {
    let mut outcomes: Vec<TriggerOutcome> = triggers
        .iter()
        .map(|t| TriggerOutcome::failed(t, "evaluation task panicked".to_string()))
        .collect();

    let mut tasks = JoinSet::new();
    for (pos, registered) in triggers.iter().enumerate() {
        let trigger = registered.trigger.clone();
        tasks.spawn(async move {
            let result = tokio::time::timeout(timeout, trigger.evaluate()).await;
            (pos, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (pos, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                warn!(workload = %workload_id, error = %e, "trigger task failed");
                continue;
            }
        };
        let registered = &triggers[pos];
        let index = registered.config.scaler_index;

        outcomes[pos] = match result {
            Err(_) => {
                warn!(
                    workload = %workload_id,
                    trigger = %registered.config.label(),
                    timeout_ms = timeout.as_millis() as u64,
                    "trigger evaluation timed out"
                );
                TriggerOutcome::failed(
                    registered,
                    format!("timed out after {}ms", timeout.as_millis()),
                )
            }
            Ok(Err(e)) => {
                warn!(
                    workload = %workload_id,
                    trigger = %registered.config.label(),
                    error = %e,
                    "trigger evaluation failed"
                );
                TriggerOutcome::failed(registered, format!("{e:#}"))
            }
            Ok(Ok(reading)) => match unqualify(index, &reading.metric_name) {
                Ok(_) => {
                    debug!(
                        workload = %workload_id,
                        metric = %reading.metric_name,
                        active = reading.is_active,
                        value = reading.value,
                        "trigger evaluated"
                    );
                    TriggerOutcome {
                        scaler_index: index,
                        label: registered.config.label(),
                        metric_name: registered.metric_spec().name.clone(),
                        is_active: reading.is_active,
                        value: Some(reading.value),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(
                        workload = %workload_id,
                        trigger = %registered.config.label(),
                        metric = %reading.metric_name,
                        error = %e,
                        "reading discarded, metric name does not belong to trigger"
                    );
                    TriggerOutcome::failed(
                        registered,
                        format!("rejected metric {:?}: {e}", reading.metric_name),
                    )
                }
            },
        };
    }

    outcomes
}

/// Combine outcomes into the tick's signal.
///
/// `outcomes` must be in the same order as `triggers`.
pub fn aggregate(
    triggers: &[RegisteredTrigger],
    outcomes: &[TriggerOutcome],
    current_replicas: u32,
) -> TickSignal {
    let mut signal = TickSignal {
        desired_active: false,
        proposal: None,
    };

    for (registered, outcome) in triggers.iter().zip(outcomes) {
        if !outcome.is_active {
            continue;
        }
        signal.desired_active = true;

        let Some(value) = outcome.value else { continue };
        let target = &registered.metric_spec().target;
        match desired_for_metric(target, value, current_replicas) {
            Some(desired) => {
                signal.proposal = Some(signal.proposal.map_or(desired, |p| p.max(desired)));
            }
            None => debug!(
                metric = %outcome.metric_name,
                target = target.amount(),
                "non-positive target, no replica proposal"
            ),
        }
    }

    signal
}
