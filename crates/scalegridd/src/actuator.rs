//! Replica actuator backed by the state store.
//!
//! Scale requests are recorded as the workload's current `ReplicaRecord`
//! and appended to its scale history. Whatever runs the workload reads
//! the record; the controller does not wait for it.

use std::sync::Arc;

use scalegrid_autoscale::{BoxFuture, ScaleCallback, ScaleRequest};
use scalegrid_state::{ReplicaRecord, ScaleEvent, StateStore};
use tracing::info;

/// A scale callback that writes each request to `store`.
pub fn store_actuator(store: StateStore) -> ScaleCallback {
    Arc::new(
        move |req: ScaleRequest| -> BoxFuture<'static, anyhow::Result<()>> {
            let store = store.clone();
            Box::pin(async move { apply(&store, &req) })
        },
    )
}

/// Record one scale request.
pub fn apply(store: &StateStore, req: &ScaleRequest) -> anyhow::Result<()> {
    let now = epoch_millis();
    store.put_replicas(&ReplicaRecord {
        workload_id: req.workload_id.clone(),
        replicas: req.to,
        updated_at: now,
    })?;
    store.put_scale_event(&ScaleEvent {
        workload_id: req.workload_id.clone(),
        from: req.from,
        to: req.to,
        reason: req.reason.to_string(),
        timestamp: now,
    })?;

    info!(
        workload = %req.workload_id,
        from = req.from,
        to = req.to,
        reason = %req.reason,
        "replicas recorded"
    );
    Ok(())
}

fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
