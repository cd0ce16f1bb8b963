//! Domain types persisted by the state store.

use serde::{Deserialize, Serialize};

pub use scalegrid_core::{ScaledWorkloadSpec, WorkloadId};

/// The replica count most recently requested for a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    pub workload_id: WorkloadId,
    pub replicas: u32,
    /// Unix timestamp (milliseconds) of the request.
    pub updated_at: u64,
}

/// One scale request, kept as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleEvent {
    pub workload_id: WorkloadId,
    pub from: u32,
    pub to: u32,
    /// Why the controller scaled, e.g. `activation` or `cooldown expired`.
    pub reason: String,
    /// Unix timestamp (milliseconds).
    pub timestamp: u64,
}

impl ScaleEvent {
    /// Build the composite key for the scale events table.
    pub fn table_key(&self) -> String {
        format!("{}:{:020}", self.workload_id, self.timestamp)
    }
}
