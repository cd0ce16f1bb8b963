//! redb table definitions for the scalegrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Workload specs keyed by `{namespace}/{name}`.
pub const WORKLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("workloads");

/// Latest requested replica count keyed by workload id.
pub const REPLICAS: TableDefinition<&str, &[u8]> = TableDefinition::new("replicas");

/// Scale request history keyed by `{workload_id}:{timestamp_ms:020}`.
pub const SCALE_EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("scale_events");
