//! StateStore: redb-backed state persistence for scalegrid.
//!
//! Provides typed CRUD operations over workload specs, replica records,
//! and scale events. All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        txn.open_table(REPLICAS).map_err(map_err!(Table))?;
        txn.open_table(SCALE_EVENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Workloads ──────────────────────────────────────────────────

    /// Insert or replace a workload spec.
    ///
    /// The stored spec's `generation` is one past the previous stored
    /// generation (or 1 for a new workload), whatever the caller passed.
    /// Returns the spec as stored.
    pub fn put_workload(&self, spec: &ScaledWorkloadSpec) -> StateResult<ScaledWorkloadSpec> {
        spec.validate().map_err(StateError::Invalid)?;

        let key = spec.id();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored = {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let previous = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    let old: ScaledWorkloadSpec =
                        serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                    old.generation
                }
                None => 0,
            };

            let mut stored = spec.clone();
            stored.generation = previous + 1;
            let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            stored
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, generation = stored.generation, "workload stored");
        Ok(stored)
    }

    /// Get a workload by `namespace/name` key.
    pub fn get_workload(&self, key: &str) -> StateResult<Option<ScaledWorkloadSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let spec: ScaledWorkloadSpec =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(spec))
            }
            None => Ok(None),
        }
    }

    /// List all workloads.
    pub fn list_workloads(&self) -> StateResult<Vec<ScaledWorkloadSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let spec: ScaledWorkloadSpec =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(spec);
        }
        Ok(results)
    }

    /// Delete a workload together with its replica record and scale
    /// history. Returns true if the workload existed.
    pub fn delete_workload(&self, key: &str) -> StateResult<bool> {
        let (start, end) = event_key_range(key);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        let events_removed;
        {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
            let mut replicas = txn.open_table(REPLICAS).map_err(map_err!(Table))?;
            replicas.remove(key).map_err(map_err!(Write))?;

            let mut events = txn.open_table(SCALE_EVENTS).map_err(map_err!(Table))?;
            let keys: Vec<String> = events
                .range(start.as_str()..end.as_str())
                .map_err(map_err!(Read))?
                .map(|entry| entry.map(|(k, _)| k.value().to_string()))
                .collect::<Result<_, _>>()
                .map_err(map_err!(Read))?;
            for event_key in &keys {
                events.remove(event_key.as_str()).map_err(map_err!(Write))?;
            }
            events_removed = keys.len();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, events_removed, "workload deleted");
        Ok(existed)
    }

    // ── Replicas ───────────────────────────────────────────────────

    /// Record the replica count requested for a workload.
    pub fn put_replicas(&self, record: &ReplicaRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(REPLICAS).map_err(map_err!(Table))?;
            table
                .insert(record.workload_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get the last replica record for a workload.
    pub fn get_replicas(&self, workload_id: &str) -> StateResult<Option<ReplicaRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(REPLICAS).map_err(map_err!(Table))?;
        match table.get(workload_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ReplicaRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    // ── Scale events ───────────────────────────────────────────────

    /// Append a scale event.
    pub fn put_scale_event(&self, event: &ScaleEvent) -> StateResult<()> {
        let key = event.table_key();
        let value = serde_json::to_vec(event).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SCALE_EVENTS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Most recent scale events for a workload, newest first.
    pub fn list_scale_events(
        &self,
        workload_id: &str,
        limit: usize,
    ) -> StateResult<Vec<ScaleEvent>> {
        let mut results = Vec::new();
        if limit == 0 {
            return Ok(results);
        }
        let (start, end) = event_key_range(workload_id);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCALE_EVENTS).map_err(map_err!(Table))?;
        let range = table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?;
        for entry in range.rev().take(limit) {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let event: ScaleEvent =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(event);
        }
        Ok(results)
    }
}

/// Key bounds `[{id}:, {id};)` covering one workload's scale events.
fn event_key_range(workload_id: &str) -> (String, String) {
    (format!("{workload_id}:"), format!("{workload_id};"))
}
