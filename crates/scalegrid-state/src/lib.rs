//! scalegrid-state: embedded state store for scalegrid.
//!
//! Backed by [redb](https://docs.rs/redb). Holds the autoscaling spec of
//! every workload (the controller's spec source) and the replica counts
//! the controller has requested (the actuator's record).
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Workload keys are `{namespace}/{name}`; scale events are keyed
//! `{workload_id}:{timestamp_ms}` so a prefix scan returns one workload's
//! history in time order.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
