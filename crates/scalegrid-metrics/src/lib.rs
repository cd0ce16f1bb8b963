//! scalegrid-metrics: observability for scaled workloads.
//!
//! Renders the controller's live [`WorkloadStatus`] snapshots in the
//! Prometheus text exposition format for the `/metrics` endpoint.
//!
//! ```text
//! ScaleController::statuses()
//!   └── render_prometheus() → text/plain
//! ```
//!
//! [`WorkloadStatus`]: scalegrid_autoscale::WorkloadStatus

pub mod prometheus;

pub use prometheus::{CONTENT_TYPE, render_prometheus};
