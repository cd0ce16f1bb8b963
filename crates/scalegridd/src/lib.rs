//! scalegridd: the scalegrid daemon.
//!
//! Assembles the scaling engine into one process:
//! - State store (redb) seeded from `scalegrid.toml`
//! - Scale controller with one loop per workload
//! - Store-backed actuator recording requested replica counts
//! - REST API and Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! scalegridd run --config scalegrid.toml --port 8080 --data-dir /var/lib/scalegrid
//! scalegridd check --config scalegrid.toml
//! ```

pub mod actuator;
pub mod daemon;
pub mod env;

pub use actuator::store_actuator;
pub use daemon::{
    RunOptions, build_controller, controller_settings, run, run_sync_loop, seed_workloads,
    sync_once,
};
pub use env::{process_env, resolve_env_refs};
