//! scalegrid-autoscale: trigger-driven replica scaling.
//!
//! Each workload gets a polling loop. Every tick evaluates the
//! workload's triggers concurrently, ORs their activity, and feeds the
//! result through a four-phase state machine that scales up on the first
//! active reading and scales down only after the cooldown window.
//!
//! # Scaling Algorithm
//!
//! ```text
//! per trigger (active, validated reading):
//!     AverageValue: desired = ceil(value / target)
//!     Value:        desired = ceil(max(current, 1) * value / target)
//!
//! active:   ScaleTo(clamp(max(desired), max(min, 1), max))
//! inactive: hold for cooldown, then ScaleTo(min)
//! ```
//!
//! A trigger that errors or times out counts as inactive for that tick
//! only. A reading whose metric name does not carry the trigger's own
//! `s{index}-` prefix is discarded.

pub mod controller;
pub mod poller;
pub mod replicas;
pub mod state;
pub mod trigger;

pub use controller::{
    ControllerSettings, ScaleCallback, ScaleController, ScaleRequest, SpecSource, WorkloadStatus,
};
pub use poller::{TickSignal, TriggerOutcome, aggregate, evaluate_triggers};
pub use replicas::desired_for_metric;
pub use state::{ScaleDecision, ScaleLimits, ScalePhase, ScaleReason, ScaleState};
pub use trigger::{
    BoxFuture, RegisteredTrigger, RegistrationFailure, Trigger, TriggerBuilder, TriggerReading,
    TriggerRegistry, TriggerSet,
};
