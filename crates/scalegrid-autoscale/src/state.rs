//! Per-workload scaling state machine.
//!
//! ```text
//!            active                 active
//!   Idle ──────────────▶ ScalingUp ───────▶ Stable ◀──┐
//!    ▲                       │               │  ▲     │ active
//!    │                       │ inactive      │  │     │ (tracks metric)
//!    │                       ▼               │  └─────┘
//!    │   expired + inactive                  │ inactive
//!    └───────────────── CoolingDown ◀────────┘
//!                          │   ▲
//!                   active │   │ inactive, window open (hold)
//!                  (abort) ▼   │
//!                        Stable
//! ```
//!
//! The cooldown window is measured from the last tick that saw an active
//! signal, using whatever cooldown period the caller passes on the tick
//! that checks it.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use scalegrid_core::ScaledWorkloadSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalePhase {
    /// At the minimum replica count with no active trigger.
    Idle,
    /// First active tick after idling.
    ScalingUp,
    /// Active; replicas follow the metric.
    Stable,
    /// Inactive, waiting for the cooldown window to elapse.
    CoolingDown,
}

impl ScalePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalePhase::Idle => "idle",
            ScalePhase::ScalingUp => "scaling_up",
            ScalePhase::Stable => "stable",
            ScalePhase::CoolingDown => "cooling_down",
        }
    }
}

impl fmt::Display for ScalePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a scale request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleReason {
    /// Idle workload became active.
    Activation,
    /// Active workload whose metric asks for a different count.
    MetricChange,
    /// Cooldown window elapsed with no active trigger.
    CooldownExpired,
    /// Replica count fell outside the configured bounds.
    Bounds,
}

impl ScaleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleReason::Activation => "activation",
            ScaleReason::MetricChange => "metric change",
            ScaleReason::CooldownExpired => "cooldown expired",
            ScaleReason::Bounds => "replica bounds",
        }
    }
}

impl fmt::Display for ScaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    ScaleTo { replicas: u32, reason: ScaleReason },
    NoChange,
}

/// Bounds and cooldown for one tick, read from the current spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleLimits {
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub cooldown: Duration,
}

impl ScaleLimits {
    pub fn from_spec(spec: &ScaledWorkloadSpec) -> Self {
        Self {
            min_replicas: spec.min_replicas,
            max_replicas: spec.max_replicas,
            cooldown: Duration::from_secs(spec.cooldown_period_secs),
        }
    }

    /// Lowest count allowed while a trigger is active.
    fn active_floor(&self) -> u32 {
        self.min_replicas.max(1).min(self.max_replicas)
    }

    fn clamp_active(&self, replicas: u32) -> u32 {
        replicas.clamp(self.active_floor(), self.max_replicas.max(self.active_floor()))
    }

    fn clamp(&self, replicas: u32) -> u32 {
        replicas.clamp(self.min_replicas, self.max_replicas.max(self.min_replicas))
    }
}

/// Scaling state owned by one workload loop.
#[derive(Debug, Clone)]
pub struct ScaleState {
    phase: ScalePhase,
    current_replicas: u32,
    last_active: Instant,
    cooldown_started: Option<Instant>,
}

impl ScaleState {
    /// State for a workload first seen at `now` with `current` replicas.
    ///
    /// `last_active` starts at `now`, so a workload registered above its
    /// minimum gets a full cooldown window before it can scale down.
    pub fn new(now: Instant, current: u32, min_replicas: u32) -> Self {
        let phase = if current <= min_replicas {
            ScalePhase::Idle
        } else {
            ScalePhase::Stable
        };
        Self {
            phase,
            current_replicas: current,
            last_active: now,
            cooldown_started: None,
        }
    }

    pub fn phase(&self) -> ScalePhase {
        self.phase
    }

    pub fn current_replicas(&self) -> u32 {
        self.current_replicas
    }

    /// Last tick that saw an active signal.
    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    /// When the current cooldown window was entered, if cooling down.
    pub fn cooldown_started(&self) -> Option<Instant> {
        self.cooldown_started
    }

    /// End of the cooldown window under `cooldown`.
    pub fn cooldown_deadline(&self, cooldown: Duration) -> Instant {
        self.last_active + cooldown
    }

    /// Apply one tick's aggregated signal.
    ///
    /// `proposal` is the replica count the metrics ask for, if any
    /// active trigger produced one. A returned `ScaleTo` is already
    /// reflected in [`current_replicas`](Self::current_replicas).
    pub fn tick(
        &mut self,
        now: Instant,
        desired_active: bool,
        proposal: Option<u32>,
        limits: &ScaleLimits,
    ) -> ScaleDecision {
        if desired_active {
            self.on_active(now, proposal, limits)
        } else {
            self.on_inactive(now, limits)
        }
    }

    fn on_active(&mut self, now: Instant, proposal: Option<u32>, limits: &ScaleLimits) -> ScaleDecision {
        self.last_active = now;
        let previous = self.phase;
        self.phase = match previous {
            ScalePhase::Idle => ScalePhase::ScalingUp,
            ScalePhase::CoolingDown => {
                debug!("cooldown aborted");
                ScalePhase::Stable
            }
            ScalePhase::ScalingUp | ScalePhase::Stable => ScalePhase::Stable,
        };
        self.cooldown_started = None;

        let target = limits.clamp_active(proposal.unwrap_or(self.current_replicas));
        let reason = if previous == ScalePhase::Idle {
            ScaleReason::Activation
        } else {
            ScaleReason::MetricChange
        };
        self.scale_to(target, reason)
    }

    fn on_inactive(&mut self, now: Instant, limits: &ScaleLimits) -> ScaleDecision {
        match self.phase {
            ScalePhase::ScalingUp | ScalePhase::Stable => {
                self.phase = ScalePhase::CoolingDown;
                self.cooldown_started = Some(now);
                self.scale_to(limits.clamp(self.current_replicas), ScaleReason::Bounds)
            }
            ScalePhase::CoolingDown => {
                if now > self.cooldown_deadline(limits.cooldown) {
                    self.phase = ScalePhase::Idle;
                    self.cooldown_started = None;
                    self.scale_to(limits.min_replicas, ScaleReason::CooldownExpired)
                } else {
                    self.scale_to(limits.clamp(self.current_replicas), ScaleReason::Bounds)
                }
            }
            ScalePhase::Idle => self.scale_to(limits.min_replicas, ScaleReason::Bounds),
        }
    }

    fn scale_to(&mut self, replicas: u32, reason: ScaleReason) -> ScaleDecision {
        if replicas == self.current_replicas {
            return ScaleDecision::NoChange;
        }
        self.current_replicas = replicas;
        ScaleDecision::ScaleTo { replicas, reason }
    }
}
