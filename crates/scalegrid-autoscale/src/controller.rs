//! Scale controller: one polling loop per workload.
//!
//! The `ScaleController` spawns a background task per workload that
//! evaluates its triggers every polling interval, runs the result through
//! the workload's [`ScaleState`], and hands scale requests to a callback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use scalegrid_core::{ScaledWorkloadSpec, WorkloadId, unqualify};
use scalegrid_state::StateStore;

use crate::poller::{TriggerOutcome, aggregate, evaluate_triggers};
use crate::state::{ScaleDecision, ScaleLimits, ScalePhase, ScaleReason, ScaleState};
use crate::trigger::{BoxFuture, RegistrationFailure, TriggerRegistry, TriggerSet};

/// Where workload loops read their spec from.
///
/// Called at the start of every tick; changes are observed at tick
/// boundaries only.
pub trait SpecSource: Send + Sync {
    fn workload(&self, id: &str) -> anyhow::Result<Option<ScaledWorkloadSpec>>;

    /// Replica count last requested for the workload, if known.
    fn replicas(&self, _id: &str) -> anyhow::Result<Option<u32>> {
        Ok(None)
    }
}

impl SpecSource for StateStore {
    fn workload(&self, id: &str) -> anyhow::Result<Option<ScaledWorkloadSpec>> {
        Ok(self.get_workload(id)?)
    }

    fn replicas(&self, id: &str) -> anyhow::Result<Option<u32>> {
        Ok(self.get_replicas(id)?.map(|r| r.replicas))
    }
}

/// A replica change handed to the actuator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleRequest {
    pub workload_id: WorkloadId,
    pub from: u32,
    pub to: u32,
    pub reason: ScaleReason,
    pub phase: ScalePhase,
}

/// Callback that applies a scale request.
///
/// Runs detached from the loop; the loop never waits for it.
pub type ScaleCallback =
    Arc<dyn Fn(ScaleRequest) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Loop cadence for workloads with a polling interval of 0.
    pub scheduler_tick: Duration,
    pub trigger_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            scheduler_tick: Duration::from_secs(1),
            trigger_timeout: Duration::from_secs(3),
        }
    }
}

/// Snapshot of a workload loop, published after every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadStatus {
    pub workload_id: WorkloadId,
    pub generation: u64,
    pub phase: ScalePhase,
    pub desired_active: bool,
    pub current_replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub seconds_since_active: u64,
    /// Seconds left in the cooldown window, while cooling down.
    pub cooldown_remaining_secs: Option<u64>,
    pub triggers: Vec<TriggerOutcome>,
    pub registration_failures: Vec<RegistrationFailure>,
}

impl WorkloadStatus {
    /// Latest outcome of the trigger owning `qualified`.
    pub fn metric(&self, qualified: &str) -> Option<&TriggerOutcome> {
        self.triggers.iter().find(|t| {
            match (
                unqualify(t.scaler_index, qualified),
                unqualify(t.scaler_index, &t.metric_name),
            ) {
                (Ok(asked), Ok(own)) => asked == own,
                _ => false,
            }
        })
    }
}

struct LoopSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    wake: Arc<Notify>,
}

type Statuses = Arc<RwLock<HashMap<WorkloadId, WorkloadStatus>>>;

/// Runs and tracks the polling loops of all workloads.
pub struct ScaleController {
    source: Arc<dyn SpecSource>,
    registry: Arc<TriggerRegistry>,
    settings: ControllerSettings,
    scale_fn: Option<ScaleCallback>,
    loops: Arc<RwLock<HashMap<WorkloadId, LoopSlot>>>,
    statuses: Statuses,
}

impl ScaleController {
    pub fn new(
        source: Arc<dyn SpecSource>,
        registry: TriggerRegistry,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            source,
            registry: Arc::new(registry),
            settings,
            scale_fn: None,
            loops: Arc::new(RwLock::new(HashMap::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Set the callback used to apply scale requests.
    pub fn with_scale_fn(mut self, f: ScaleCallback) -> Self {
        self.scale_fn = Some(f);
        self
    }

    /// Start the loop for a workload, replacing a running one.
    pub async fn start(&self, workload_id: &str) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());

        let ctx = LoopContext {
            workload_id: workload_id.to_string(),
            source: self.source.clone(),
            registry: self.registry.clone(),
            settings: self.settings,
            scale_fn: self.scale_fn.clone(),
            statuses: self.statuses.clone(),
            wake: wake.clone(),
        };
        let handle = tokio::spawn(run_workload_loop(ctx, shutdown_rx));

        let mut loops = self.loops.write().await;
        if let Some(old) = loops.insert(
            workload_id.to_string(),
            LoopSlot {
                handle,
                shutdown_tx,
                wake,
            },
        ) {
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
        }

        info!(workload = %workload_id, "scale loop started");
    }

    /// Stop a workload's loop. Returns false if none was running.
    ///
    /// The status entry is dropped only once the task has finished, so a
    /// tick in flight cannot publish it again.
    pub async fn stop(&self, workload_id: &str) -> bool {
        let slot = self.loops.write().await.remove(workload_id);
        let stopped = match slot {
            Some(slot) => {
                halt(slot).await;
                info!(workload = %workload_id, "scale loop stopped");
                true
            }
            None => false,
        };
        self.statuses.write().await.remove(workload_id);
        stopped
    }

    /// Stop all loops (for graceful shutdown).
    pub async fn stop_all(&self) {
        let slots: Vec<(WorkloadId, LoopSlot)> = self.loops.write().await.drain().collect();
        for (id, slot) in slots {
            halt(slot).await;
            debug!(workload = %id, "scale loop stopped");
        }
        self.statuses.write().await.clear();
        info!("all scale loops stopped");
    }

    /// Make the running set match `workload_ids`: start missing loops
    /// (including ones that exited by themselves) and stop the rest.
    pub async fn sync(&self, workload_ids: &[WorkloadId]) {
        let stale: Vec<WorkloadId> = {
            let loops = self.loops.read().await;
            loops
                .iter()
                .filter(|(id, slot)| slot.handle.is_finished() || !workload_ids.contains(*id))
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in &stale {
            self.stop(id).await;
        }

        for id in workload_ids {
            if !self.is_running(id).await {
                self.start(id).await;
            }
        }
    }

    /// Evaluate a workload now instead of waiting out its interval.
    ///
    /// The next tick is rescheduled from the current spec's polling
    /// interval, measured from the start of the last tick.
    pub async fn wake(&self, workload_id: &str) -> bool {
        match self.loops.read().await.get(workload_id) {
            Some(slot) => {
                slot.wake.notify_one();
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, workload_id: &str) -> bool {
        self.loops
            .read()
            .await
            .get(workload_id)
            .is_some_and(|slot| !slot.handle.is_finished())
    }

    /// IDs of workloads with a live loop, sorted.
    pub async fn running(&self) -> Vec<WorkloadId> {
        let loops = self.loops.read().await;
        let mut ids: Vec<WorkloadId> = loops
            .iter()
            .filter(|(_, slot)| !slot.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn status(&self, workload_id: &str) -> Option<WorkloadStatus> {
        self.statuses.read().await.get(workload_id).cloned()
    }

    /// Status of every workload that has completed a tick, sorted by id.
    pub async fn statuses(&self) -> Vec<WorkloadStatus> {
        let mut all: Vec<WorkloadStatus> = self.statuses.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.workload_id.cmp(&b.workload_id));
        all
    }
}

/// Signal, abort and wait for a loop task.
async fn halt(slot: LoopSlot) {
    let _ = slot.shutdown_tx.send(true);
    slot.handle.abort();
    let _ = slot.handle.await;
}

struct LoopContext {
    workload_id: WorkloadId,
    source: Arc<dyn SpecSource>,
    registry: Arc<TriggerRegistry>,
    settings: ControllerSettings,
    scale_fn: Option<ScaleCallback>,
    statuses: Statuses,
    wake: Arc<Notify>,
}

fn polling_interval(spec: &ScaledWorkloadSpec, scheduler_tick: Duration) -> Duration {
    match spec.polling_interval_secs {
        0 => scheduler_tick,
        secs => Duration::from_secs(secs),
    }
}

/// The polling loop for a single workload.
///
/// Ticks run strictly one after another. The loop exits when shut down
/// or when its spec is gone from the source.
async fn run_workload_loop(ctx: LoopContext, mut shutdown: watch::Receiver<bool>) {
    let id = ctx.workload_id.as_str();
    let mut triggers: Option<TriggerSet> = None;
    let mut state: Option<ScaleState> = None;
    let mut last_tick = Instant::now();
    let mut next_tick = last_tick;

    debug!(workload = %id, "scale loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_tick) => {}
            _ = ctx.wake.notified() => {
                match ctx.source.workload(id) {
                    Ok(Some(spec)) => {
                        next_tick = last_tick + polling_interval(&spec, ctx.settings.scheduler_tick);
                        debug!(workload = %id, "scale loop woken");
                    }
                    Ok(None) => {
                        info!(workload = %id, "workload removed, scale loop exiting");
                        break;
                    }
                    Err(e) => warn!(workload = %id, error = %e, "failed to read workload spec"),
                }
                continue;
            }
            _ = shutdown.changed() => {
                debug!(workload = %id, "scale loop shutting down");
                break;
            }
        }

        let tick_start = Instant::now();
        last_tick = tick_start;

        let spec = match ctx.source.workload(id) {
            Ok(Some(spec)) => spec,
            Ok(None) => {
                info!(workload = %id, "workload removed, scale loop exiting");
                break;
            }
            Err(e) => {
                error!(workload = %id, error = %e, "failed to read workload spec");
                next_tick = tick_start + ctx.settings.scheduler_tick;
                continue;
            }
        };
        next_tick = tick_start + polling_interval(&spec, ctx.settings.scheduler_tick);

        let set = match triggers.take() {
            Some(set) if set.generation == spec.generation => set,
            _ => {
                debug!(workload = %id, generation = spec.generation, "building triggers");
                ctx.registry.build_all(&spec)
            }
        };

        let scale_state = state.get_or_insert_with(|| {
            let current = match ctx.source.replicas(id) {
                Ok(Some(replicas)) => replicas,
                Ok(None) => spec.initial_replicas.unwrap_or(spec.min_replicas),
                Err(e) => {
                    warn!(workload = %id, error = %e, "failed to read replica record");
                    spec.initial_replicas.unwrap_or(spec.min_replicas)
                }
            };
            ScaleState::new(tick_start, current, spec.min_replicas)
        });

        let outcomes = evaluate_triggers(id, &set.triggers, ctx.settings.trigger_timeout).await;
        let signal = aggregate(&set.triggers, &outcomes, scale_state.current_replicas());

        let limits = ScaleLimits::from_spec(&spec);
        let from = scale_state.current_replicas();
        let previous_phase = scale_state.phase();
        let decision = scale_state.tick(tick_start, signal.desired_active, signal.proposal, &limits);
        let phase = scale_state.phase();

        if phase != previous_phase {
            match (previous_phase, phase) {
                (_, ScalePhase::CoolingDown) => info!(
                    workload = %id,
                    cooldown_secs = spec.cooldown_period_secs,
                    "cooldown started"
                ),
                (ScalePhase::CoolingDown, ScalePhase::Stable) => {
                    info!(workload = %id, "cooldown aborted, trigger active again")
                }
                (ScalePhase::CoolingDown, ScalePhase::Idle) => {
                    info!(workload = %id, "cooldown expired")
                }
                _ => debug!(workload = %id, from = %previous_phase, to = %phase, "phase changed"),
            }
        }

        if let ScaleDecision::ScaleTo { replicas, reason } = decision {
            info!(
                workload = %id,
                from,
                to = replicas,
                %reason,
                %phase,
                "scaling"
            );
            if let Some(cb) = &ctx.scale_fn {
                let request = ScaleRequest {
                    workload_id: id.to_string(),
                    from,
                    to: replicas,
                    reason,
                    phase,
                };
                let fut = cb(request);
                let workload_id = id.to_string();
                tokio::spawn(async move {
                    if let Err(e) = fut.await {
                        error!(workload = %workload_id, error = %e, "scale request failed");
                    }
                });
            }
        }

        let status = WorkloadStatus {
            workload_id: id.to_string(),
            generation: spec.generation,
            phase,
            desired_active: signal.desired_active,
            current_replicas: scale_state.current_replicas(),
            min_replicas: spec.min_replicas,
            max_replicas: spec.max_replicas,
            seconds_since_active: tick_start
                .saturating_duration_since(scale_state.last_active())
                .as_secs(),
            cooldown_remaining_secs: (phase == ScalePhase::CoolingDown).then(|| {
                scale_state
                    .cooldown_deadline(limits.cooldown)
                    .saturating_duration_since(tick_start)
                    .as_secs()
            }),
            triggers: outcomes,
            registration_failures: set.failures.clone(),
        };
        ctx.statuses.write().await.insert(id.to_string(), status);

        triggers = Some(set);
    }

    ctx.statuses.write().await.remove(id);
}
