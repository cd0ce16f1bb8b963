//! Daemon assembly: seed the store, run the controller, serve the API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use scalegrid_autoscale::{ControllerSettings, ScaleController, TriggerRegistry};
use scalegrid_core::{ScalegridConfig, WorkloadId};
use scalegrid_state::StateStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::actuator::store_actuator;
use crate::env::resolve_env_refs;

/// Options for [`run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub port: u16,
    pub data_dir: PathBuf,
}

/// Controller settings from the `[controller]` table.
pub fn controller_settings(config: &ScalegridConfig) -> anyhow::Result<ControllerSettings> {
    let scheduler_tick = config.controller.scheduler_tick()?;
    if scheduler_tick.is_zero() {
        bail!("controller.scheduler_tick must be greater than zero");
    }
    Ok(ControllerSettings {
        scheduler_tick,
        trigger_timeout: config.controller.trigger_timeout()?,
    })
}

/// Write every workload declared in `config` to the store, resolving
/// `*FromEnv` references through `lookup` first.
///
/// Returns the ids of the seeded workloads.
pub fn seed_workloads<F>(
    store: &StateStore,
    config: &ScalegridConfig,
    lookup: F,
) -> anyhow::Result<Vec<WorkloadId>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut ids = Vec::new();
    for mut spec in config.workload_specs()? {
        resolve_env_refs(&mut spec, &lookup);
        let stored = store
            .put_workload(&spec)
            .with_context(|| format!("storing workload {}", spec.id()))?;
        info!(
            workload = %stored.id(),
            generation = stored.generation,
            triggers = stored.triggers.len(),
            "workload seeded from config"
        );
        ids.push(stored.id());
    }
    Ok(ids)
}

/// A controller reading specs from `store` and recording its scale
/// requests there.
pub fn build_controller(
    store: StateStore,
    registry: TriggerRegistry,
    settings: ControllerSettings,
) -> ScaleController {
    ScaleController::new(Arc::new(store.clone()), registry, settings)
        .with_scale_fn(store_actuator(store))
}

/// Start loops for every stored workload and stop loops whose workload
/// is gone.
pub async fn sync_once(store: &StateStore, controller: &ScaleController) -> anyhow::Result<()> {
    let ids: Vec<WorkloadId> = store.list_workloads()?.iter().map(|s| s.id()).collect();
    controller.sync(&ids).await;
    debug!(workloads = ids.len(), "workload loops synced");
    Ok(())
}

/// Run [`sync_once`] every `interval` until `shutdown` flips.
pub async fn run_sync_loop(
    store: StateStore,
    controller: Arc<ScaleController>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sync_once(&store, &controller).await {
                    warn!(error = %e, "workload sync failed");
                }
            }
            _ = shutdown.changed() => {
                info!("sync loop shutting down");
                break;
            }
        }
    }
}

/// Run the daemon until Ctrl-C.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    info!("scalegrid daemon starting");

    let config = match &opts.config {
        Some(path) => ScalegridConfig::from_file(path)?,
        None => ScalegridConfig::default(),
    };
    let settings = controller_settings(&config)?;
    let sync_interval = config.controller.sync_interval()?;
    if sync_interval.is_zero() {
        bail!("controller.sync_interval must be greater than zero");
    }

    std::fs::create_dir_all(&opts.data_dir)
        .with_context(|| format!("creating {}", opts.data_dir.display()))?;
    let db_path = opts.data_dir.join("scalegrid.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let seeded = seed_workloads(&store, &config, crate::env::process_env)?;
    info!(count = seeded.len(), "config workloads seeded");

    let registry = scalegrid_triggers::builtin_registry();
    info!(types = ?registry.types(), "trigger registry ready");

    let controller = Arc::new(build_controller(store.clone(), registry, settings));
    sync_once(&store, &controller).await?;
    info!(
        scheduler_tick = ?settings.scheduler_tick,
        trigger_timeout = ?settings.trigger_timeout,
        "scale controller started"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sync_handle = tokio::spawn(run_sync_loop(
        store.clone(),
        controller.clone(),
        sync_interval,
        shutdown_rx,
    ));

    // ── API server ─────────────────────────────────────────────

    let router = scalegrid_api::build_router(scalegrid_api::ApiState {
        store,
        controller: controller.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = sync_handle.await;
    controller.stop_all().await;

    info!("scalegrid daemon stopped");
    Ok(())
}
