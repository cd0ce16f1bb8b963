//! scalegrid-api: REST API for scalegrid.
//!
//! Provides axum route handlers for managing scaled workloads and
//! reading the controller's live decisions. Workload ids contain a `/`
//! (`namespace/name`) and are percent-encoded in paths
//! (`default%2Fapi`).
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/workloads` | List workload specs |
//! | POST | `/api/v1/workloads` | Create or replace a workload spec |
//! | GET | `/api/v1/workloads/{id}` | Get a workload spec |
//! | DELETE | `/api/v1/workloads/{id}` | Delete a workload and stop its loop |
//! | GET | `/api/v1/workloads/{id}/status` | Live scaling status |
//! | GET | `/api/v1/workloads/{id}/replicas` | Last requested replica count |
//! | GET | `/api/v1/workloads/{id}/events` | Scale history, newest first |
//! | GET | `/api/v1/workloads/{id}/metrics/{metric}` | Latest value of a qualified metric |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use scalegrid_autoscale::ScaleController;
use scalegrid_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub controller: Arc<ScaleController>,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/workloads",
            get(handlers::list_workloads).post(handlers::put_workload),
        )
        .route(
            "/workloads/{id}",
            get(handlers::get_workload).delete(handlers::delete_workload),
        )
        .route("/workloads/{id}/status", get(handlers::get_status))
        .route("/workloads/{id}/replicas", get(handlers::get_replicas))
        .route("/workloads/{id}/events", get(handlers::list_events))
        .route("/workloads/{id}/metrics/{metric}", get(handlers::get_metric))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
