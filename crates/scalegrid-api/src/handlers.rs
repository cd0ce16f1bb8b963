//! REST API handlers.
//!
//! Specs are read from and written to the `StateStore`; live status comes
//! from the `ScaleController`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;

use scalegrid_core::ScaledWorkloadSpec;
use scalegrid_state::StateError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn internal(e: StateError) -> axum::response::Response {
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

// ── Workloads ──────────────────────────────────────────────────

/// GET /api/v1/workloads
pub async fn list_workloads(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_workloads() {
        Ok(workloads) => ApiResponse::ok(workloads).into_response(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/workloads/{id}
pub async fn get_workload(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_workload(&id) {
        Ok(Some(spec)) => ApiResponse::ok(spec).into_response(),
        Ok(None) => error_response("workload not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/workloads
///
/// Creates or replaces the spec. A running loop picks the change up at
/// its next tick.
pub async fn put_workload(
    State(state): State<ApiState>,
    Json(spec): Json<ScaledWorkloadSpec>,
) -> impl IntoResponse {
    let stored = match state.store.put_workload(&spec) {
        Ok(stored) => stored,
        Err(StateError::Invalid(reason)) => {
            return error_response(&reason, StatusCode::BAD_REQUEST).into_response();
        }
        Err(e) => return internal(e),
    };

    let id = stored.id();
    if state.controller.is_running(&id).await {
        state.controller.wake(&id).await;
    } else {
        state.controller.start(&id).await;
    }
    info!(workload = %id, generation = stored.generation, "workload stored via api");

    (StatusCode::CREATED, ApiResponse::ok(stored)).into_response()
}

/// DELETE /api/v1/workloads/{id}
pub async fn delete_workload(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_workload(&id) {
        Ok(true) => {
            state.controller.stop(&id).await;
            ApiResponse::ok("deleted").into_response()
        }
        Ok(false) => error_response("workload not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

// ── Scaling status ─────────────────────────────────────────────

/// GET /api/v1/workloads/{id}/status
pub async fn get_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.controller.status(&id).await {
        Some(status) => ApiResponse::ok(status).into_response(),
        None => error_response("no status for workload", StatusCode::NOT_FOUND).into_response(),
    }
}

/// GET /api/v1/workloads/{id}/replicas
pub async fn get_replicas(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_replicas(&id) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => {
            error_response("no replica record for workload", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => internal(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_event_limit")]
    pub limit: usize,
}

fn default_event_limit() -> usize {
    50
}

/// GET /api/v1/workloads/{id}/events
pub async fn list_events(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    match state.store.list_scale_events(&id, query.limit) {
        Ok(events) => ApiResponse::ok(events).into_response(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/workloads/{id}/metrics/{metric}
///
/// `metric` is a qualified name (`s0-metric-api-value`); the owning
/// trigger is found by its scaler index prefix.
pub async fn get_metric(
    State(state): State<ApiState>,
    Path((id, metric)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(status) = state.controller.status(&id).await else {
        return error_response("no status for workload", StatusCode::NOT_FOUND).into_response();
    };
    match status.metric(&metric) {
        Some(outcome) => ApiResponse::ok(outcome.clone()).into_response(),
        None => error_response(
            &format!("metric {metric:?} not found for workload"),
            StatusCode::NOT_FOUND,
        )
        .into_response(),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let statuses = state.controller.statuses().await;
    let body = scalegrid_metrics::render_prometheus(&statuses);
    (
        StatusCode::OK,
        [("content-type", scalegrid_metrics::CONTENT_TYPE)],
        body,
    )
}
