//! Daemon integration tests.
//!
//! Run a real metrics endpoint, seed workloads from config, and check
//! that the controller's decisions land in the store and the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use scalegrid_autoscale::ControllerSettings;
use scalegrid_core::ScalegridConfig;
use scalegrid_state::StateStore;
use scalegridd::{build_controller, seed_workloads, sync_once};
use tower::ServiceExt;

async fn metrics_server(value: Arc<AtomicI64>) -> SocketAddr {
    let router = Router::new()
        .route(
            "/queue",
            get(|State(v): State<Arc<AtomicI64>>| async move {
                axum::Json(serde_json::json!({ "stats": { "depth": v.load(Ordering::SeqCst) } }))
            }),
        )
        .with_state(value);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn config_toml() -> &'static str {
    r#"
[controller]
scheduler_tick = "50ms"
trigger_timeout = "1s"

[[workloads]]
name = "worker"
polling_interval = 0
cooldown_period = 0
max_replicas = 10

[[workloads.triggers]]
type = "metrics-api"
metadata = { urlFromEnv = "QUEUE_URL", valueLocation = "stats.depth", targetValue = "5" }
"#
}

fn settings() -> ControllerSettings {
    ControllerSettings {
        scheduler_tick: Duration::from_millis(50),
        trigger_timeout: Duration::from_secs(1),
    }
}

async fn wait_for_replicas(store: &StateStore, id: &str, want: u32) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = store.get_replicas(id).unwrap().map(|r| r.replicas);
        if current == Some(want) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {id} at {want} replicas, last saw {current:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn seeding_resolves_env_references() {
    let store = StateStore::open_in_memory().unwrap();
    let config = ScalegridConfig::from_toml(config_toml()).unwrap();

    let ids = seed_workloads(&store, &config, |name| {
        (name == "QUEUE_URL").then(|| "http://queue:9000/queue".to_string())
    })
    .unwrap();
    assert_eq!(ids, vec!["default/worker".to_string()]);

    let spec = store.get_workload("default/worker").unwrap().unwrap();
    assert_eq!(spec.generation, 1);
    assert_eq!(spec.triggers[0].metadata["urlFromEnv"], "http://queue:9000/queue");
}

#[test]
fn seeding_is_persistent_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scalegrid.redb");
    let config = ScalegridConfig::from_toml(config_toml()).unwrap();

    {
        let store = StateStore::open(&path).unwrap();
        seed_workloads(&store, &config, |_| None).unwrap();
    }

    let store = StateStore::open(&path).unwrap();
    let spec = store.get_workload("default/worker").unwrap().unwrap();
    // Unset variable: the reference is dropped rather than kept verbatim.
    assert!(!spec.triggers[0].metadata.contains_key("urlFromEnv"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scales_up_and_back_to_zero() {
    let depth = Arc::new(AtomicI64::new(8));
    let addr = metrics_server(depth.clone()).await;

    let store = StateStore::open_in_memory().unwrap();
    let config = ScalegridConfig::from_toml(config_toml()).unwrap();
    let url = format!("http://{addr}/queue");
    seed_workloads(&store, &config, |_| Some(url.clone())).unwrap();

    let controller = build_controller(
        store.clone(),
        scalegrid_triggers::builtin_registry(),
        settings(),
    );
    sync_once(&store, &controller).await.unwrap();
    assert!(controller.is_running("default/worker").await);

    // depth 8 over target 5 per replica
    wait_for_replicas(&store, "default/worker", 2).await;

    depth.store(0, Ordering::SeqCst);
    wait_for_replicas(&store, "default/worker", 0).await;

    let events = store.list_scale_events("default/worker", 10).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].from, events[0].to), (2, 0));
    assert_eq!(events[0].reason, "cooldown expired");
    assert_eq!((events[1].from, events[1].to), (0, 2));
    assert_eq!(events[1].reason, "activation");

    controller.stop_all().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn workloads_submitted_over_api_are_scaled() {
    let depth = Arc::new(AtomicI64::new(12));
    let addr = metrics_server(depth).await;

    let store = StateStore::open_in_memory().unwrap();
    let controller = Arc::new(build_controller(
        store.clone(),
        scalegrid_triggers::builtin_registry(),
        settings(),
    ));
    let app = scalegrid_api::build_router(scalegrid_api::ApiState {
        store: store.clone(),
        controller: controller.clone(),
    });

    let spec = serde_json::json!({
        "namespace": "default",
        "name": "api",
        "polling_interval_secs": 0,
        "cooldown_period_secs": 300,
        "max_replicas": 3,
        "triggers": [{
            "type": "metrics-api",
            "metric_type": "AverageValue",
            "metadata": {
                "url": format!("http://{addr}/queue"),
                "valueLocation": "stats.depth",
                "targetValue": "2"
            }
        }]
    });
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/workloads")
                .header("content-type", "application/json")
                .body(Body::from(spec.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // 12 / 2 = 6, capped by max_replicas
    wait_for_replicas(&store, "default/api", 3).await;
    // let the loop publish its status for the same tick
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/workloads/default%2Fapi/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["desired_active"], true);
    assert_eq!(json["data"]["triggers"][0]["metric_name"], "s0-metric-api-stats-depth");
    assert_eq!(json["data"]["triggers"][0]["value"], 12);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/workloads/default%2Fapi/metrics/s0-metric-api-stats-depth")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("scalegrid_workload_replicas{workload=\"default/api\"} 3"));

    controller.stop_all().await;
}
