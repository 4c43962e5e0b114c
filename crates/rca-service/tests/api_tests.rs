//! Integration tests for the correlation service API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use rca_engine::{
    health::{components, HealthRegistry},
    EngineConfig, RcaEngine,
};
use rca_service::api::{create_router, AppState};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app(snapshot_path: Option<PathBuf>) -> (Router, Arc<AppState>) {
    let engine = Arc::new(RcaEngine::new(EngineConfig::default()).unwrap());
    let health = HealthRegistry::new();
    health.register(components::GRAPH_STORE).await;
    health.register(components::CORRELATOR).await;

    let state = Arc::new(AppState::new(engine, health, snapshot_path));
    (create_router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn topology() -> Value {
    json!([
        {"name": "postgres"},
        {"name": "payment-x", "namespace": "shop", "dependencies": ["postgres"]},
        {"name": "checkout", "dependencies": ["payment-x"]}
    ])
}

fn incident() -> Value {
    let mut metrics: Vec<Value> = (0..10)
        .map(|i| json!({"timestamp": 5000 + i, "metric": "cpu_usage", "value": 50.0}))
        .collect();
    metrics.push(json!({"timestamp": 101, "metric": "cpu_usage", "value": 95.0}));

    json!({
        "metrics": metrics,
        "logs": [{"timestamp": 99, "service": "postgres", "message": "database error: too many clients"}],
        "events": [{"timestamp": 100, "type": "Warning", "reason": "PodCrashLoopBackOff", "object": "pod/payment-x"}]
    })
}

#[tokio::test]
async fn test_not_ready_until_topology_loaded() {
    let (app, _state) = setup_test_app(None).await;

    let (status, body) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reason"], "Topology not loaded");

    let (status, _) = send(&app, "PUT", "/v1/topology", Some(topology())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_healthz_reports_components() {
    let (app, state) = setup_test_app(None).await;
    state
        .health
        .set_degraded(components::SNAPSHOT, "disk full")
        .await;

    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["snapshot"]["detail"], "disk full");
}

#[tokio::test]
async fn test_topology_round_trip_and_chain() {
    let (app, _state) = setup_test_app(None).await;
    send(&app, "PUT", "/v1/topology", Some(topology())).await;

    let (status, body) = send(&app, "GET", "/v1/topology", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(body["edges"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/v1/chain/checkout", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chain"], json!(["payment-x", "postgres"]));
    assert_eq!(body["dependents"], json!([]));

    let (_, body) = send(&app, "GET", "/v1/chain/postgres", None).await;
    assert_eq!(body["chain"], json!([]));
    assert_eq!(body["dependents"], json!(["checkout", "payment-x"]));
}

#[tokio::test]
async fn test_unknown_service_chain_is_empty() {
    let (app, _state) = setup_test_app(None).await;
    let (status, body) = send(&app, "GET", "/v1/chain/ghost", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chain"], json!([]));
}

#[tokio::test]
async fn test_correlate_returns_ranked_report() {
    let (app, _state) = setup_test_app(None).await;
    send(&app, "PUT", "/v1/topology", Some(topology())).await;

    let (status, body) = send(&app, "POST", "/v1/correlate", Some(incident())).await;
    assert_eq!(status, StatusCode::OK);

    let hypotheses = body["hypotheses"].as_array().unwrap();
    assert_eq!(hypotheses.len(), 1);
    assert_eq!(hypotheses[0]["root_cause"], "postgres");
    assert_eq!(hypotheses[0]["affected_service"], "payment-x");
    assert_eq!(hypotheses[0]["severity"], "critical");
    assert_eq!(body["best"]["root_cause"], "postgres");
    assert_eq!(body["window_secs"], 300);
}

#[tokio::test]
async fn test_zero_window_is_rejected() {
    let (app, _state) = setup_test_app(None).await;
    let mut request = incident();
    request["window_secs"] = json!(0);

    let (status, body) = send(&app, "POST", "/v1/correlate", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("window"));
}

#[tokio::test]
async fn test_invalid_input_is_bad_request() {
    let (app, _state) = setup_test_app(None).await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/correlate",
        Some(json!({"metrics": [{"timestamp": 1, "metric": "", "value": 1.0}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, "PUT", "/v1/topology", Some(json!([{"name": ""}]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "PUT", "/v1/topology", Some(json!({"not": "a list"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_topology_update_writes_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("graph.json");
    let (app, _state) = setup_test_app(Some(path.clone())).await;

    send(&app, "PUT", "/v1/topology", Some(topology())).await;

    let restored = RcaEngine::new(EngineConfig::default()).unwrap();
    restored.load_graph(&path).unwrap();
    assert_eq!(restored.get_root_cause_chain("payment-x"), vec!["postgres"]);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_engine_metrics() {
    let (app, _state) = setup_test_app(None).await;
    send(&app, "POST", "/v1/correlate", Some(incident())).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("rca_correlation_runs_total"));
}

#[tokio::test]
async fn test_correlator_recovers_after_a_failed_task() {
    let (app, state) = setup_test_app(None).await;
    send(&app, "PUT", "/v1/topology", Some(topology())).await;
    state
        .health
        .set_unhealthy(components::CORRELATOR, "task panicked")
        .await;

    let (status, body) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reason"], "Component correlator is unhealthy");

    let (status, _) = send(&app, "POST", "/v1/correlate", Some(incident())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(body["components"]["correlator"]["status"], "healthy");
}

#[tokio::test]
async fn test_topology_update_restores_graph_store() {
    let (app, state) = setup_test_app(None).await;
    state
        .health
        .set_degraded(components::GRAPH_STORE, "restore failed")
        .await;

    let (status, _) = send(&app, "PUT", "/v1/topology", Some(topology())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["graph_store"]["status"], "healthy");
}

#[tokio::test]
async fn test_concurrent_topology_updates_keep_snapshot_consistent() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("graph.json");
    let (app, state) = setup_test_app(Some(path.clone())).await;

    let with_extra = |name: &str| {
        let mut services = topology();
        services
            .as_array_mut()
            .unwrap()
            .push(json!({"name": name, "dependencies": ["checkout"]}));
        services
    };
    let (a, b, c) = tokio::join!(
        send(&app, "PUT", "/v1/topology", Some(with_extra("web"))),
        send(&app, "PUT", "/v1/topology", Some(with_extra("mobile"))),
        send(&app, "PUT", "/v1/topology", Some(topology())),
    );
    for (status, _) in [a, b, c] {
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let on_disk = rca_engine::graph::load_snapshot(&path).unwrap();
    assert_eq!(on_disk, state.engine.export_graph());

    let (_, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(body["components"]["snapshot"]["status"], "healthy");
}

#[tokio::test]
async fn test_malformed_records_do_not_fail_the_request() {
    let (app, _state) = setup_test_app(None).await;
    send(&app, "PUT", "/v1/topology", Some(topology())).await;

    let mut request = incident();
    request["metrics"]
        .as_array_mut()
        .unwrap()
        .push(json!({"timestamp": 100, "metric": "up", "value": true}));
    request["events"].as_array_mut().unwrap().extend([
        json!({"timestamp": "1970-01-01T00:01:40", "type": "Warning", "reason": null, "object": "pod/checkout"}),
        json!({"timestamp": "later", "type": "Warning", "reason": "PodEvicted", "object": "pod/checkout"}),
    ]);

    let (status, body) = send(&app, "POST", "/v1/correlate", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["critical_events"], 2);
    assert_eq!(body["diagnostics"]["skipped_events"], 1);
    assert_eq!(body["diagnostics"]["skipped_columns"][0]["metric"], "up");
}
