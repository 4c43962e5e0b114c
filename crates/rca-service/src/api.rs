//! HTTP API: correlation, topology, health checks and Prometheus metrics

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use rca_engine::{
    health::{components, ComponentStatus, HealthRegistry},
    GraphSnapshot, IncidentInput, IncidentReport, RcaEngine, RcaError, ServiceDescriptor,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RcaEngine>,
    pub health: HealthRegistry,
    /// Where topology updates are persisted, if anywhere
    pub snapshot_path: Option<PathBuf>,
    /// Serializes topology updates so the snapshot on disk matches the last
    /// graph installed
    topology_update: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(engine: Arc<RcaEngine>, health: HealthRegistry, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            engine,
            health,
            snapshot_path,
            topology_update: Arc::new(Mutex::new(())),
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<RcaError> for ApiError {
    fn from(err: RcaError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Body of `POST /v1/correlate`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CorrelateRequest {
    #[serde(flatten)]
    pub input: IncidentInput,
    /// Overrides the configured window for this request
    #[serde(default)]
    pub window_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub service: String,
    /// Upstream services, nearest first
    pub chain: Vec<String>,
    /// Services that would feel an outage of `service`
    pub dependents: Vec<String>,
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a topology is in place
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

async fn put_topology(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<ServiceDescriptor>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(services) = body?;
    let _guard = state.topology_update.lock().await;
    state.engine.build_dependency_graph(&services)?;
    state.health.set_healthy(components::GRAPH_STORE).await;
    state.health.mark_topology_loaded().await;
    info!(services = services.len(), "Topology replaced");

    persist_topology(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Rewrite the snapshot file. Failures degrade health but never fail the update.
async fn persist_topology(state: &AppState) {
    let Some(path) = state.snapshot_path.clone() else {
        return;
    };

    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.save_graph(&path)).await;
    match result {
        Ok(Ok(())) => state.health.set_healthy(components::SNAPSHOT).await,
        Ok(Err(err)) => {
            state
                .health
                .set_degraded(components::SNAPSHOT, err.to_string())
                .await
        }
        Err(join_err) => {
            warn!(error = %join_err, "Snapshot task did not complete");
            state
                .health
                .set_degraded(components::SNAPSHOT, join_err.to_string())
                .await
        }
    }
}

async fn get_topology(State(state): State<Arc<AppState>>) -> Json<GraphSnapshot> {
    Json(state.engine.export_graph())
}

async fn correlate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CorrelateRequest>, JsonRejection>,
) -> Result<Json<IncidentReport>, ApiError> {
    let Json(request) = body?;
    let window = request.window_secs.map(Duration::from_secs);

    // extraction and ranking are CPU-bound
    let engine = state.engine.clone();
    let outcome =
        tokio::task::spawn_blocking(move || engine.analyze(&request.input, window)).await;

    match outcome {
        Ok(report) => {
            // clears an earlier task failure
            state.health.set_healthy(components::CORRELATOR).await;
            Ok(Json(report?))
        }
        Err(join_err) => {
            error!(error = %join_err, "Correlation task failed");
            state
                .health
                .set_unhealthy(components::CORRELATOR, join_err.to_string())
                .await;
            Err(ApiError::Internal("correlation task failed".to_string()))
        }
    }
}

async fn chain(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
) -> Json<ChainResponse> {
    Json(ChainResponse {
        chain: state.engine.get_root_cause_chain(&service),
        dependents: state.engine.dependents(&service),
        service,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/topology", get(get_topology).put(put_topology))
        .route("/v1/correlate", post(correlate))
        .route("/v1/chain/:service", get(chain))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
