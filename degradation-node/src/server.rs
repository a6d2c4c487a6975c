use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, instrument};

use crate::counter::RequestCounter;
use crate::degradation::DegradationPolicy;
use crate::error::{ProbeFailure, SimulatorError};
use crate::telemetry;

/// Shared state for every handler
#[derive(Clone)]
pub struct SimulatorState {
    /// Cumulative request counter
    pub counter: Arc<RequestCounter>,
    /// Immutable degradation policy
    pub policy: Arc<DegradationPolicy>,
    /// Prometheus handle rendered on /metrics, if metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl SimulatorState {
    pub fn new(policy: DegradationPolicy, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            counter: Arc::new(RequestCounter::new()),
            policy: Arc::new(policy),
            metrics,
        }
    }
}

/// Handle a probe: capture a counter value, wait out its tier delay, then answer
async fn handle_ping(State(state): State<SimulatorState>) -> Result<&'static str, ProbeFailure> {
    let request = state.counter.increment();
    let decision = state.policy.decide(request);

    info!(
        request,
        delay_ms = decision.delay.as_millis() as u64,
        "Ping request received"
    );

    if !decision.delay.is_zero() {
        tokio::time::sleep(decision.delay).await;
    }

    counter!(
        "degradation_probe_outcomes_total",
        1,
        "outcome" => decision.outcome_label()
    );

    decision.outcome.map(|()| "pong")
}

async fn handle_counter(State(state): State<SimulatorState>) -> String {
    format!("Request counter: {}", state.counter.get())
}

async fn handle_reset(State(state): State<SimulatorState>) -> String {
    let previous = state.counter.reset();
    info!(previous, "Reset request counter");
    "Request counter: 0".to_string()
}

async fn handle_metrics(State(state): State<SimulatorState>) -> Response {
    match state.metrics {
        Some(ref handle) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics are disabled").into_response(),
    }
}

async fn health_check(State(state): State<SimulatorState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "degradation-node",
        "request_counter": state.counter.get(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Turn a handler panic into a labelled 500, distinct from the synthetic failures
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(detail = %detail, "Handler panicked");
    SimulatorError::Internal(detail).into_response()
}

/// Create the simulator router with all endpoints
pub fn create_router(state: SimulatorState) -> Router {
    Router::new()
        .route("/ping", get(handle_ping))
        .route("/counter", get(handle_counter))
        .route("/reset", get(handle_reset))
        .route("/metrics", get(handle_metrics))
        .route("/health", get(health_check))
        .route_layer(CatchPanicLayer::custom(handle_panic))
        .route_layer(middleware::from_fn(telemetry::track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: SimulatorState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Simulator server error")?;

    Ok(())
}

/// Start the simulator server
#[instrument(skip(state))]
pub async fn start_server(listen_addr: SocketAddr, state: SimulatorState) -> Result<()> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", listen_addr))?;

    info!(addr = %listen_addr, "Simulator API running");

    serve(listener, state, shutdown_signal()).await?;

    info!("Simulator server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
