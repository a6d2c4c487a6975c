//! Logging and Prometheus metrics
//!
//! Request durations are recorded into `http_request_duration_seconds` with
//! the same bucket layout load-test dashboards expect, and process/runtime
//! gauges are refreshed on a fixed interval.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{LoggingConfig, MetricsConfig};
use crate::counter::RequestCounter;
use crate::error::{Result, SimulatorError};

pub const REQUEST_DURATION_METRIC: &str = "http_request_duration_seconds";

/// Initialize structured logging. RUST_LOG wins over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.level.as_str().into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build a Prometheus recorder with the configured duration buckets, without installing it
pub fn build_recorder(
    config: &MetricsConfig,
) -> Result<metrics_exporter_prometheus::PrometheusRecorder> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_METRIC.to_string()),
            &config.request_duration_buckets,
        )
        .map_err(|e| SimulatorError::Metrics(e.to_string()))?;

    Ok(builder.build_recorder())
}

/// Install the global Prometheus recorder and return the handle used by /metrics
pub fn install_recorder(config: &MetricsConfig) -> Result<PrometheusHandle> {
    let recorder = build_recorder(config)?;
    let handle = recorder.handle();
    metrics::set_boxed_recorder(Box::new(recorder))
        .map_err(|e| SimulatorError::Metrics(e.to_string()))?;

    describe_metrics();
    gauge!("process_start_time_seconds", chrono::Utc::now().timestamp() as f64);

    info!(
        buckets = ?config.request_duration_buckets,
        "Prometheus recorder installed"
    );

    Ok(handle)
}

/// Initialize metrics descriptions
fn describe_metrics() {
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "Duration of HTTP requests served by the simulator"
    );
    describe_counter!(
        "http_requests_total",
        "Total number of HTTP requests served"
    );
    describe_counter!(
        "degradation_probe_outcomes_total",
        "Probe results by outcome (pong, not_even, collapsed)"
    );
    describe_gauge!(
        "degradation_request_counter",
        "Current value of the cumulative request counter"
    );
    describe_gauge!(
        "process_start_time_seconds",
        Unit::Seconds,
        "Start time of the process since unix epoch"
    );
    describe_gauge!(
        "process_uptime_seconds",
        Unit::Seconds,
        "Seconds since the process started"
    );
    describe_gauge!(
        "tokio_runtime_workers",
        "Number of worker threads in the runtime"
    );
    describe_gauge!(
        "tokio_runtime_alive_tasks",
        "Number of tasks currently alive in the runtime"
    );
}

/// Periodically refresh process and runtime gauges
pub fn spawn_runtime_metrics(counter: Arc<RequestCounter>, every: Duration) -> JoinHandle<()> {
    let started = tokio::time::Instant::now();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;

            let runtime = tokio::runtime::Handle::current().metrics();
            gauge!("process_uptime_seconds", started.elapsed().as_secs_f64());
            gauge!("degradation_request_counter", counter.get() as f64);
            gauge!("tokio_runtime_workers", runtime.num_workers() as f64);
            gauge!("tokio_runtime_alive_tasks", runtime.num_alive_tasks() as f64);

            debug!(request_counter = counter.get(), "Runtime metrics refreshed");
        }
    })
}

/// Record duration and count for every routed request
pub async fn track_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let route = match request.extensions().get::<MatchedPath>() {
        Some(path) => path.as_str().to_owned(),
        None => request.uri().path().to_owned(),
    };
    let method = request.method().to_string();

    let response = next.run(request).await;

    let labels = [
        ("method", method),
        ("route", route),
        ("status", response.status().as_u16().to_string()),
    ];
    histogram!(
        "http_request_duration_seconds",
        started.elapsed().as_secs_f64(),
        &labels
    );
    counter!("http_requests_total", 1, &labels);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{Key, Recorder};

    #[test]
    fn test_build_recorder_with_default_buckets() {
        let recorder = build_recorder(&MetricsConfig::default());
        assert!(recorder.is_ok());
    }

    #[test]
    fn test_empty_buckets_rejected() {
        let config = MetricsConfig {
            request_duration_buckets: Vec::new(),
            ..MetricsConfig::default()
        };
        let result = build_recorder(&config);
        assert!(matches!(result, Err(SimulatorError::Metrics(_))));
    }

    #[test]
    fn test_histogram_uses_configured_buckets() {
        let recorder = build_recorder(&MetricsConfig::default()).unwrap();
        let handle = recorder.handle();

        recorder
            .register_histogram(&Key::from_name(REQUEST_DURATION_METRIC))
            .record(1.5);

        let rendered = handle.render();
        assert!(rendered.contains("http_request_duration_seconds_bucket"));
        assert!(rendered.contains("le=\"0.1\""));
        assert!(rendered.contains("le=\"+Inf\""));
    }
}
