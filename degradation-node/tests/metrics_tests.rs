//! Prometheus exposition tests
//!
//! Kept in their own binary: the recorder is process-global, so installing
//! it here cannot leak into the other suites.

use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower::ServiceExt;

use degradation_node::config::MetricsConfig;
use degradation_node::counter::RequestCounter;
use degradation_node::degradation::DegradationPolicy;
use degradation_node::server::{create_router, SimulatorState};
use degradation_node::telemetry;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder once for the whole binary
fn metrics_handle() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| telemetry::install_recorder(&MetricsConfig::default()).unwrap())
        .clone()
}

async fn send(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Value of the sample whose name and labels are exactly `series`
fn sample(rendered: &str, series: &str) -> Option<f64> {
    rendered.lines().find_map(|line| {
        line.strip_prefix(series)?
            .strip_prefix(' ')?
            .trim()
            .parse()
            .ok()
    })
}

#[tokio::test]
async fn test_metrics_expose_request_durations_and_outcomes() {
    // 1 passes, 2 fails parity, 3 onward collapses
    let policy = DegradationPolicy::new(Vec::new(), Duration::ZERO, 3, 2);
    let app = create_router(SimulatorState::new(policy, Some(metrics_handle())));

    assert_eq!(send(&app, "/ping").await.1, "pong");
    assert_eq!(send(&app, "/ping").await.1, "KO - Not even request: 2");
    assert_eq!(send(&app, "/ping").await.1, "KO - Server collapsed: 3");
    assert_eq!(send(&app, "/ping").await.1, "KO - Server collapsed: 4");

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let rendered = String::from_utf8(bytes.to_vec()).unwrap();

    assert_eq!(
        sample(&rendered, "degradation_probe_outcomes_total{outcome=\"pong\"}"),
        Some(1.0)
    );
    assert_eq!(
        sample(&rendered, "degradation_probe_outcomes_total{outcome=\"not_even\"}"),
        Some(1.0)
    );
    assert_eq!(
        sample(&rendered, "degradation_probe_outcomes_total{outcome=\"collapsed\"}"),
        Some(2.0)
    );

    // Six configured buckets plus +Inf
    let ok_bucket = "http_request_duration_seconds_bucket{method=\"GET\",route=\"/ping\",status=\"200\",";
    let bucket_lines = rendered
        .lines()
        .filter(|line| line.starts_with(ok_bucket))
        .count();
    assert_eq!(bucket_lines, 7, "rendered:\n{}", rendered);
    assert_eq!(
        sample(&rendered, &format!("{}le=\"0.1\"}}", ok_bucket)),
        Some(1.0)
    );
    assert_eq!(
        sample(&rendered, &format!("{}le=\"+Inf\"}}", ok_bucket)),
        Some(1.0)
    );

    assert_eq!(
        sample(
            &rendered,
            "http_request_duration_seconds_count{method=\"GET\",route=\"/ping\",status=\"500\"}"
        ),
        Some(3.0)
    );
    assert_eq!(
        sample(
            &rendered,
            "http_requests_total{method=\"GET\",route=\"/ping\",status=\"500\"}"
        ),
        Some(3.0)
    );
    assert!(rendered.contains("# TYPE http_request_duration_seconds histogram"));
    assert!(rendered.contains("process_start_time_seconds"));
}

#[tokio::test(start_paused = true)]
async fn test_runtime_gauges_follow_request_counter() {
    let handle = metrics_handle();
    let counter = Arc::new(RequestCounter::new());
    for _ in 0..3 {
        counter.increment();
    }

    let task = telemetry::spawn_runtime_metrics(Arc::clone(&counter), Duration::from_secs(5));

    // First tick fires immediately
    tokio::time::sleep(Duration::from_millis(10)).await;
    let rendered = handle.render();
    assert_eq!(sample(&rendered, "degradation_request_counter"), Some(3.0));
    assert!(sample(&rendered, "tokio_runtime_workers").is_some());
    assert!(sample(&rendered, "process_uptime_seconds").is_some());

    for _ in 0..4 {
        counter.increment();
    }
    // Not refreshed until the next interval
    assert_eq!(
        sample(&handle.render(), "degradation_request_counter"),
        Some(3.0)
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    let rendered = handle.render();
    assert_eq!(sample(&rendered, "degradation_request_counter"), Some(7.0));
    assert!(sample(&rendered, "process_uptime_seconds").unwrap() >= 5.0);

    task.abort();
}
