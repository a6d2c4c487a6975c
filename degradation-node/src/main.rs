use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use degradation_node::config::SimulatorConfig;
use degradation_node::degradation::DegradationPolicy;
use degradation_node::server::{start_server, SimulatorState};
use degradation_node::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("DEGRADATION_CONFIG").unwrap_or_else(|_| "config/default".to_string());

    // Load configuration from file if available, otherwise defaults plus DEGRADATION_* env
    let (mut config, load_error) =
        SimulatorConfig::load(&config_path).context("Invalid environment configuration")?;
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    // Initialize structured logging
    telemetry::init_logging(&config.logging);

    info!("Starting Degradation Node v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => info!(path = %config_path, "Configuration loaded"),
        Some(e) => warn!(
            path = %config_path,
            error = %e,
            "Failed to load config file, using defaults and environment"
        ),
    }

    config.validate().context("Invalid configuration")?;
    let listen_addr = config.listen_addr()?;

    let policy = DegradationPolicy::from_config(&config.degradation);

    let metrics_handle = if config.metrics.enabled {
        let handle = telemetry::install_recorder(&config.metrics)
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        info!("Metrics disabled");
        None
    };

    let state = SimulatorState::new(policy, metrics_handle);

    if config.metrics.enabled {
        telemetry::spawn_runtime_metrics(
            Arc::clone(&state.counter),
            config.runtime_refresh_interval(),
        );
    }

    start_server(listen_addr, state).await
}
