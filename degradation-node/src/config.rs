use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, SimulatorError};

/// Main configuration for the degradation node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Listener configuration
    pub network: NetworkConfig,
    /// Degradation policy: delay tiers and failure thresholds
    pub degradation: DegradationConfig,
    /// Metrics and monitoring
    pub metrics: MetricsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface to bind (0.0.0.0 for all interfaces)
    pub bind_address: String,
    /// Listening port
    pub port: u16,
}

/// One row of the delay table: counters up to and including `up_to` wait `delay_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub up_to: u64,
    pub delay_ms: u64,
}

/// Degradation policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    /// Delay applied once the counter exceeds every tier bound
    pub terminal_delay_ms: u64,
    /// Counter value from which every probe fails
    pub collapse_threshold: u64,
    /// Counter value from which even-numbered probes fail
    pub parity_failure_threshold: u64,
    /// Delay tiers in ascending `up_to` order
    pub tiers: Vec<TierConfig>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection and the /metrics endpoint
    pub enabled: bool,
    /// Histogram buckets (seconds) for request durations
    pub request_duration_buckets: Vec<f64>,
    /// Refresh interval for process and runtime gauges
    pub runtime_refresh_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    /// Output format: "pretty" or "json"
    pub format: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            terminal_delay_ms: 5000,
            collapse_threshold: 1000,
            parity_failure_threshold: 900,
            tiers: vec![
                TierConfig { up_to: 500, delay_ms: 0 },
                TierConfig { up_to: 600, delay_ms: 1000 },
                TierConfig { up_to: 700, delay_ms: 1500 },
                TierConfig { up_to: 800, delay_ms: 2000 },
                TierConfig { up_to: 900, delay_ms: 3000 },
            ],
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_duration_buckets: vec![0.1, 1.0, 2.0, 3.0, 4.0, 5.0],
            runtime_refresh_seconds: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "degradation_node=info,tower_http=info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("DEGRADATION")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl SimulatorConfig {
    /// Load configuration from file, layering DEGRADATION_* environment variables on top.
    ///
    /// Nested keys use a double underscore, e.g. `DEGRADATION_NETWORK__PORT=9090`.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Defaults with only the DEGRADATION_* environment layer applied
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load from `path`, or from defaults plus the environment when the file can't be read.
    ///
    /// The file error is handed back so the caller can report it once logging is up.
    pub fn load(path: &str) -> Result<(Self, Option<SimulatorError>)> {
        match Self::from_file(path) {
            Ok(config) => Ok((config, None)),
            Err(e) => Ok((Self::from_env()?, Some(e))),
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Apply the conventional container overrides (PORT, BIND_ADDRESS, RUST_LOG)
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.network.port = port
                .parse()
                .map_err(|e| SimulatorError::Config(format!("Invalid PORT: {}", e)))?;
        }

        if let Ok(bind_address) = std::env::var("BIND_ADDRESS") {
            self.network.bind_address = bind_address;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.level = log_level;
        }

        Ok(())
    }

    /// Socket address the HTTP listener binds to
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.network.bind_address, self.network.port)
            .parse()
            .map_err(|e| {
                SimulatorError::Config(format!(
                    "Invalid listen address {}:{}: {}",
                    self.network.bind_address, self.network.port, e
                ))
            })
    }

    /// Refresh interval for process and runtime gauges
    pub fn runtime_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.metrics.runtime_refresh_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.network.port == 0 {
            return Err(SimulatorError::Config("Port cannot be 0".to_string()));
        }
        self.listen_addr()?;

        let degradation = &self.degradation;
        for pair in degradation.tiers.windows(2) {
            if pair[1].up_to <= pair[0].up_to {
                return Err(SimulatorError::Config(format!(
                    "Degradation tiers must have strictly ascending bounds ({} follows {})",
                    pair[1].up_to, pair[0].up_to
                )));
            }
        }

        if degradation.collapse_threshold == 0 {
            return Err(SimulatorError::Config(
                "Collapse threshold cannot be 0".to_string(),
            ));
        }

        if self.metrics.enabled {
            let buckets = &self.metrics.request_duration_buckets;
            if buckets.is_empty() {
                return Err(SimulatorError::Config(
                    "Request duration buckets cannot be empty".to_string(),
                ));
            }
            if buckets.iter().any(|b| !b.is_finite() || *b <= 0.0)
                || buckets.windows(2).any(|pair| pair[1] <= pair[0])
            {
                return Err(SimulatorError::Config(
                    "Request duration buckets must be positive and strictly ascending".to_string(),
                ));
            }
            if self.metrics.runtime_refresh_seconds == 0 {
                return Err(SimulatorError::Config(
                    "Runtime refresh interval cannot be 0".to_string(),
                ));
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(SimulatorError::Config(format!(
                    "Unknown logging format: {}",
                    other
                )))
            }
        }

        Ok(())
    }
}
