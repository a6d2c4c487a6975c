use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors that can occur in the degradation node library
#[derive(Error, Debug)]
pub enum SimulatorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics recorder error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Fault inside the simulator itself, never a modeled condition
    #[error("Internal simulator error: {0}")]
    Internal(String),
}

/// Result type alias using SimulatorError
pub type Result<T> = std::result::Result<T, SimulatorError>;

impl From<config::ConfigError> for SimulatorError {
    fn from(err: config::ConfigError) -> Self {
        SimulatorError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SimulatorError {
    fn from(err: toml::ser::Error) -> Self {
        SimulatorError::Config(err.to_string())
    }
}

impl IntoResponse for SimulatorError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Synthetic failures injected by the degradation policy.
///
/// The rendered messages are part of the HTTP contract: load-test checks
/// match on "collapsed" and "even".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Counter reached the collapse threshold
    #[error("KO - Server collapsed: {0}")]
    Collapsed(u64),

    /// Counter is in the parity band and even
    #[error("KO - Not even request: {0}")]
    NotEven(u64),
}

impl ProbeFailure {
    /// Label used for the outcome metric
    pub fn label(&self) -> &'static str {
        match self {
            ProbeFailure::Collapsed(_) => "collapsed",
            ProbeFailure::NotEven(_) => "not_even",
        }
    }
}

impl IntoResponse for ProbeFailure {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimulatorError::Config("invalid port".to_string());
        assert_eq!(err.to_string(), "Configuration error: invalid port");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: SimulatorError = io_err.into();
        assert!(matches!(err, SimulatorError::Io(_)));
    }

    #[test]
    fn test_probe_failure_messages() {
        assert_eq!(
            ProbeFailure::Collapsed(1000).to_string(),
            "KO - Server collapsed: 1000"
        );
        assert_eq!(
            ProbeFailure::NotEven(902).to_string(),
            "KO - Not even request: 902"
        );
    }

    #[test]
    fn test_internal_error_is_distinct_from_probe_failures() {
        let body = SimulatorError::Internal("tier lookup panicked".to_string()).to_string();
        assert!(body.starts_with("Internal simulator error"));
        assert!(!body.contains("collapsed"));
        assert!(!body.contains("even"));
    }

    #[test]
    fn test_failures_render_as_500() {
        let response = ProbeFailure::Collapsed(1200).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = SimulatorError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
