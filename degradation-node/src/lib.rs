//! Degradation Node Library
//!
//! A synthetic backend that gets slower, then flaky, then collapses as its
//! cumulative request count grows. Load-testing harnesses point at it to
//! observe overload symptoms without a real backend.

pub mod config;
pub mod counter;
pub mod degradation;
pub mod error;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use config::{DegradationConfig, SimulatorConfig};
pub use counter::RequestCounter;
pub use degradation::{DegradationPolicy, DegradationTier, ProbeDecision};
pub use error::{ProbeFailure, SimulatorError};
pub use server::{create_router, SimulatorState};
