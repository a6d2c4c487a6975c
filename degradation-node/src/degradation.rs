//! Degradation policy
//!
//! Maps the cumulative request count captured by a probe to an artificial
//! delay and an artificial outcome. The mapping is a pure function of the
//! counter value and the static tables, so identical counter values always
//! produce identical decisions.

use std::time::Duration;
use tracing::info;

use crate::config::DegradationConfig;
use crate::error::ProbeFailure;

/// Counters up to and including `up_to` are delayed by `delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradationTier {
    pub up_to: u64,
    pub delay: Duration,
}

/// What a single probe must do for its captured counter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeDecision {
    /// Counter value captured by the probe's own increment
    pub counter: u64,
    /// Artificial latency to apply before responding
    pub delay: Duration,
    /// Synthetic outcome, evaluated from the same counter value
    pub outcome: Result<(), ProbeFailure>,
}

impl ProbeDecision {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Label used for the outcome metric
    pub fn outcome_label(&self) -> &'static str {
        match &self.outcome {
            Ok(()) => "pong",
            Err(failure) => failure.label(),
        }
    }
}

/// Immutable tier table plus failure thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradationPolicy {
    tiers: Vec<DegradationTier>,
    terminal_delay: Duration,
    collapse_threshold: u64,
    parity_failure_threshold: u64,
}

impl DegradationPolicy {
    /// Build a policy. Tiers are sorted by bound so lookup can stop at the first match.
    pub fn new(
        mut tiers: Vec<DegradationTier>,
        terminal_delay: Duration,
        collapse_threshold: u64,
        parity_failure_threshold: u64,
    ) -> Self {
        tiers.sort_by_key(|tier| tier.up_to);
        Self {
            tiers,
            terminal_delay,
            collapse_threshold,
            parity_failure_threshold,
        }
    }

    /// Build the policy described by configuration
    pub fn from_config(config: &DegradationConfig) -> Self {
        let policy = Self::build(config);

        info!(
            tiers = policy.tiers.len(),
            terminal_delay_ms = config.terminal_delay_ms,
            collapse_threshold = policy.collapse_threshold,
            parity_failure_threshold = policy.parity_failure_threshold,
            "Degradation policy configured"
        );

        policy
    }

    fn build(config: &DegradationConfig) -> Self {
        let tiers = config
            .tiers
            .iter()
            .map(|tier| DegradationTier {
                up_to: tier.up_to,
                delay: Duration::from_millis(tier.delay_ms),
            })
            .collect();

        Self::new(
            tiers,
            Duration::from_millis(config.terminal_delay_ms),
            config.collapse_threshold,
            config.parity_failure_threshold,
        )
    }

    pub fn tiers(&self) -> &[DegradationTier] {
        &self.tiers
    }

    pub fn collapse_threshold(&self) -> u64 {
        self.collapse_threshold
    }

    pub fn parity_failure_threshold(&self) -> u64 {
        self.parity_failure_threshold
    }

    /// Delay of the first tier whose bound is >= `counter`, else the terminal delay
    pub fn delay_for(&self, counter: u64) -> Duration {
        self.tiers
            .iter()
            .find(|tier| counter <= tier.up_to)
            .map(|tier| tier.delay)
            .unwrap_or(self.terminal_delay)
    }

    /// Outcome for `counter`. Collapse takes precedence over parity injection.
    pub fn outcome_for(&self, counter: u64) -> Result<(), ProbeFailure> {
        if counter >= self.collapse_threshold {
            Err(ProbeFailure::Collapsed(counter))
        } else if counter >= self.parity_failure_threshold && counter % 2 == 0 {
            Err(ProbeFailure::NotEven(counter))
        } else {
            Ok(())
        }
    }

    pub fn decide(&self, counter: u64) -> ProbeDecision {
        ProbeDecision {
            counter,
            delay: self.delay_for(counter),
            outcome: self.outcome_for(counter),
        }
    }
}

impl Default for DegradationPolicy {
    fn default() -> Self {
        Self::build(&DegradationConfig::default())
    }
}
