//! Breaker configuration.

use crate::breaker::state::BreakerState;
use crate::core::{BreakerError, BreakerResult};
use crate::probes::ProbeConfig;

use serde::Deserialize;
use std::time::Duration;

/// Fallback evaluation interval, applied per state when not configured.
pub const DEFAULT_EVALUATE_INTERVAL_MS: u64 = 60_000;

/// Default number of consecutive all-pass cycles required to leave
/// `Stabilizing`.
pub const DEFAULT_STABILIZE_AFTER_N_SUCCESSES: u32 = 2;

fn default_evaluate_interval_ms() -> u64 {
    DEFAULT_EVALUATE_INTERVAL_MS
}

fn default_stabilize_after_n_successes() -> u32 {
    DEFAULT_STABILIZE_AFTER_N_SUCCESSES
}

/// Validated configuration for a [`CircuitBreaker`].
///
/// Decodable from untyped input (see [`BreakerConfig::from_value`]) with
/// camelCase field names, or assembled programmatically with the `with_*`
/// builder methods. Every field has a default, so `{}` is a valid input:
/// an engine with zero probes always evaluates all-pass and stays nominal.
///
/// [`CircuitBreaker`]: crate::breaker::CircuitBreaker
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BreakerConfig {
    /// Ordered probe configurations.
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,

    /// Polling interval while `Nominal`, in milliseconds.
    #[serde(default = "default_evaluate_interval_ms")]
    pub nominal_evaluate_interval_ms: u64,

    /// Polling interval while `Tripped`, in milliseconds.
    #[serde(default = "default_evaluate_interval_ms")]
    pub tripped_evaluate_interval_ms: u64,

    /// Polling interval while `Stabilizing`, in milliseconds.
    #[serde(default = "default_evaluate_interval_ms")]
    pub stabilizing_evaluate_interval_ms: u64,

    /// Consecutive all-pass cycles required to leave `Stabilizing`.
    #[serde(default = "default_stabilize_after_n_successes")]
    pub stabilize_after_n_successes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            probes: Vec::new(),
            nominal_evaluate_interval_ms: DEFAULT_EVALUATE_INTERVAL_MS,
            tripped_evaluate_interval_ms: DEFAULT_EVALUATE_INTERVAL_MS,
            stabilizing_evaluate_interval_ms: DEFAULT_EVALUATE_INTERVAL_MS,
            stabilize_after_n_successes: DEFAULT_STABILIZE_AFTER_N_SUCCESSES,
        }
    }
}

impl BreakerConfig {
    /// Creates a configuration with default values and no probes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes and validates a configuration from untyped input.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Parse`] when the input does not decode
    /// (wrong types, unknown fields, unsupported probe tags) and
    /// [`BreakerError::InvalidField`] when a decoded value is out of range.
    pub fn from_value(value: serde_json::Value) -> BreakerResult<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Appends a probe configuration.
    pub fn with_probe(mut self, probe: ProbeConfig) -> Self {
        self.probes.push(probe);
        self
    }

    /// Sets the nominal-state polling interval in milliseconds.
    pub fn with_nominal_evaluate_interval_ms(mut self, ms: u64) -> Self {
        self.nominal_evaluate_interval_ms = ms;
        self
    }

    /// Sets the tripped-state polling interval in milliseconds.
    pub fn with_tripped_evaluate_interval_ms(mut self, ms: u64) -> Self {
        self.tripped_evaluate_interval_ms = ms;
        self
    }

    /// Sets the stabilizing-state polling interval in milliseconds.
    pub fn with_stabilizing_evaluate_interval_ms(mut self, ms: u64) -> Self {
        self.stabilizing_evaluate_interval_ms = ms;
        self
    }

    /// Sets the number of consecutive successes required to stabilize.
    pub fn with_stabilize_after_n_successes(mut self, n: u32) -> Self {
        self.stabilize_after_n_successes = n;
        self
    }

    /// Performs semantic validation on a decoded configuration.
    ///
    /// Checks value ranges here; syntactic validation is serde's job.
    pub fn validate(&self) -> BreakerResult<()> {
        let intervals = [
            ("nominalEvaluateIntervalMs", self.nominal_evaluate_interval_ms),
            ("trippedEvaluateIntervalMs", self.tripped_evaluate_interval_ms),
            (
                "stabilizingEvaluateIntervalMs",
                self.stabilizing_evaluate_interval_ms,
            ),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(BreakerError::invalid_field(
                    field,
                    "must be a positive duration in milliseconds",
                ));
            }
        }

        if self.stabilize_after_n_successes == 0 {
            return Err(BreakerError::invalid_field(
                "stabilizeAfterNSuccesses",
                "must be at least 1",
            ));
        }

        for (idx, probe) in self.probes.iter().enumerate() {
            probe.validate().map_err(|err| match err {
                BreakerError::InvalidField { field, reason } => BreakerError::InvalidField {
                    field: format!("probes[{idx}].{field}"),
                    reason,
                },
                other => other,
            })?;
        }

        Ok(())
    }
}

/// Polling cadence per aggregate state.
///
/// The interval table is the breaker's entire backoff policy: a state
/// transition immediately adopts the new state's cadence.
#[derive(Debug, Clone)]
pub struct EvaluateIntervals {
    /// Interval between cycles while `Nominal`.
    pub nominal: Duration,
    /// Interval between cycles while `Stabilizing`.
    pub stabilizing: Duration,
    /// Interval between cycles while `Tripped`.
    pub tripped: Duration,
}

impl Default for EvaluateIntervals {
    fn default() -> Self {
        let fallback = Duration::from_millis(DEFAULT_EVALUATE_INTERVAL_MS);
        Self {
            nominal: fallback,
            stabilizing: fallback,
            tripped: fallback,
        }
    }
}

impl EvaluateIntervals {
    /// Creates an interval table with the default cadence for every state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nominal-state interval.
    pub fn with_nominal(mut self, interval: Duration) -> Self {
        self.nominal = interval;
        self
    }

    /// Sets the stabilizing-state interval.
    pub fn with_stabilizing(mut self, interval: Duration) -> Self {
        self.stabilizing = interval;
        self
    }

    /// Sets the tripped-state interval.
    pub fn with_tripped(mut self, interval: Duration) -> Self {
        self.tripped = interval;
        self
    }

    /// Returns the polling interval for the given state.
    pub fn for_state(&self, state: BreakerState) -> Duration {
        match state {
            BreakerState::Nominal => self.nominal,
            BreakerState::Stabilizing => self.stabilizing,
            BreakerState::Tripped => self.tripped,
        }
    }
}

impl From<&BreakerConfig> for EvaluateIntervals {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            nominal: Duration::from_millis(config.nominal_evaluate_interval_ms),
            stabilizing: Duration::from_millis(config.stabilizing_evaluate_interval_ms),
            tripped: Duration::from_millis(config.tripped_evaluate_interval_ms),
        }
    }
}
