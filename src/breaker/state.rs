//! Aggregate breaker state and the transition rule.
//!
//! ## States
//!
//! - **Nominal**: all probes healthy; downstream traffic flows normally.
//! - **Tripped**: at least one probe failed its verdict; callers gate.
//! - **Stabilizing**: probes pass again after a trip, but not yet for long
//!   enough to be trusted.
//!
//! ## State Transitions
//!
//! ```text
//! any state   → Tripped:     any probe verdict false (no hysteresis down)
//! Tripped     → Stabilizing: all verdicts true
//! Stabilizing → Nominal:     all verdicts true for N consecutive cycles
//! Stabilizing → Tripped:     any verdict false (progress resets to zero)
//! ```
//!
//! Recovery is deliberately slower than tripping: falsely reporting
//! "healthy" is costlier than falsely reporting "unhealthy".

use serde::{Deserialize, Serialize};
use std::fmt;

/// The aggregate tri-state summary of engine health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    /// All probes pass; the breaker reports healthy.
    Nominal,
    /// Probes pass after a trip, pending sustained success.
    Stabilizing,
    /// At least one probe failed; the breaker reports unhealthy.
    Tripped,
}

impl BreakerState {
    /// Returns `true` if the state is `Nominal`.
    pub fn is_nominal(&self) -> bool {
        matches!(self, Self::Nominal)
    }

    /// Returns `true` if the state is `Stabilizing`.
    pub fn is_stabilizing(&self) -> bool {
        matches!(self, Self::Stabilizing)
    }

    /// Returns `true` if the state is `Tripped`.
    pub fn is_tripped(&self) -> bool {
        matches!(self, Self::Tripped)
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Stabilizing => "stabilizing",
            Self::Tripped => "tripped",
        }
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::Nominal
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Applies one evaluation cycle's transition.
///
/// The next state is a pure function of the state and stabilizing counter
/// entering the cycle, this cycle's all-probes-pass verdict, and the
/// configured stabilize threshold. Returns the new `(state, counter)`.
pub(crate) fn transition(
    state: BreakerState,
    counter: u32,
    all_ok: bool,
    stabilize_threshold: u32,
) -> (BreakerState, u32) {
    if !all_ok {
        return (BreakerState::Tripped, 0);
    }

    match state {
        BreakerState::Nominal => (BreakerState::Nominal, counter),
        BreakerState::Tripped => (BreakerState::Stabilizing, 1),
        BreakerState::Stabilizing => {
            let counter = counter + 1;
            if counter >= stabilize_threshold {
                (BreakerState::Nominal, counter)
            } else {
                (BreakerState::Stabilizing, counter)
            }
        }
    }
}
