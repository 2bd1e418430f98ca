//! The circuit breaker itself.
//!
//! Split into three layers:
//!
//! - [`state`] - the aggregate state machine (pure transition logic)
//! - [`config`] - decoded configuration and the per-state interval table
//! - [`engine`] - the periodic evaluation loop driving it all

pub mod config;
pub mod engine;
pub mod state;

// Re-exports
pub use config::{
    BreakerConfig, EvaluateIntervals, DEFAULT_EVALUATE_INTERVAL_MS,
    DEFAULT_STABILIZE_AFTER_N_SUCCESSES,
};
pub use engine::{CircuitBreaker, CircuitBreakerBuilder};
pub use state::BreakerState;
