//! # breakwatch
//!
//! A health-aggregation circuit breaker: a set of asynchronous probes is
//! polled on a per-state cadence and folded into a single tri-state
//! verdict with recovery hysteresis.
//!
//! ## Features
//!
//! - **Tri-state aggregate**: `Nominal`, `Stabilizing`, and `Tripped`,
//!   tripping within one cycle and recovering only after a configured
//!   number of consecutive clean cycles
//! - **Pluggable probes**: Prometheus threshold queries, Kafka
//!   consumer-group lag, constant no-op probes, and anything implementing
//!   the [`Probe`] trait
//! - **Per-state cadence**: separate polling intervals while nominal,
//!   stabilizing, and tripped
//! - **Change notifications**: subscribers receive each committed state
//!   transition, at most one per cycle
//! - **Untyped configuration**: decode a whole breaker from JSON-shaped
//!   input with full validation up front
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use breakwatch::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let breaker = CircuitBreaker::from_value(json!({
//!         "probes": [
//!             {
//!                 "type": "kafkaConsumerLag",
//!                 "consumerGroupName": "replication",
//!                 "wantTotalLagLessThan": 10_000,
//!                 "averagedOverInterval": "5m",
//!                 "prometheus": { "endpoint": "http://prometheus:9090" },
//!             },
//!         ],
//!         "nominalEvaluateIntervalMs": 60_000,
//!         "trippedEvaluateIntervalMs": 10_000,
//!     }))?;
//!
//!     let mut events = breaker.subscribe();
//!     breaker.start();
//!
//!     while let Ok(state) = events.recv().await {
//!         if state.is_tripped() {
//!             // pause the work this breaker gates
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into three layers:
//!
//! - [`core`]: the [`Probe`] and [`MetricSource`] traits and the error type
//! - [`probes`]: probe implementations and the configuration factory
//! - [`breaker`]: the state machine, configuration, and evaluation engine

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod breaker;
pub mod core;
pub mod probes;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, CircuitBreakerBuilder};
pub use core::{BreakerError, BreakerResult, MetricSource, Probe};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::breaker::{
        BreakerConfig, BreakerState, CircuitBreaker, CircuitBreakerBuilder, EvaluateIntervals,
    };
    pub use crate::core::{BoxedProbe, BreakerError, BreakerResult, MetricSource, Probe};
    pub use crate::probes::{
        KafkaConsumerLagProbe, NoopProbe, ProbeConfig, PrometheusQueryProbe,
    };
}
