//! Core types and traits for the breakwatch library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`traits`] - The `Probe` and `MetricSource` traits
//! - [`error`] - Structured error types

pub mod error;
pub mod traits;

// Re-export commonly used types at the core level
pub use error::{BreakerError, BreakerResult};
pub use traits::{ArcMetricSource, BoxedProbe, MetricSource, Probe};
