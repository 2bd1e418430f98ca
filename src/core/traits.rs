//! Core traits for the breakwatch library.
//!
//! This module defines the `Probe` trait that all health probes implement,
//! and the `MetricSource` trait that marks the boundary to the external
//! time-series backend.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A unit of health observation.
///
/// A probe periodically refreshes an internal observation and reports a
/// boolean verdict derived from the most recent successful observation.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; the engine drives probes from
///   a spawned task.
/// - `check` is the only side-effecting operation. It is infallible by
///   signature: a transient fetch failure must be absorbed (logged, stale
///   observation retained), never bubbled up. A temporary backend outage
///   therefore does not by itself trip the breaker.
/// - `value` must be a cheap, synchronous read that never performs I/O.
///   Probes that refresh state from `&self` use interior mutability.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use breakwatch::core::Probe;
/// use async_trait::async_trait;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// #[derive(Debug)]
/// struct DiskFreeProbe {
///     ok: AtomicBool,
/// }
///
/// #[async_trait]
/// impl Probe for DiskFreeProbe {
///     fn name(&self) -> &str {
///         "diskFree"
///     }
///
///     async fn check(&self) {
///         // Refresh the observation; on failure, leave `ok` untouched.
///     }
///
///     fn value(&self) -> bool {
///         self.ok.load(Ordering::Relaxed)
///     }
/// }
/// ```
#[async_trait]
pub trait Probe: Send + Sync + Debug {
    /// Returns the stable identifier of this probe kind, e.g. `"noop"`.
    fn name(&self) -> &str;

    /// Refreshes the internal observation.
    ///
    /// Must complete even when the underlying fetch fails; on failure the
    /// previous observation is retained so `value` stays computable.
    async fn check(&self);

    /// Returns the verdict derived from the last completed observation.
    ///
    /// Never triggers I/O.
    fn value(&self) -> bool;
}

/// The boundary to an external metric backend.
///
/// A source is constructed around a fixed query expression and returns a
/// single scalar per call, or `None` for "no data". Transport and backend
/// errors map to `None` as well: the probe layer treats both identically
/// (retain the stale observation, log).
#[async_trait]
pub trait MetricSource: Send + Sync + Debug {
    /// Evaluates the source's query and returns the resulting scalar.
    async fn instant_query(&self) -> Option<f64>;
}

/// A boxed probe for type-erased, exclusively owned storage.
pub type BoxedProbe = Box<dyn Probe>;

/// An arc-wrapped metric source for read-only sharing across probes.
pub type ArcMetricSource = Arc<dyn MetricSource>;
