//! Mock probe for testing.
//!
//! A controllable probe used to exercise the evaluation engine without a
//! metric backend. The engine takes exclusive ownership of its probes, so
//! control goes through a cloneable [`MockProbeHandle`] obtained before
//! handing the probe over.
//!
//! # Examples
//!
//! ```rust,ignore
//! use breakwatch::probes::MockProbe;
//!
//! let probe = MockProbe::passing();
//! let handle = probe.handle();
//!
//! // ... hand `probe` to a CircuitBreaker ...
//!
//! handle.set_value(false); // next cycle observes a failing verdict
//! assert_eq!(handle.check_count(), 0);
//! ```

use crate::core::Probe;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockProbeState {
    verdict: AtomicBool,
    check_count: AtomicU64,
}

/// A probe whose verdict is set by the test driving it.
#[derive(Debug)]
pub struct MockProbe {
    name: String,
    latency: Option<Duration>,
    state: Arc<MockProbeState>,
}

impl MockProbe {
    /// Creates a mock probe with the given initial verdict.
    pub fn new(verdict: bool) -> Self {
        let state = MockProbeState {
            verdict: AtomicBool::new(verdict),
            check_count: AtomicU64::new(0),
        };
        Self {
            name: "mock".to_string(),
            latency: None,
            state: Arc::new(state),
        }
    }

    /// Creates a mock probe that starts healthy.
    pub fn passing() -> Self {
        Self::new(true)
    }

    /// Creates a mock probe that starts unhealthy.
    pub fn failing() -> Self {
        Self::new(false)
    }

    /// Sets the name of this probe instance.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets a simulated latency for `check`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Returns a handle controlling this probe after ownership transfer.
    pub fn handle(&self) -> MockProbeHandle {
        MockProbeHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::passing()
    }
}

#[async_trait]
impl Probe for MockProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.state.check_count.fetch_add(1, Ordering::Relaxed);
    }

    fn value(&self) -> bool {
        self.state.verdict.load(Ordering::Relaxed)
    }
}

/// Control handle for a [`MockProbe`] owned elsewhere.
#[derive(Debug, Clone)]
pub struct MockProbeHandle {
    state: Arc<MockProbeState>,
}

impl MockProbeHandle {
    /// Sets the verdict the probe reports from now on.
    pub fn set_value(&self, verdict: bool) {
        self.state.verdict.store(verdict, Ordering::Relaxed);
    }

    /// Returns the number of completed `check` calls.
    pub fn check_count(&self) -> u64 {
        self.state.check_count.load(Ordering::Relaxed)
    }
}
