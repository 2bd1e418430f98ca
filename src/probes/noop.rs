//! Constant-verdict probe.
//!
//! Reports a fixed configured verdict and performs no I/O. Useful in
//! tests and for wiring a probe slot as unconditionally healthy or
//! unhealthy.

use crate::core::Probe;

use async_trait::async_trait;
use serde::Deserialize;

/// Configuration for a [`NoopProbe`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoopProbeConfig {
    /// The constant verdict the probe reports.
    pub return_constant_value: bool,
}

/// A probe with a fixed verdict and a no-op `check`.
#[derive(Debug)]
pub struct NoopProbe {
    config: NoopProbeConfig,
}

impl NoopProbe {
    /// Creates a probe from its configuration.
    pub fn new(config: NoopProbeConfig) -> Self {
        Self { config }
    }

    /// Creates a probe that always reports healthy.
    pub fn passing() -> Self {
        Self::new(NoopProbeConfig {
            return_constant_value: true,
        })
    }

    /// Creates a probe that always reports unhealthy.
    pub fn failing() -> Self {
        Self::new(NoopProbeConfig {
            return_constant_value: false,
        })
    }
}

#[async_trait]
impl Probe for NoopProbe {
    fn name(&self) -> &str {
        "noop"
    }

    async fn check(&self) {}

    fn value(&self) -> bool {
        self.config.return_constant_value
    }
}
