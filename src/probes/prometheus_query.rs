//! Threshold probe over a Prometheus query.
//!
//! Fetches a scalar from a metric source on every `check` and reports
//! healthy while the last observed scalar stays below the configured
//! threshold. A failed or empty fetch keeps the previous observation, so
//! a metric-backend outage alone never flips the verdict.

use crate::core::{ArcMetricSource, BreakerError, BreakerResult, Probe};
use crate::probes::prometheus::{PrometheusClient, PrometheusClientConfig};
use crate::probes::validate_interval_shorthand;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, RwLock};

/// Configuration for a [`PrometheusQueryProbe`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusQueryProbeConfig {
    /// Endpoint of the Prometheus server to query.
    pub prometheus: PrometheusClientConfig,

    /// Raw query expression; it is wrapped in `sum(...)` by the client.
    pub query: String,

    /// The probe reports healthy while the observed scalar is below this.
    pub threshold: f64,

    /// Optional averaging window, shorthand like `5m` (s/m/h/d units).
    #[serde(default)]
    pub averaged_over_interval: Option<String>,
}

impl PrometheusQueryProbeConfig {
    /// Validates value ranges and the interval shorthand.
    pub fn validate(&self) -> BreakerResult<()> {
        if self.query.is_empty() {
            return Err(BreakerError::invalid_field("query", "must not be empty"));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(BreakerError::invalid_field(
                "threshold",
                "must be a positive number",
            ));
        }
        if let Some(interval) = &self.averaged_over_interval {
            validate_interval_shorthand("averagedOverInterval", interval)?;
        }
        self.prometheus.validate()
    }
}

/// A probe comparing a fetched scalar against a configured bound.
#[derive(Debug)]
pub struct PrometheusQueryProbe {
    source: ArcMetricSource,
    threshold: f64,
    observed: RwLock<f64>,
}

impl PrometheusQueryProbe {
    /// Creates a probe from its configuration, building a real
    /// [`PrometheusClient`] as the metric source.
    pub fn new(config: PrometheusQueryProbeConfig) -> BreakerResult<Self> {
        config.validate()?;
        let client = PrometheusClient::new(
            &config.prometheus,
            &config.query,
            config.averaged_over_interval.as_deref(),
        )?;
        Ok(Self::with_source(Arc::new(client), config.threshold))
    }

    /// Creates a probe around an injected metric source.
    ///
    /// The observed value starts at 0.0, so a probe with a positive
    /// threshold reports healthy until the first successful fetch says
    /// otherwise.
    pub fn with_source(source: ArcMetricSource, threshold: f64) -> Self {
        Self {
            source,
            threshold,
            observed: RwLock::new(0.0),
        }
    }

    /// Returns the last successfully observed scalar.
    pub fn observed(&self) -> f64 {
        *self
            .observed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Probe for PrometheusQueryProbe {
    fn name(&self) -> &str {
        "prometheusQuery"
    }

    async fn check(&self) {
        // The source logs its own fetch failures; "no data" keeps the
        // previous observation.
        let Some(scalar) = self.source.instant_query().await else {
            return;
        };

        if scalar.is_nan() {
            tracing::warn!("ignoring NaN sample (averaging interval longer than retention?)");
            return;
        }

        *self
            .observed
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = scalar;
    }

    fn value(&self) -> bool {
        self.observed() < self.threshold
    }
}
