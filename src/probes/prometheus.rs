//! Prometheus instant-query client.
//!
//! Implements [`MetricSource`] against the Prometheus HTTP API
//! (`/api/v1/query`). The client is built once around a fixed query
//! expression; transport errors, non-success statuses, and empty result
//! sets all map to "no data" so a backend outage never propagates past
//! the probe layer.

use crate::core::{BreakerError, BreakerResult, MetricSource};

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Configuration for the Prometheus endpoint a probe queries.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusClientConfig {
    /// Absolute base URI of the Prometheus server (http or https).
    pub endpoint: String,

    /// Request timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl PrometheusClientConfig {
    /// Validates the endpoint URI and timeout range.
    ///
    /// Field paths in errors are relative to the `prometheus` record.
    pub fn validate(&self) -> BreakerResult<()> {
        let url = Url::parse(&self.endpoint).map_err(|err| {
            BreakerError::invalid_field("prometheus.endpoint", format!("not a valid URI: {err}"))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BreakerError::invalid_field(
                "prometheus.endpoint",
                format!("scheme must be http or https, got '{}'", url.scheme()),
            ));
        }
        if self.timeout == Some(0) {
            return Err(BreakerError::invalid_field(
                "prometheus.timeout",
                "must be a positive duration in milliseconds",
            ));
        }
        Ok(())
    }
}

/// A [`MetricSource`] that evaluates one query against Prometheus.
#[derive(Debug)]
pub struct PrometheusClient {
    client: reqwest::Client,
    query_url: Url,
    query: String,
}

impl PrometheusClient {
    /// Creates a client around the given query expression.
    ///
    /// When `averaged_over_interval` is given, the query is wrapped as
    /// `sum(avg_over_time(query[interval]))`, otherwise as `sum(query)`,
    /// so the instant query always yields a single pre-aggregated series.
    pub fn new(
        config: &PrometheusClientConfig,
        query: &str,
        averaged_over_interval: Option<&str>,
    ) -> BreakerResult<Self> {
        config.validate()?;

        let mut endpoint = Url::parse(&config.endpoint).map_err(|err| {
            BreakerError::invalid_field("prometheus.endpoint", format!("not a valid URI: {err}"))
        })?;
        // Url::join treats the last path segment as a file unless the
        // path ends with a slash.
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let query_url = endpoint.join("api/v1/query").map_err(|err| {
            BreakerError::invalid_field("prometheus.endpoint", format!("not a valid URI: {err}"))
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder.build().map_err(|err| {
            BreakerError::configuration(format!("failed to build HTTP client: {err}"))
        })?;

        Ok(Self {
            client,
            query_url,
            query: wrap_query(query, averaged_over_interval),
        })
    }

    /// Returns the effective (wrapped) query expression.
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[async_trait]
impl MetricSource for PrometheusClient {
    async fn instant_query(&self) -> Option<f64> {
        let response = match self
            .client
            .get(self.query_url.clone())
            .query(&[("query", self.query.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(query = %self.query, error = %err, "unable to query prometheus");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                query = %self.query,
                status = %response.status(),
                "prometheus returned a non-success status"
            );
            return None;
        }

        let body: InstantQueryResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(query = %self.query, error = %err, "unreadable prometheus response");
                return None;
            }
        };

        scalar_from_response(&body)
    }
}

/// Wraps a raw query for instant evaluation.
fn wrap_query(query: &str, averaged_over_interval: Option<&str>) -> String {
    match averaged_over_interval {
        Some(interval) => format!("sum(avg_over_time({query}[{interval}]))"),
        None => format!("sum({query})"),
    }
}

#[derive(Debug, Deserialize)]
struct InstantQueryResponse {
    status: String,
    data: InstantQueryData,
}

#[derive(Debug, Deserialize)]
struct InstantQueryData {
    result: Vec<InstantSample>,
}

#[derive(Debug, Deserialize)]
struct InstantSample {
    // Prometheus encodes an instant sample as [timestamp, "value"].
    value: (f64, String),
}

/// Extracts the scalar from a decoded instant-query response.
///
/// Returns `None` for error statuses and empty result sets; Prometheus
/// serializes NaN as the string `"NaN"`, which parses to a NaN scalar and
/// is filtered at the probe layer.
fn scalar_from_response(body: &InstantQueryResponse) -> Option<f64> {
    if body.status != "success" {
        tracing::warn!(status = %body.status, "prometheus query did not succeed");
        return None;
    }

    let sample = body.data.result.first()?;
    match sample.value.1.parse::<f64>() {
        Ok(scalar) => Some(scalar),
        Err(err) => {
            tracing::warn!(raw = %sample.value.1, error = %err, "non-numeric prometheus sample");
            None
        }
    }
}
