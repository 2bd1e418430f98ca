//! Probe implementations.
//!
//! This module contains implementations of the `Probe` trait and the
//! factory turning probe configuration records into probes.
//!
//! ## Available Probes
//!
//! - [`noop`] - A constant-verdict probe (tag `noop`)
//! - [`prometheus_query`] - A threshold probe over a Prometheus query
//!   (tag `prometheusQuery`)
//! - [`kafka_consumer_lag`] - Consumer-group lag specialization of the
//!   threshold probe (tag `kafkaConsumerLag`)
//! - [`mock`] - A controllable probe for testing
//!
//! The set of probe kinds is closed: adding one means adding a
//! [`ProbeConfig`] variant and a case in [`build_probe`].

use crate::core::{BoxedProbe, BreakerError, BreakerResult};

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::sync::OnceLock;

pub mod kafka_consumer_lag;
pub mod mock;
pub mod noop;
pub mod prometheus;
pub mod prometheus_query;

// Re-exports
pub use kafka_consumer_lag::{KafkaConsumerLagProbe, KafkaConsumerLagProbeConfig};
pub use mock::{MockProbe, MockProbeHandle};
pub use noop::{NoopProbe, NoopProbeConfig};
pub use prometheus::{PrometheusClient, PrometheusClientConfig};
pub use prometheus_query::{PrometheusQueryProbe, PrometheusQueryProbeConfig};

/// A probe configuration record, discriminated by its `type` tag.
#[derive(Debug, Clone)]
pub enum ProbeConfig {
    /// A constant-verdict probe (`"type": "noop"`).
    Noop(NoopProbeConfig),
    /// A Prometheus threshold probe (`"type": "prometheusQuery"`).
    PrometheusQuery(PrometheusQueryProbeConfig),
    /// A consumer-lag probe (`"type": "kafkaConsumerLag"`).
    KafkaConsumerLag(KafkaConsumerLagProbeConfig),
}

impl ProbeConfig {
    /// Returns the `type` tag of this record.
    pub fn probe_type(&self) -> &'static str {
        match self {
            Self::Noop(_) => "noop",
            Self::PrometheusQuery(_) => "prometheusQuery",
            Self::KafkaConsumerLag(_) => "kafkaConsumerLag",
        }
    }

    /// Performs semantic validation for the configured variant.
    pub fn validate(&self) -> BreakerResult<()> {
        match self {
            Self::Noop(_) => Ok(()),
            Self::PrometheusQuery(config) => config.validate(),
            Self::KafkaConsumerLag(config) => config.validate(),
        }
    }
}

impl<'de> Deserialize<'de> for ProbeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| de::Error::custom("probe configuration is missing the 'type' field"))?
            .to_string();

        fn decode<T: serde::de::DeserializeOwned, E: de::Error>(
            tag: &str,
            value: serde_json::Value,
        ) -> Result<T, E> {
            serde_json::from_value(value)
                .map_err(|err| de::Error::custom(format!("invalid '{tag}' probe: {err}")))
        }

        match tag.as_str() {
            "noop" => decode(&tag, value).map(ProbeConfig::Noop),
            "prometheusQuery" => decode(&tag, value).map(ProbeConfig::PrometheusQuery),
            "kafkaConsumerLag" => decode(&tag, value).map(ProbeConfig::KafkaConsumerLag),
            other => Err(de::Error::custom(format!(
                "unsupported probe type '{other}'"
            ))),
        }
    }
}

/// Builds a probe from its configuration record.
///
/// # Errors
///
/// Returns a configuration error when the record fails semantic
/// validation or the probe's collaborators cannot be constructed.
pub fn build_probe(config: &ProbeConfig) -> BreakerResult<BoxedProbe> {
    match config {
        ProbeConfig::Noop(config) => Ok(Box::new(NoopProbe::new(config.clone()))),
        ProbeConfig::PrometheusQuery(config) => {
            Ok(Box::new(PrometheusQueryProbe::new(config.clone())?))
        }
        ProbeConfig::KafkaConsumerLag(config) => {
            Ok(Box::new(KafkaConsumerLagProbe::new(config.clone())?))
        }
    }
}

static INTERVAL_SHORTHAND: OnceLock<Regex> = OnceLock::new();

/// Validates a duration shorthand like `30s`, `5m`, `2h`, or `1d`.
pub(crate) fn validate_interval_shorthand(field: &str, value: &str) -> BreakerResult<()> {
    let pattern = INTERVAL_SHORTHAND
        .get_or_init(|| Regex::new(r"^\d+[smhd]$").expect("interval shorthand pattern is valid"));
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(BreakerError::invalid_field(
            field,
            format!("'{value}' does not match the <number><s|m|h|d> shorthand"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_each_known_tag() {
        let noop: ProbeConfig =
            serde_json::from_value(json!({ "type": "noop", "returnConstantValue": true })).unwrap();
        assert_eq!(noop.probe_type(), "noop");

        let query: ProbeConfig = serde_json::from_value(json!({
            "type": "prometheusQuery",
            "query": "up",
            "threshold": 1,
            "prometheus": { "endpoint": "http://prom:9090" },
        }))
        .unwrap();
        assert_eq!(query.probe_type(), "prometheusQuery");

        let lag: ProbeConfig = serde_json::from_value(json!({
            "type": "kafkaConsumerLag",
            "consumerGroupName": "replication",
            "wantTotalLagLessThan": 1000,
            "prometheus": { "endpoint": "http://prom:9090" },
        }))
        .unwrap();
        assert_eq!(lag.probe_type(), "kafkaConsumerLag");
    }

    #[test]
    fn test_unsupported_tag_is_named_in_error() {
        let err = serde_json::from_value::<ProbeConfig>(json!({ "type": "pingHost" }))
            .unwrap_err()
            .to_string();
        assert!(err.contains("unsupported probe type 'pingHost'"), "{err}");
    }

    #[test]
    fn test_missing_tag_is_rejected() {
        let err = serde_json::from_value::<ProbeConfig>(json!({ "returnConstantValue": true }))
            .unwrap_err()
            .to_string();
        assert!(err.contains("missing the 'type' field"), "{err}");
    }

    #[test]
    fn test_factory_builds_each_variant() {
        let noop: ProbeConfig =
            serde_json::from_value(json!({ "type": "noop", "returnConstantValue": false }))
                .unwrap();
        let probe = build_probe(&noop).unwrap();
        assert_eq!(probe.name(), "noop");
        assert!(!probe.value());

        let lag: ProbeConfig = serde_json::from_value(json!({
            "type": "kafkaConsumerLag",
            "consumerGroupName": "replication",
            "wantTotalLagLessThan": 1000,
            "prometheus": { "endpoint": "http://prom:9090" },
        }))
        .unwrap();
        assert_eq!(build_probe(&lag).unwrap().name(), "kafkaConsumerLag");
    }

    #[test]
    fn test_factory_rejects_invalid_variant_config() {
        let config = ProbeConfig::KafkaConsumerLag(
            serde_json::from_value(json!({
                "consumerGroupName": "replication",
                "wantTotalLagLessThan": -5,
                "prometheus": { "endpoint": "http://prom:9090" },
            }))
            .unwrap(),
        );
        assert!(build_probe(&config).is_err());
    }

    #[test]
    fn test_interval_shorthand() {
        for ok in ["30s", "5m", "12h", "1d", "090s"] {
            validate_interval_shorthand("averagedOverInterval", ok).unwrap();
        }
        for bad in ["", "5", "m5", "5w", "5 m", "5m0s", "-5m"] {
            let err = validate_interval_shorthand("averagedOverInterval", bad).unwrap_err();
            assert_eq!(err.field(), Some("averagedOverInterval"));
        }
    }
}
