//! Consumer-group lag probe.
//!
//! A thin specialization of the Prometheus threshold probe: it pre-builds
//! a query over the exporter's consumer-lag metric, filtered by consumer
//! group (and topic, when given), and otherwise delegates entirely to
//! [`PrometheusQueryProbe`].

use crate::core::{BreakerError, BreakerResult, Probe};
use crate::probes::prometheus::PrometheusClientConfig;
use crate::probes::prometheus_query::{PrometheusQueryProbe, PrometheusQueryProbeConfig};
use crate::probes::validate_interval_shorthand;

use async_trait::async_trait;
use serde::Deserialize;

/// Lag metric exposed by kafka_exporter.
const LAG_METRIC: &str = "kafka_consumergroup_lag";

/// Configuration for a [`KafkaConsumerLagProbe`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaConsumerLagProbeConfig {
    /// Endpoint of the Prometheus server scraping the Kafka exporter.
    pub prometheus: PrometheusClientConfig,

    /// Consumer group whose total lag is observed.
    pub consumer_group_name: String,

    /// The probe reports healthy while total lag stays below this.
    pub want_total_lag_less_than: f64,

    /// Optional topic filter; all topics are summed when omitted.
    #[serde(default)]
    pub topic_name: Option<String>,

    /// Optional averaging window, shorthand like `5m` (s/m/h/d units).
    #[serde(default)]
    pub averaged_over_interval: Option<String>,
}

impl KafkaConsumerLagProbeConfig {
    /// Validates value ranges and the interval shorthand.
    pub fn validate(&self) -> BreakerResult<()> {
        if self.consumer_group_name.is_empty() {
            return Err(BreakerError::invalid_field(
                "consumerGroupName",
                "must not be empty",
            ));
        }
        if !self.want_total_lag_less_than.is_finite() || self.want_total_lag_less_than <= 0.0 {
            return Err(BreakerError::invalid_field(
                "wantTotalLagLessThan",
                "must be a positive number",
            ));
        }
        if let Some(interval) = &self.averaged_over_interval {
            validate_interval_shorthand("averagedOverInterval", interval)?;
        }
        self.prometheus.validate()
    }

    /// Builds the lag query for this group (and topic, when set).
    fn lag_query(&self) -> String {
        match &self.topic_name {
            Some(topic) => format!(
                "{LAG_METRIC}{{consumergroup=\"{}\",topic=\"{}\"}}",
                self.consumer_group_name, topic
            ),
            None => format!(
                "{LAG_METRIC}{{consumergroup=\"{}\"}}",
                self.consumer_group_name
            ),
        }
    }
}

/// A probe over a consumer group's total lag.
#[derive(Debug)]
pub struct KafkaConsumerLagProbe {
    inner: PrometheusQueryProbe,
}

impl KafkaConsumerLagProbe {
    /// Creates a probe from its configuration.
    pub fn new(config: KafkaConsumerLagProbeConfig) -> BreakerResult<Self> {
        config.validate()?;
        let inner = PrometheusQueryProbe::new(PrometheusQueryProbeConfig {
            query: config.lag_query(),
            threshold: config.want_total_lag_less_than,
            averaged_over_interval: config.averaged_over_interval.clone(),
            prometheus: config.prometheus,
        })?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Probe for KafkaConsumerLagProbe {
    fn name(&self) -> &str {
        "kafkaConsumerLag"
    }

    async fn check(&self) {
        self.inner.check().await;
    }

    fn value(&self) -> bool {
        self.inner.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> KafkaConsumerLagProbeConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_lag_query_filters_by_group() {
        let config = config(json!({
            "consumerGroupName": "replication",
            "wantTotalLagLessThan": 1000,
            "prometheus": { "endpoint": "http://prom:9090" },
        }));
        assert_eq!(
            config.lag_query(),
            "kafka_consumergroup_lag{consumergroup=\"replication\"}"
        );
    }

    #[test]
    fn test_lag_query_filters_by_group_and_topic() {
        let config = config(json!({
            "consumerGroupName": "replication",
            "wantTotalLagLessThan": 1000,
            "topicName": "events",
            "prometheus": { "endpoint": "http://prom:9090" },
        }));
        assert_eq!(
            config.lag_query(),
            "kafka_consumergroup_lag{consumergroup=\"replication\",topic=\"events\"}"
        );
    }

    #[test]
    fn test_rejects_non_positive_lag_bound() {
        let config = config(json!({
            "consumerGroupName": "replication",
            "wantTotalLagLessThan": 0,
            "prometheus": { "endpoint": "http://prom:9090" },
        }));
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("wantTotalLagLessThan"));
    }

    #[test]
    fn test_rejects_empty_group_name() {
        let config = config(json!({
            "consumerGroupName": "",
            "wantTotalLagLessThan": 100,
            "prometheus": { "endpoint": "http://prom:9090" },
        }));
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("consumerGroupName"));
    }

    #[test]
    fn test_builds_probe_with_lag_query() {
        let probe = KafkaConsumerLagProbe::new(config(json!({
            "consumerGroupName": "replication",
            "wantTotalLagLessThan": 1000,
            "averagedOverInterval": "5m",
            "prometheus": { "endpoint": "http://prom:9090" },
        })))
        .unwrap();
        assert_eq!(probe.name(), "kafkaConsumerLag");
        // Nothing observed yet: lag 0.0 is below any positive bound.
        assert!(probe.value());
    }
}
