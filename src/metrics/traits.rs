//! Seams between the metrics manager and its collaborators

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{ConfiguredMetric, DEFAULT_POLL_INTERVAL};
use crate::error::Result;

/// Receives values of one or more running metrics
#[async_trait]
pub trait MetricListener: Send + Sync {
    async fn notify_metric_value(&self, metric: &ConfiguredMetric, value: f64) -> Result<()>;

    /// The metric was stopped; the listener is detached right after this call
    async fn notify_metric_stopped(&self, _metric: &ConfiguredMetric) -> Result<()> {
        Ok(())
    }
}

/// Receives start/stop batches from the metrics manager
#[async_trait]
pub trait MetricsManagerListener: Send + Sync {
    async fn notify_metrics_started(&self, metrics: &[ConfiguredMetric]) -> Result<()>;

    async fn notify_metrics_stopped(&self, metrics: &[ConfiguredMetric]) -> Result<()>;
}

/// Computes the current value of a metric on each poll tick
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// `None` when there is nothing to report this tick
    async fn sample(&self, metric: &ConfiguredMetric) -> Result<Option<f64>>;
}

/// Source for metrics whose values are pushed with `MetricsManager::publish_value`
pub struct PushOnlySource;

#[async_trait]
impl MetricSource for PushOnlySource {
    async fn sample(&self, _metric: &ConfiguredMetric) -> Result<Option<f64>> {
        Ok(None)
    }
}

/// Builds metric instances from (metric kind, resource) pairs
pub trait MetricFactory: Send + Sync {
    fn create_metric(&self, metric_uri: &str, resource_uri: &str) -> ConfiguredMetric;
}

/// Factory stamping every metric with one configured poll interval
#[derive(Debug, Clone)]
pub struct DefaultMetricFactory {
    poll_interval: Duration,
}

impl DefaultMetricFactory {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for DefaultMetricFactory {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl MetricFactory for DefaultMetricFactory {
    fn create_metric(&self, metric_uri: &str, resource_uri: &str) -> ConfiguredMetric {
        ConfiguredMetric::new(metric_uri, resource_uri).with_poll_interval(self.poll_interval)
    }
}
