use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::ConfiguredMetric;

/// Raw capability reading reported by a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementEvent {
    pub instance_uri: String,
    pub capability_uri: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MeasurementEvent {
    pub fn new(instance_uri: &str, capability_uri: &str, value: f64) -> Self {
        Self {
            instance_uri: instance_uri.to_string(),
            capability_uri: capability_uri.to_string(),
            timestamp: Utc::now(),
            value,
        }
    }
}

/// Value produced by a running metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub metric: ConfiguredMetric,
    pub value: f64,
    /// Type of the resource owning the metric
    pub resource_type: String,
}

impl MetricEvent {
    pub fn new(metric: ConfiguredMetric, value: f64, resource_type: &str) -> Self {
        Self {
            metric,
            value,
            resource_type: resource_type.to_string(),
        }
    }
}

/// Either kind of event flowing through the rule engine
#[derive(Debug, Clone, Copy)]
pub enum StreamEvent<'a> {
    Metric(&'a MetricEvent),
    Measurement(&'a MeasurementEvent),
}

impl StreamEvent<'_> {
    pub fn value(&self) -> f64 {
        match self {
            StreamEvent::Metric(e) => e.value,
            StreamEvent::Measurement(e) => e.value,
        }
    }

    pub fn metric(&self) -> Option<&ConfiguredMetric> {
        match self {
            StreamEvent::Metric(e) => Some(&e.metric),
            StreamEvent::Measurement(_) => None,
        }
    }
}
