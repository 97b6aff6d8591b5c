use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::metric::ConfiguredMetric;

/// Where an alarm originated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmSource {
    /// A rule matched and carried no action of its own
    Rule { name: String },
    /// The SLA validator flagged a violation
    SlaViolation,
    External(String),
}

impl fmt::Display for AlarmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmSource::Rule { name } => write!(f, "rule:{}", name),
            AlarmSource::SlaViolation => write!(f, "sla"),
            AlarmSource::External(source) => write!(f, "external:{}", source),
        }
    }
}

/// Alarm payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub id: Uuid,
    pub source: AlarmSource,
    pub metric: Option<ConfiguredMetric>,
    pub value: Option<f64>,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alarm {
    pub fn new(source: AlarmSource, message: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            metric: None,
            value: None,
            message: message.to_string(),
            raised_at: Utc::now(),
        }
    }

    /// Alarm raised by a rule match
    pub fn from_rule(rule_name: &str, metric: Option<ConfiguredMetric>, value: f64) -> Self {
        let message = match &metric {
            Some(m) => format!("rule '{}' matched {} = {}", rule_name, m.key(), value),
            None => format!("rule '{}' matched value {}", rule_name, value),
        };
        Self {
            metric,
            value: Some(value),
            ..Self::new(
                AlarmSource::Rule {
                    name: rule_name.to_string(),
                },
                &message,
            )
        }
    }

    /// Attach the offending metric reading
    pub fn with_reading(mut self, metric: ConfiguredMetric, value: f64) -> Self {
        self.metric = Some(metric);
        self.value = Some(value);
        self
    }
}
