use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Poll interval used when a metric is created without one
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Identity of a metric instance: (metric kind, resource)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricKey {
    pub metric_uri: String,
    pub resource_uri: String,
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.metric_uri, self.resource_uri)
    }
}

/// A metric kind bound to a resource.
///
/// Equality and hashing only consider the (metric kind, resource) pair; the
/// poll interval is mutable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredMetric {
    key: MetricKey,
    #[serde(with = "duration_ms")]
    poll_interval: Duration,
}

impl ConfiguredMetric {
    pub fn new(metric_uri: &str, resource_uri: &str) -> Self {
        Self {
            key: MetricKey {
                metric_uri: metric_uri.to_string(),
                resource_uri: resource_uri.to_string(),
            },
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn metric_uri(&self) -> &str {
        &self.key.metric_uri
    }

    pub fn resource_uri(&self) -> &str {
        &self.key.resource_uri
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn set_poll_interval(&mut self, poll_interval: Duration) {
        self.poll_interval = poll_interval;
    }

    pub fn key(&self) -> &MetricKey {
        &self.key
    }
}

impl PartialEq for ConfiguredMetric {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ConfiguredMetric {}

impl Hash for ConfiguredMetric {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for ConfiguredMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} every {}ms", self.key, self.poll_interval.as_millis())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_ignores_poll_interval() {
        let a = ConfiguredMetric::new("cpu.load", "/host1/cpu0");
        let b = ConfiguredMetric::new("cpu.load", "/host1/cpu0")
            .with_poll_interval(Duration::from_millis(250));
        let c = ConfiguredMetric::new("cpu.load", "/host1/cpu1");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serde_poll_interval_in_millis() {
        let metric = ConfiguredMetric::new("mem.used", "/host1")
            .with_poll_interval(Duration::from_millis(1500));
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["poll_interval"], 1500);

        let back: ConfiguredMetric = serde_json::from_value(json).unwrap();
        assert_eq!(back.poll_interval(), Duration::from_millis(1500));
    }
}
