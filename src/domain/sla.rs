use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::pattern::full_match_regex;
use super::resource::Parameters;
use crate::error::MapeError;

/// Serializable form of one involved pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaPatternDefinition {
    /// Regex matched against whole resource URIs
    pub pattern: String,
    pub resource_type: String,
    #[serde(default)]
    pub parameters: Parameters,
    /// Metric kinds to run for every matching resource
    #[serde(default)]
    pub metrics: Vec<String>,
}

/// Serializable form of an SLA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaDefinition {
    pub name: String,
    #[serde(default)]
    pub patterns: Vec<SlaPatternDefinition>,
}

/// An involved pattern with its compiled matcher
#[derive(Debug, Clone)]
pub struct InvolvedPattern {
    definition: SlaPatternDefinition,
    regex: Regex,
}

impl InvolvedPattern {
    pub fn pattern(&self) -> &str {
        &self.definition.pattern
    }

    pub fn matches(&self, resource_uri: &str) -> bool {
        self.regex.is_match(resource_uri)
    }

    pub fn resource_type(&self) -> &str {
        &self.definition.resource_type
    }

    pub fn parameters(&self) -> &Parameters {
        &self.definition.parameters
    }

    pub fn metrics(&self) -> &[String] {
        &self.definition.metrics
    }
}

/// Set of resource patterns with the metrics that must be monitored for them
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SlaDefinition")]
pub struct ServiceLevelAgreement {
    name: String,
    patterns: Vec<InvolvedPattern>,
}

impl ServiceLevelAgreement {
    pub fn new(definition: SlaDefinition) -> crate::error::Result<Self> {
        let patterns = definition
            .patterns
            .into_iter()
            .map(|p| {
                Ok(InvolvedPattern {
                    regex: full_match_regex(&p.pattern)?,
                    definition: p,
                })
            })
            .collect::<crate::error::Result<Vec<_>>>()?;

        Ok(Self {
            name: definition.name,
            patterns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn involved_patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.pattern())
    }

    pub fn patterns(&self) -> &[InvolvedPattern] {
        &self.patterns
    }

    /// Patterns whose regex matches `resource_uri`
    pub fn patterns_matching<'a>(
        &'a self,
        resource_uri: &'a str,
    ) -> impl Iterator<Item = &'a InvolvedPattern> + 'a {
        self.patterns.iter().filter(move |p| p.matches(resource_uri))
    }

    pub fn metrics_for_pattern(&self, pattern: &str) -> Option<&[String]> {
        self.patterns
            .iter()
            .find(|p| p.pattern() == pattern)
            .map(|p| p.metrics())
    }

    pub fn to_definition(&self) -> SlaDefinition {
        SlaDefinition {
            name: self.name.clone(),
            patterns: self.patterns.iter().map(|p| p.definition.clone()).collect(),
        }
    }
}

impl TryFrom<SlaDefinition> for ServiceLevelAgreement {
    type Error = MapeError;

    fn try_from(definition: SlaDefinition) -> Result<Self, Self::Error> {
        Self::new(definition)
    }
}

impl fmt::Display for ServiceLevelAgreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SLA '{}' [", self.name)?;
        for (i, p) in self.patterns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} -> {:?}", p.pattern(), p.metrics())?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_sla() -> ServiceLevelAgreement {
        ServiceLevelAgreement::new(SlaDefinition {
            name: "hosts".to_string(),
            patterns: vec![
                SlaPatternDefinition {
                    pattern: "/host1/.*".to_string(),
                    resource_type: "cpu".to_string(),
                    parameters: Parameters::new(),
                    metrics: vec!["cpu.load".to_string()],
                },
                SlaPatternDefinition {
                    pattern: "/host1".to_string(),
                    resource_type: "host".to_string(),
                    parameters: Parameters::new(),
                    metrics: vec!["mem.used".to_string(), "net.rx".to_string()],
                },
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_patterns_matching_full_uri() {
        let sla = host_sla();
        let matched: Vec<_> = sla
            .patterns_matching("/host1/cpu0")
            .map(|p| p.pattern())
            .collect();
        assert_eq!(matched, vec!["/host1/.*"]);

        let matched: Vec<_> = sla.patterns_matching("/host1").map(|p| p.pattern()).collect();
        assert_eq!(matched, vec!["/host1"]);

        assert_eq!(sla.patterns_matching("/host2/cpu0").count(), 0);
    }

    #[test]
    fn test_metrics_for_pattern() {
        let sla = host_sla();
        assert_eq!(
            sla.metrics_for_pattern("/host1"),
            Some(&["mem.used".to_string(), "net.rx".to_string()][..])
        );
        assert!(sla.metrics_for_pattern("/nope").is_none());
    }

    #[test]
    fn test_deserialize_rejects_bad_regex() {
        let json = serde_json::json!({
            "name": "broken",
            "patterns": [{ "pattern": "([", "resource_type": "host" }]
        });
        assert!(serde_json::from_value::<ServiceLevelAgreement>(json).is_err());
    }

    #[test]
    fn test_definition_round_trip_keeps_patterns() {
        let sla = host_sla();
        let again = ServiceLevelAgreement::new(sla.to_definition()).unwrap();
        assert_eq!(
            again.involved_patterns().collect::<Vec<_>>(),
            vec!["/host1/.*", "/host1"]
        );
    }
}
