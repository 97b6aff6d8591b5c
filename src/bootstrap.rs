//! Declarative startup configuration
//!
//! A TOML file with `[[rules]]`, `[[resources]]`, `[[metrics]]` and an optional
//! `[sla]` table is applied through the coordinator in that order. A failing
//! entry is logged and skipped.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;
use crate::domain::{Parameters, Rule, ServiceLevelAgreement, SlaDefinition};
use crate::error::Result;
use crate::rules::check_rule;

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceEntry {
    pub uri: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricEntry {
    pub metric_uri: String,
    pub resource_uri: String,
    /// 0 means "use the configured default"
    #[serde(default)]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeclarativeConfig {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub metrics: Vec<MetricEntry>,
    #[serde(default)]
    pub sla: Option<SlaDefinition>,
}

/// Applied and failed entry counts per section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rules_applied: usize,
    pub rules_failed: usize,
    pub resources_applied: usize,
    pub resources_failed: usize,
    pub metrics_applied: usize,
    pub metrics_failed: usize,
    pub sla_applied: bool,
    pub sla_failed: bool,
}

impl LoadReport {
    pub fn failures(&self) -> usize {
        self.rules_failed + self.resources_failed + self.metrics_failed + usize::from(self.sla_failed)
    }
}

impl DeclarativeConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Compile every rule and the SLA patterns without touching a coordinator;
    /// returns one message per broken entry
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for rule in &self.rules {
            if let Err(e) = check_rule(rule) {
                problems.push(format!("rule '{}': {}", rule.name, e));
            }
        }
        if let Some(sla) = &self.sla {
            if let Err(e) = ServiceLevelAgreement::new(sla.clone()) {
                problems.push(format!("sla '{}': {}", sla.name, e));
            }
        }
        problems
    }

    /// Drive every entry through the coordinator: rules, resources, metrics,
    /// then the SLA
    pub async fn apply(&self, coordinator: &Coordinator, default_poll_interval: Duration) -> LoadReport {
        let mut report = LoadReport::default();

        if self.rules.is_empty() {
            warn!("No rules specified");
        }
        for rule in &self.rules {
            info!("Adding rule: {}", rule.name);
            match coordinator.add_rule(rule.clone()).await {
                Ok(()) => report.rules_applied += 1,
                Err(e) => {
                    error!("Cannot add rule '{}': {}", rule.name, e);
                    report.rules_failed += 1;
                }
            }
        }

        for entry in &self.resources {
            match self.apply_resource(coordinator, entry).await {
                Ok(()) => report.resources_applied += 1,
                Err(e) => {
                    error!("Cannot add resource {}: {}", entry.uri, e);
                    report.resources_failed += 1;
                }
            }
        }

        for entry in &self.metrics {
            let interval = match entry.poll_interval_ms {
                0 => default_poll_interval,
                ms => Duration::from_millis(ms),
            };
            let metric = coordinator
                .create_metric(&entry.metric_uri, &entry.resource_uri)
                .with_poll_interval(interval);

            info!("Starting metric: {}", metric);
            match coordinator.start_metric(metric).await {
                Ok(()) => report.metrics_applied += 1,
                Err(e) => {
                    error!(
                        "Cannot start metric {} for {}: {}",
                        entry.metric_uri, entry.resource_uri, e
                    );
                    report.metrics_failed += 1;
                }
            }
        }

        if let Some(definition) = &self.sla {
            let started = match ServiceLevelAgreement::new(definition.clone()) {
                Ok(sla) => coordinator.start_sla_validation(sla).await,
                Err(e) => Err(e),
            };
            match started {
                Ok(()) => report.sla_applied = true,
                Err(e) => {
                    error!("Cannot start SLA '{}': {}", definition.name, e);
                    report.sla_failed = true;
                }
            }
        }

        info!(
            rules = report.rules_applied,
            resources = report.resources_applied,
            metrics = report.metrics_applied,
            sla = report.sla_applied,
            failures = report.failures(),
            "declarative configuration applied"
        );
        report
    }

    async fn apply_resource(&self, coordinator: &Coordinator, entry: &ResourceEntry) -> Result<()> {
        coordinator
            .register_resource(&entry.uri, &entry.resource_type, entry.parameters.clone())
            .await?;
        if !entry.capabilities.is_empty() {
            coordinator
                .set_resource_capabilities(&entry.uri, entry.capabilities.clone())
                .await?;
        }
        Ok(())
    }
}
