use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::query::{build_query, CompiledQuery, Query};
use crate::domain::{Alarm, MeasurementEvent, MetricEvent, Rule, StreamEvent};
use crate::error::{MapeError, Result};
use crate::execution::ActionExecutor;
use crate::listener::ListenerSet;

/// Receives alarms fired by rules or raised by the SLA validator
#[async_trait]
pub trait AlarmListener: Send + Sync {
    async fn handle_alarm(&self, alarm: &Alarm) -> Result<()>;
}

/// A rule bound to its compiled matcher
struct ActiveRule {
    rule: Rule,
    query: CompiledQuery,
}

/// Compile a rule into its matcher. A raw statement keeps its own text.
fn compile_rule(rule: &Rule) -> Result<CompiledQuery> {
    match rule.custom_statement.as_deref() {
        Some(statement) if !statement.trim().is_empty() => {
            Ok(Query::parse(statement)?.compile()?.with_text(statement))
        }
        _ => build_query(
            rule.resource_uri.as_deref(),
            rule.resource_type_uri.as_deref(),
            rule.metric_uri.as_deref(),
            rule.condition.as_deref(),
        )?
        .compile(),
    }
}

/// Validate a rule without registering it
pub fn check_rule(rule: &Rule) -> Result<String> {
    compile_rule(rule).map(|q| q.text().to_string())
}

/// Matches injected events against the registered rules
pub struct RuleEngine {
    rules: RwLock<BTreeMap<String, Arc<ActiveRule>>>,
    alarm_listeners: RwLock<ListenerSet<dyn AlarmListener>>,
    executor: Arc<dyn ActionExecutor>,
}

impl RuleEngine {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
            alarm_listeners: RwLock::new(ListenerSet::new()),
            executor,
        }
    }

    /// Compile and register a rule; its name must not be in use
    pub async fn add_rule(&self, rule: Rule) -> Result<()> {
        let query = compile_rule(&rule)?;

        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.name) {
            return Err(MapeError::DuplicateRuleName(rule.name));
        }
        info!("Added rule '{}': {}", rule.name, query.text());
        rules.insert(rule.name.clone(), Arc::new(ActiveRule { rule, query }));
        Ok(())
    }

    pub async fn remove_rule(&self, name: &str) -> Result<Rule> {
        let removed = self
            .rules
            .write()
            .await
            .remove(name)
            .ok_or_else(|| MapeError::RuleNotFound(name.to_string()))?;
        info!("Removed rule '{}'", name);
        Ok(removed.rule.clone())
    }

    /// Remove every rule at once; returns how many were active
    pub async fn clear_rules(&self) -> usize {
        let mut rules = self.rules.write().await;
        let count = rules.len();
        rules.clear();
        info!("Cleared {} rules", count);
        count
    }

    pub async fn rules(&self) -> Vec<Rule> {
        self.rules
            .read()
            .await
            .values()
            .map(|active| active.rule.clone())
            .collect()
    }

    /// Canonical query text of an active rule
    pub async fn rule_query(&self, name: &str) -> Result<String> {
        self.rules
            .read()
            .await
            .get(name)
            .map(|active| active.query.text().to_string())
            .ok_or_else(|| MapeError::RuleNotFound(name.to_string()))
    }

    pub async fn rule_count(&self) -> usize {
        self.rules.read().await.len()
    }

    /// Run a metric event through every rule; returns the number of matches
    pub async fn process_metric_event(&self, event: &MetricEvent) -> usize {
        self.process(StreamEvent::Metric(event)).await
    }

    /// Run a measurement event through every rule; returns the number of matches
    pub async fn process_measurement_event(&self, event: &MeasurementEvent) -> usize {
        self.process(StreamEvent::Measurement(event)).await
    }

    async fn process(&self, event: StreamEvent<'_>) -> usize {
        let active: Vec<Arc<ActiveRule>> = self.rules.read().await.values().cloned().collect();

        let mut matched = 0;
        for rule in active.iter().filter(|r| r.query.matches(&event)) {
            matched += 1;
            self.on_match(&rule.rule, &event).await;
        }
        matched
    }

    async fn on_match(&self, rule: &Rule, event: &StreamEvent<'_>) {
        let value = event.value();
        debug!("Rule '{}' matched value {}", rule.name, value);

        match &rule.action {
            Some(action) => {
                if let Err(e) = self.executor.execute_request(action.clone()).await {
                    warn!(
                        "Rule '{}' could not submit action {}: {}",
                        rule.name, action.action_uri, e
                    );
                }
            }
            None => {
                let alarm = Alarm::from_rule(&rule.name, event.metric().cloned(), value);
                self.fire_alarm(&alarm).await;
            }
        }
    }

    /// Deliver an alarm to the listeners registered when the call starts;
    /// returns how many were notified
    pub async fn fire_alarm(&self, alarm: &Alarm) -> usize {
        let listeners = self.alarm_listeners.read().await.snapshot();
        for listener in &listeners {
            if let Err(e) = listener.handle_alarm(alarm).await {
                warn!("Alarm listener failed on alarm {}: {}", alarm.id, e);
            }
        }
        listeners.len()
    }

    pub async fn add_alarm_listener(&self, listener: Arc<dyn AlarmListener>) -> bool {
        self.alarm_listeners.write().await.add(listener)
    }

    pub async fn remove_alarm_listener(&self, listener: &Arc<dyn AlarmListener>) -> bool {
        self.alarm_listeners.write().await.remove(listener)
    }
}
