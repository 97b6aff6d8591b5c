//! Internal listeners that close the loop between subsystems

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{Alarm, ConfiguredMetric, MetricEvent};
use crate::error::Result;
use crate::execution::ActionExecutor;
use crate::metrics::MetricListener;
use crate::registry::ResourceRegistry;
use crate::rules::{AlarmListener, RuleEngine};
use crate::sla::DecisionMaker;

/// Turns metric values into `MetricEvent`s for the rule engine. Installed as
/// a default listener, so it is attached before a metric's first tick.
pub(crate) struct RuleEngineSink {
    registry: Arc<ResourceRegistry>,
    rules: Arc<RuleEngine>,
}

impl RuleEngineSink {
    pub(crate) fn new(registry: Arc<ResourceRegistry>, rules: Arc<RuleEngine>) -> Self {
        Self { registry, rules }
    }
}

#[async_trait]
impl MetricListener for RuleEngineSink {
    async fn notify_metric_value(&self, metric: &ConfiguredMetric, value: f64) -> Result<()> {
        let resource_type = match self.registry.type_of(metric.resource_uri()).await {
            Ok(resource_type) => resource_type,
            Err(_) => {
                debug!("Metric {} has no registered resource", metric.key());
                String::new()
            }
        };
        let event = MetricEvent::new(metric.clone(), value, &resource_type);
        self.rules.process_metric_event(&event).await;
        Ok(())
    }
}

/// Hands alarms to the decision maker and submits the planned actions
pub(crate) struct PlanningListener {
    decision_maker: Arc<dyn DecisionMaker>,
    executor: Arc<dyn ActionExecutor>,
}

impl PlanningListener {
    pub(crate) fn new(
        decision_maker: Arc<dyn DecisionMaker>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            decision_maker,
            executor,
        }
    }
}

#[async_trait]
impl AlarmListener for PlanningListener {
    async fn handle_alarm(&self, alarm: &Alarm) -> Result<()> {
        let plan = self.decision_maker.plan(alarm).await?;
        for action in plan {
            let uri = action.action_uri.clone();
            if let Err(e) = self.executor.execute_request(action).await {
                warn!("Planned action {} for alarm {} rejected: {}", uri, alarm.id, e);
            }
        }
        Ok(())
    }
}
