use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{Action, Alarm, ServiceLevelAgreement};
use crate::error::Result;
use crate::metrics::MetricListener;
use crate::rules::AlarmListener;

/// Checks metric values against the active SLA and raises violations as alarms
#[async_trait]
pub trait SlaValidator: MetricListener {
    /// `None` clears the SLA
    async fn setup_sla(&self, sla: Option<&ServiceLevelAgreement>) -> Result<()>;

    async fn add_alarm_listener(&self, listener: Arc<dyn AlarmListener>) -> bool;

    async fn remove_alarm_listener(&self, listener: &Arc<dyn AlarmListener>) -> bool;
}

/// Turns alarms into corrective plans
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    async fn setup_sla(&self, sla: Option<&ServiceLevelAgreement>) -> Result<()>;

    /// Actions to submit in response to an alarm
    async fn plan(&self, alarm: &Alarm) -> Result<Vec<Action>>;
}

/// Tracks the running cost of the monitored resources
#[async_trait]
pub trait CurrentCostEvaluator: MetricListener {
    async fn setup_sla(&self, sla: Option<&ServiceLevelAgreement>) -> Result<()>;

    async fn current_cost(&self) -> Option<f64>;
}

/// Told when the initial learning stage has ended
#[async_trait]
pub trait LearningStageListener: Send + Sync {
    async fn learning_stage_finished(&self) -> Result<()>;
}

/// Runs the initial learning stage, experimenting with actions to calibrate
/// the decision maker before SLA validation starts
#[async_trait]
pub trait Experimentator: Send + Sync {
    /// May return before learning ends; `listener` is notified once it has
    async fn execute_initial_learning(
        &self,
        listener: Arc<dyn LearningStageListener>,
    ) -> Result<()>;
}
