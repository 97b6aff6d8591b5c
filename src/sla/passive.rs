use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::traits::{
    CurrentCostEvaluator, DecisionMaker, Experimentator, LearningStageListener, SlaValidator,
};
use crate::domain::{Action, Alarm, ConfiguredMetric, MetricKey, ServiceLevelAgreement};
use crate::error::Result;
use crate::listener::ListenerSet;
use crate::metrics::MetricListener;
use crate::rules::AlarmListener;

/// Last value seen per metric plus the name of the active SLA
#[derive(Default)]
struct Readings {
    sla: Option<String>,
    values: HashMap<MetricKey, f64>,
}

impl Readings {
    fn setup(&mut self, sla: Option<&ServiceLevelAgreement>) {
        self.sla = sla.map(|s| s.name().to_string());
        if self.sla.is_none() {
            self.values.clear();
        }
    }
}

/// Validator that records readings; violations are raised explicitly via `raise`
#[derive(Default)]
pub struct RecordingSlaValidator {
    readings: RwLock<Readings>,
    alarm_listeners: RwLock<ListenerSet<dyn AlarmListener>>,
}

impl RecordingSlaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current_sla(&self) -> Option<String> {
        self.readings.read().await.sla.clone()
    }

    pub async fn last_value(&self, metric: &ConfiguredMetric) -> Option<f64> {
        self.readings.read().await.values.get(metric.key()).copied()
    }

    /// Deliver a violation to the alarm listeners
    pub async fn raise(&self, alarm: &Alarm) -> usize {
        let listeners = self.alarm_listeners.read().await.snapshot();
        for listener in &listeners {
            if let Err(e) = listener.handle_alarm(alarm).await {
                warn!("Alarm listener failed on SLA violation {}: {}", alarm.id, e);
            }
        }
        listeners.len()
    }
}

#[async_trait]
impl MetricListener for RecordingSlaValidator {
    async fn notify_metric_value(&self, metric: &ConfiguredMetric, value: f64) -> Result<()> {
        self.readings
            .write()
            .await
            .values
            .insert(metric.key().clone(), value);
        Ok(())
    }

    async fn notify_metric_stopped(&self, metric: &ConfiguredMetric) -> Result<()> {
        self.readings.write().await.values.remove(metric.key());
        Ok(())
    }
}

#[async_trait]
impl SlaValidator for RecordingSlaValidator {
    async fn setup_sla(&self, sla: Option<&ServiceLevelAgreement>) -> Result<()> {
        self.readings.write().await.setup(sla);
        match sla {
            Some(sla) => info!("SLA validator set up for {}", sla),
            None => info!("SLA validator cleared"),
        }
        Ok(())
    }

    async fn add_alarm_listener(&self, listener: Arc<dyn AlarmListener>) -> bool {
        self.alarm_listeners.write().await.add(listener)
    }

    async fn remove_alarm_listener(&self, listener: &Arc<dyn AlarmListener>) -> bool {
        self.alarm_listeners.write().await.remove(listener)
    }
}

/// Cost evaluator summing the latest reading of every metric it listens to
#[derive(Default)]
pub struct RecordingCostEvaluator {
    readings: RwLock<Readings>,
}

impl RecordingCostEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current_sla(&self) -> Option<String> {
        self.readings.read().await.sla.clone()
    }
}

#[async_trait]
impl MetricListener for RecordingCostEvaluator {
    async fn notify_metric_value(&self, metric: &ConfiguredMetric, value: f64) -> Result<()> {
        self.readings
            .write()
            .await
            .values
            .insert(metric.key().clone(), value);
        Ok(())
    }

    async fn notify_metric_stopped(&self, metric: &ConfiguredMetric) -> Result<()> {
        self.readings.write().await.values.remove(metric.key());
        Ok(())
    }
}

#[async_trait]
impl CurrentCostEvaluator for RecordingCostEvaluator {
    async fn setup_sla(&self, sla: Option<&ServiceLevelAgreement>) -> Result<()> {
        self.readings.write().await.setup(sla);
        Ok(())
    }

    async fn current_cost(&self) -> Option<f64> {
        let readings = self.readings.read().await;
        readings.sla.as_ref()?;
        Some(readings.values.values().sum())
    }
}

/// Decision maker that never plans anything
#[derive(Default)]
pub struct NoopDecisionMaker;

#[async_trait]
impl DecisionMaker for NoopDecisionMaker {
    async fn setup_sla(&self, _sla: Option<&ServiceLevelAgreement>) -> Result<()> {
        Ok(())
    }

    async fn plan(&self, alarm: &Alarm) -> Result<Vec<Action>> {
        debug!("No plan for alarm {} ({})", alarm.id, alarm.source);
        Ok(Vec::new())
    }
}

/// Experimentator with nothing to learn: the stage ends as soon as it starts
#[derive(Default)]
pub struct NoExperiments;

#[async_trait]
impl Experimentator for NoExperiments {
    async fn execute_initial_learning(
        &self,
        listener: Arc<dyn LearningStageListener>,
    ) -> Result<()> {
        info!("No experiments configured, learning stage finished");
        listener.learning_stage_finished().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SlaDefinition, SlaPatternDefinition};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sla() -> ServiceLevelAgreement {
        ServiceLevelAgreement::new(SlaDefinition {
            name: "gold".to_string(),
            patterns: vec![SlaPatternDefinition {
                pattern: "/host1/.*".to_string(),
                resource_type: "cpu".to_string(),
                parameters: Default::default(),
                metrics: vec!["cpu.load".to_string()],
            }],
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_cost_evaluator_sums_latest_readings() {
        let evaluator = RecordingCostEvaluator::new();
        assert_eq!(evaluator.current_cost().await, None);

        evaluator.setup_sla(Some(&sla())).await.unwrap();
        let cpu0 = ConfiguredMetric::new("cpu.load", "/host1/cpu0");
        let cpu1 = ConfiguredMetric::new("cpu.load", "/host1/cpu1");
        evaluator.notify_metric_value(&cpu0, 1.0).await.unwrap();
        evaluator.notify_metric_value(&cpu0, 2.0).await.unwrap();
        evaluator.notify_metric_value(&cpu1, 0.5).await.unwrap();
        assert_eq!(evaluator.current_cost().await, Some(2.5));

        evaluator.notify_metric_stopped(&cpu1).await.unwrap();
        assert_eq!(evaluator.current_cost().await, Some(2.0));

        evaluator.setup_sla(None).await.unwrap();
        assert_eq!(evaluator.current_cost().await, None);
    }

    #[tokio::test]
    async fn test_validator_tracks_sla_and_values() {
        let validator = RecordingSlaValidator::new();
        validator.setup_sla(Some(&sla())).await.unwrap();
        assert_eq!(validator.current_sla().await.as_deref(), Some("gold"));

        let metric = ConfiguredMetric::new("cpu.load", "/host1/cpu0");
        validator.notify_metric_value(&metric, 0.9).await.unwrap();
        assert_eq!(validator.last_value(&metric).await, Some(0.9));

        validator.setup_sla(None).await.unwrap();
        assert!(validator.current_sla().await.is_none());
        assert!(validator.last_value(&metric).await.is_none());
    }

    #[derive(Default)]
    struct FinishCounter(AtomicUsize);

    #[async_trait]
    impl LearningStageListener for FinishCounter {
        async fn learning_stage_finished(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_no_experiments_finishes_immediately() {
        let counter = Arc::new(FinishCounter::default());
        NoExperiments
            .execute_initial_learning(counter.clone())
            .await
            .unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
