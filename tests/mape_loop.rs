//! End-to-end control loop: discovery, SLA-driven metrics, rules, actions

use async_trait::async_trait;
use mape::domain::{
    Action, ActionExecution, Alarm, Parameters, Rule, ServiceLevelAgreement, SlaDefinition,
    SlaPatternDefinition,
};
use mape::listener::same_listener;
use mape::{
    ActionExecutionListener, AlarmListener, CoordinatorBuilder, DecisionMaker, MapeError,
    ResourceDiscoveryEvent, Result,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn host_sla() -> ServiceLevelAgreement {
    ServiceLevelAgreement::new(SlaDefinition {
        name: "hosts".to_string(),
        patterns: vec![SlaPatternDefinition {
            pattern: "/host1/.*".to_string(),
            resource_type: "cpu".to_string(),
            parameters: Parameters::new(),
            metrics: vec!["cpu.load".to_string()],
        }],
    })
    .unwrap()
}

struct ExecutionChannel(mpsc::UnboundedSender<ActionExecution>);

#[async_trait]
impl ActionExecutionListener for ExecutionChannel {
    async fn notify_action_executed(&self, execution: &ActionExecution) -> Result<()> {
        let _ = self.0.send(execution.clone());
        Ok(())
    }
}

#[derive(Default)]
struct AlarmLog(Mutex<Vec<Alarm>>);

#[async_trait]
impl AlarmListener for AlarmLog {
    async fn handle_alarm(&self, alarm: &Alarm) -> Result<()> {
        self.0.lock().unwrap().push(alarm.clone());
        Ok(())
    }
}

/// Plans one restart per alarm
struct RestartPlanner;

#[async_trait]
impl DecisionMaker for RestartPlanner {
    async fn setup_sla(&self, _sla: Option<&ServiceLevelAgreement>) -> Result<()> {
        Ok(())
    }

    async fn plan(&self, alarm: &Alarm) -> Result<Vec<Action>> {
        let target = alarm
            .metric
            .as_ref()
            .map(|m| m.resource_uri().to_string())
            .unwrap_or_default();
        Ok(vec![Action::new("restart").with_parameter("target", &target)])
    }
}

#[tokio::test]
async fn test_discovered_child_gets_sla_metric_with_both_listeners() {
    let coordinator = CoordinatorBuilder::new().build().await;
    coordinator
        .register_resource("/host1", "host", Parameters::new())
        .await
        .unwrap();
    coordinator.start_sla_validation(host_sla()).await.unwrap();

    let event =
        ResourceDiscoveryEvent::discovered("/host1").with_resource("cpu0", "cpu", Parameters::new());
    assert_eq!(coordinator.on_discovery_event(&event).await, 1);

    assert_eq!(
        coordinator.resource("/host1/cpu0").await.unwrap().parent.as_deref(),
        Some("/host1")
    );

    let metric = coordinator.create_metric("cpu.load", "/host1/cpu0");
    assert!(coordinator.is_metric_running(&metric).await);

    let listeners = coordinator.metric_listeners(&metric).await.unwrap();
    assert!(listeners
        .iter()
        .any(|l| same_listener(l, coordinator.cost_evaluator_listener())));
    assert!(listeners
        .iter()
        .any(|l| same_listener(l, coordinator.sla_validator_listener())));
}

#[tokio::test]
async fn test_discovery_without_sla_starts_nothing() {
    let coordinator = CoordinatorBuilder::new().build().await;
    coordinator
        .register_resource("/host1", "host", Parameters::new())
        .await
        .unwrap();

    let event =
        ResourceDiscoveryEvent::discovered("/host1").with_resource("cpu0", "cpu", Parameters::new());
    coordinator.on_discovery_event(&event).await;

    assert!(coordinator.is_registered("/host1/cpu0").await);
    assert!(coordinator.running_metrics().await.is_empty());
}

#[tokio::test]
async fn test_rule_action_executed_once_per_matching_value() {
    let coordinator = CoordinatorBuilder::new().build().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    coordinator
        .add_action_execution_listener(Arc::new(ExecutionChannel(tx)))
        .await;

    coordinator
        .register_resource("res1", "host", Parameters::new())
        .await
        .unwrap();
    coordinator
        .add_rule(
            Rule::new("threshold")
                .with_resource_uri("res1")
                .with_metric_uri("metricA")
                .with_condition("value > 10.0")
                .with_action(Action::new("scale.out")),
        )
        .await
        .unwrap();

    let metric = coordinator.create_metric("metricA", "res1");
    coordinator.start_metric(metric.clone()).await.unwrap();
    coordinator.publish_metric_value(&metric, 15.0).await.unwrap();
    coordinator.publish_metric_value(&metric, 5.0).await.unwrap();

    let execution = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.action.action_uri, "scale.out");
    assert!(execution.success);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "action ran more than once");
}

#[tokio::test]
async fn test_alarm_flows_through_decision_maker_to_executor() {
    let coordinator = CoordinatorBuilder::new()
        .decision_maker(Arc::new(RestartPlanner))
        .build()
        .await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    coordinator
        .add_action_execution_listener(Arc::new(ExecutionChannel(tx)))
        .await;

    coordinator
        .add_rule(Rule::new("any-high").with_condition("value > 100"))
        .await
        .unwrap();
    let metric = coordinator.create_metric("queue.depth", "/broker");
    coordinator.start_metric(metric.clone()).await.unwrap();
    coordinator.publish_metric_value(&metric, 500.0).await.unwrap();

    let execution = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.action.action_uri, "restart");
    assert_eq!(
        execution.action.parameters.get("target").map(String::as_str),
        Some("/broker")
    );
}

#[tokio::test]
async fn test_removed_alarm_listener_receives_nothing() {
    let coordinator = CoordinatorBuilder::new().build().await;
    let log = Arc::new(AlarmLog::default());
    let listener: Arc<dyn AlarmListener> = log.clone();

    coordinator.add_alarm_listener(listener.clone()).await;
    assert!(coordinator.remove_alarm_listener(&listener).await);

    coordinator
        .fire_alarm(&Alarm::new(mape::domain::AlarmSource::SlaViolation, "breach"))
        .await;
    coordinator
        .add_rule(Rule::new("everything"))
        .await
        .unwrap();
    let metric = coordinator.create_metric("m", "/r");
    coordinator.start_metric(metric.clone()).await.unwrap();
    coordinator.publish_metric_value(&metric, 1.0).await.unwrap();

    assert!(log.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_facade_preserves_error_contracts() {
    let coordinator = CoordinatorBuilder::new().build().await;
    let metric = coordinator.create_metric("m", "/r");

    assert!(matches!(
        coordinator.stop_metric(&metric).await,
        Err(MapeError::NotRunning { .. })
    ));
    assert!(matches!(
        coordinator.add_resource_parameters("/nope", Parameters::new()).await,
        Err(MapeError::NotRegistered(_))
    ));
    assert!(matches!(
        coordinator
            .register_child("/nope", "/nope/a", "x", Parameters::new())
            .await,
        Err(MapeError::NotRegistered(_))
    ));
    assert!(matches!(
        coordinator.remove_rule("ghost").await,
        Err(MapeError::RuleNotFound(_))
    ));
    assert!(matches!(
        coordinator.retrieve_current_sla().await,
        Err(MapeError::NoSla)
    ));
}
