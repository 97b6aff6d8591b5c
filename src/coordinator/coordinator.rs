//! Coordinator: central management unit of the MAPE loop
//!
//! Owns the registry, the metrics manager, the rule engine and the SLA triad,
//! and is the only entry point external collaborators use. `run()` drains
//! discovery events with `tokio::select!` until shutdown.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::discovery::{DiscoveryEventType, ResourceDiscoveryEvent};
use crate::domain::{
    Action, Alarm, ConfiguredMetric, MeasurementEvent, MetricEvent, Parameters, Resource, Rule,
    ServiceLevelAgreement,
};
use crate::error::{MapeError, Result};
use crate::execution::{ActionExecutionListener, ActionExecutor};
use crate::metrics::{MetricFactory, MetricListener, MetricsManager, MetricsManagerListener};
use crate::registry::{ResourceListener, ResourceRegistry};
use crate::rules::{AlarmListener, RuleEngine};
use crate::sla::{
    CurrentCostEvaluator, DecisionMaker, Experimentator, LearningStageListener, SlaValidator,
};

/// Active SLA and the validation flag; the mutex serializes SLA (re)configuration
/// and discovery-triggered metric starts
#[derive(Default)]
struct SlaState {
    current: Option<ServiceLevelAgreement>,
    running: bool,
}

pub struct Coordinator {
    registry: Arc<ResourceRegistry>,
    metrics: Arc<MetricsManager>,
    rules: Arc<RuleEngine>,
    executor: Arc<dyn ActionExecutor>,
    factory: Arc<dyn MetricFactory>,
    sla_validator: Arc<dyn SlaValidator>,
    /// Same object as `sla_validator`, as registered with metrics
    validator_listener: Arc<dyn MetricListener>,
    cost_evaluator: Arc<dyn CurrentCostEvaluator>,
    cost_listener: Arc<dyn MetricListener>,
    decision_maker: Arc<dyn DecisionMaker>,
    experimentator: Arc<dyn Experimentator>,
    sla: Mutex<SlaState>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        registry: Arc<ResourceRegistry>,
        metrics: Arc<MetricsManager>,
        rules: Arc<RuleEngine>,
        executor: Arc<dyn ActionExecutor>,
        factory: Arc<dyn MetricFactory>,
        (sla_validator, validator_listener): (Arc<dyn SlaValidator>, Arc<dyn MetricListener>),
        (cost_evaluator, cost_listener): (Arc<dyn CurrentCostEvaluator>, Arc<dyn MetricListener>),
        decision_maker: Arc<dyn DecisionMaker>,
        experimentator: Arc<dyn Experimentator>,
    ) -> Self {
        Self {
            registry,
            metrics,
            rules,
            executor,
            factory,
            sla_validator,
            validator_listener,
            cost_evaluator,
            cost_listener,
            decision_maker,
            experimentator,
            sla: Mutex::new(SlaState::default()),
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsManager> {
        &self.metrics
    }

    pub fn rule_engine(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    pub fn sla_validator(&self) -> &Arc<dyn SlaValidator> {
        &self.sla_validator
    }

    pub fn cost_evaluator(&self) -> &Arc<dyn CurrentCostEvaluator> {
        &self.cost_evaluator
    }

    /// The validator as it appears in metric listener sets
    pub fn sla_validator_listener(&self) -> &Arc<dyn MetricListener> {
        &self.validator_listener
    }

    /// The cost evaluator as it appears in metric listener sets
    pub fn cost_evaluator_listener(&self) -> &Arc<dyn MetricListener> {
        &self.cost_listener
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Register under the URI's parent when that parent is registered,
    /// otherwise as a root
    pub async fn register_resource(
        &self,
        uri: &str,
        resource_type: &str,
        parameters: Parameters,
    ) -> Result<()> {
        self.registry
            .register_resource(uri, resource_type, parameters)
            .await
    }

    pub async fn register_child(
        &self,
        parent: &str,
        uri: &str,
        resource_type: &str,
        parameters: Parameters,
    ) -> Result<()> {
        self.registry
            .register_child(parent, uri, resource_type, parameters)
            .await
    }

    pub async fn add_resource_parameters(&self, uri: &str, parameters: Parameters) -> Result<()> {
        self.registry.add_parameters(uri, parameters).await
    }

    pub async fn set_resource_capabilities(&self, uri: &str, capabilities: Vec<String>) -> Result<()> {
        self.registry.set_capabilities(uri, capabilities).await
    }

    /// Unregister a resource and stop the metrics still running on it
    pub async fn unregister_resource(&self, uri: &str) -> Result<()> {
        self.registry.unregister(uri).await?;

        for metric in self.metrics.metrics_for_resource(uri).await {
            if let Err(e) = self.metrics.stop(&metric).await {
                debug!("Metric {} already stopped: {}", metric.key(), e);
            }
        }
        Ok(())
    }

    pub async fn is_registered(&self, uri: &str) -> bool {
        self.registry.is_registered(uri).await
    }

    pub async fn all_registered(&self) -> Vec<String> {
        self.registry.all_registered().await
    }

    pub async fn resource_type(&self, uri: &str) -> Result<String> {
        self.registry.type_of(uri).await
    }

    pub async fn resource_capabilities(&self, uri: &str) -> Result<Vec<String>> {
        self.registry.capabilities_of(uri).await
    }

    pub async fn resource(&self, uri: &str) -> Result<Resource> {
        self.registry.resource(uri).await
    }

    pub async fn add_resource_listener(&self, listener: Arc<dyn ResourceListener>) {
        self.registry.add_listener(listener).await
    }

    pub async fn remove_resource_listener(&self, listener: &Arc<dyn ResourceListener>) -> bool {
        self.registry.remove_listener(listener).await
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    pub fn create_metric(&self, metric_uri: &str, resource_uri: &str) -> ConfiguredMetric {
        self.factory.create_metric(metric_uri, resource_uri)
    }

    pub async fn start_metric(&self, metric: ConfiguredMetric) -> Result<()> {
        self.metrics.start(metric).await
    }

    pub async fn start_metric_and_listen(
        &self,
        metric: ConfiguredMetric,
        listeners: Vec<Arc<dyn MetricListener>>,
    ) -> Result<()> {
        self.metrics.start_and_listen(metric, listeners).await
    }

    pub async fn stop_metric(&self, metric: &ConfiguredMetric) -> Result<()> {
        self.metrics.stop(metric).await
    }

    pub async fn add_metric_listener(
        &self,
        metric: &ConfiguredMetric,
        listener: Arc<dyn MetricListener>,
    ) -> Result<()> {
        self.metrics.add_value_listener(metric, listener).await
    }

    pub async fn remove_metric_listener(
        &self,
        metric: &ConfiguredMetric,
        listener: &Arc<dyn MetricListener>,
    ) -> bool {
        self.metrics.remove_value_listener(metric, listener).await
    }

    pub async fn metric_listeners(
        &self,
        metric: &ConfiguredMetric,
    ) -> Result<Vec<Arc<dyn MetricListener>>> {
        self.metrics.value_listeners(metric).await
    }

    pub async fn update_metric_poll_interval(&self, metric: &ConfiguredMetric) -> Result<()> {
        self.metrics.update_poll_interval(metric).await
    }

    pub async fn is_metric_running(&self, metric: &ConfiguredMetric) -> bool {
        self.metrics.is_running(metric).await
    }

    pub async fn running_metrics(&self) -> Vec<ConfiguredMetric> {
        self.metrics.running_metrics().await
    }

    pub async fn publish_metric_value(&self, metric: &ConfiguredMetric, value: f64) -> Result<()> {
        self.metrics.publish_value(metric, value).await
    }

    pub async fn add_metrics_manager_listener(&self, listener: Arc<dyn MetricsManagerListener>) {
        self.metrics.add_manager_listener(listener).await
    }

    pub async fn remove_metrics_manager_listener(
        &self,
        listener: &Arc<dyn MetricsManagerListener>,
    ) -> bool {
        self.metrics.remove_manager_listener(listener).await
    }

    // ------------------------------------------------------------------
    // Rules and alarms
    // ------------------------------------------------------------------

    pub async fn add_rule(&self, rule: Rule) -> Result<()> {
        self.rules.add_rule(rule).await
    }

    pub async fn remove_rule(&self, name: &str) -> Result<Rule> {
        self.rules.remove_rule(name).await
    }

    pub async fn clear_rules(&self) -> usize {
        self.rules.clear_rules().await
    }

    pub async fn rules(&self) -> Vec<Rule> {
        self.rules.rules().await
    }

    pub async fn process_metric_event(&self, event: &MetricEvent) -> usize {
        self.rules.process_metric_event(event).await
    }

    pub async fn process_measurement_event(&self, event: &MeasurementEvent) -> usize {
        self.rules.process_measurement_event(event).await
    }

    pub async fn fire_alarm(&self, alarm: &Alarm) -> usize {
        self.rules.fire_alarm(alarm).await
    }

    /// Subscribe to rule alarms and SLA violations
    pub async fn add_alarm_listener(&self, listener: Arc<dyn AlarmListener>) {
        self.rules.add_alarm_listener(listener.clone()).await;
        self.sla_validator.add_alarm_listener(listener).await;
    }

    pub async fn remove_alarm_listener(&self, listener: &Arc<dyn AlarmListener>) -> bool {
        let from_rules = self.rules.remove_alarm_listener(listener).await;
        let from_validator = self.sla_validator.remove_alarm_listener(listener).await;
        from_rules || from_validator
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    pub async fn execute_action(&self, action: Action) -> Result<Uuid> {
        self.executor.execute_request(action).await
    }

    pub async fn add_action_execution_listener(&self, listener: Arc<dyn ActionExecutionListener>) -> bool {
        self.executor.add_execution_listener(listener).await
    }

    pub async fn remove_action_execution_listener(
        &self,
        listener: &Arc<dyn ActionExecutionListener>,
    ) -> bool {
        self.executor.remove_execution_listener(listener).await
    }

    // ------------------------------------------------------------------
    // SLA lifecycle
    // ------------------------------------------------------------------

    pub async fn start_sla_validation(&self, sla: ServiceLevelAgreement) -> Result<()> {
        let mut state = self.sla.lock().await;
        if state.running {
            return Err(MapeError::SlaAlreadyRunning);
        }

        info!("Starting SLA validation: {}", sla);
        state.running = true;
        self.configure(&sla).await;
        state.current = Some(sla);
        info!("SLA validation started");
        Ok(())
    }

    /// Replace the active SLA, tearing the old one down first. Starts
    /// validation when none is running.
    pub async fn update_sla(&self, sla: ServiceLevelAgreement) -> Result<()> {
        let mut state = self.sla.lock().await;
        info!("Updating SLA: {}", sla);

        match (state.running, state.current.take()) {
            (true, Some(old)) => self.unconfigure(&old).await,
            _ => info!("No SLA running, configuring the received one"),
        }

        self.configure(&sla).await;
        state.current = Some(sla);
        state.running = true;
        info!("SLA updated");
        Ok(())
    }

    pub async fn stop_sla_validation(&self) -> Result<()> {
        let mut state = self.sla.lock().await;
        if !state.running {
            return Err(MapeError::SlaNotRunning);
        }

        if let Some(old) = state.current.take() {
            self.unconfigure(&old).await;
        }
        state.running = false;
        info!("SLA validation stopped");
        Ok(())
    }

    /// Run the experimentator's initial learning stage; `listener` hears when
    /// it is over
    pub async fn start_learning(&self, listener: Arc<dyn LearningStageListener>) -> Result<()> {
        info!("Starting learning stage");
        self.experimentator.execute_initial_learning(listener).await
    }

    pub async fn is_sla_validation_running(&self) -> bool {
        self.sla.lock().await.running
    }

    pub async fn retrieve_current_sla(&self) -> Result<ServiceLevelAgreement> {
        self.sla.lock().await.current.clone().ok_or(MapeError::NoSla)
    }

    /// Push the SLA into the triad, then start every prescribed metric on the
    /// registered resources it covers
    async fn configure(&self, sla: &ServiceLevelAgreement) {
        self.setup_triad(Some(sla)).await;

        let registered = self.registry.all_registered().await;
        for pattern in sla.patterns() {
            for uri in registered.iter().filter(|uri| pattern.matches(uri)) {
                match self
                    .registry
                    .register_resource(uri, pattern.resource_type(), pattern.parameters().clone())
                    .await
                {
                    Ok(()) | Err(MapeError::AlreadyRegistered(_)) => {}
                    Err(e) => warn!("Could not register {} for SLA: {}", uri, e),
                }

                for metric_uri in pattern.metrics() {
                    self.start_sla_metric(self.factory.create_metric(metric_uri, uri))
                        .await;
                }
            }
        }
    }

    /// Clear the triad's SLA, detach the SLA listeners and stop every metric
    /// the SLA prescribed
    async fn unconfigure(&self, sla: &ServiceLevelAgreement) {
        self.setup_triad(None).await;

        let registered = self.registry.all_registered().await;
        for pattern in sla.patterns() {
            for uri in registered.iter().filter(|uri| pattern.matches(uri)) {
                for metric_uri in pattern.metrics() {
                    let metric = self.factory.create_metric(metric_uri, uri);
                    self.metrics
                        .remove_value_listener(&metric, &self.cost_listener)
                        .await;
                    self.metrics
                        .remove_value_listener(&metric, &self.validator_listener)
                        .await;

                    match self.metrics.stop(&metric).await {
                        Ok(()) => {}
                        Err(MapeError::NotRunning { .. }) => {
                            debug!("SLA metric {} was not running", metric.key())
                        }
                        Err(e) => warn!("Could not stop SLA metric {}: {}", metric.key(), e),
                    }
                }
            }
        }
    }

    async fn setup_triad(&self, sla: Option<&ServiceLevelAgreement>) {
        if let Err(e) = self.cost_evaluator.setup_sla(sla).await {
            error!("Cost evaluator rejected SLA setup: {}", e);
        }
        if let Err(e) = self.sla_validator.setup_sla(sla).await {
            error!("SLA validator rejected SLA setup: {}", e);
        }
        if let Err(e) = self.decision_maker.setup_sla(sla).await {
            error!("Decision maker rejected SLA setup: {}", e);
        }
    }

    /// Start a metric with the cost evaluator and validator attached. A metric
    /// that is already running gets the two listeners added instead.
    async fn start_sla_metric(&self, metric: ConfiguredMetric) {
        let listeners = vec![self.cost_listener.clone(), self.validator_listener.clone()];
        match self.metrics.start_and_listen(metric.clone(), listeners).await {
            Ok(()) => {}
            Err(MapeError::AlreadyRunning { .. }) => {
                for listener in [&self.cost_listener, &self.validator_listener] {
                    if let Err(e) = self.metrics.add_value_listener(&metric, listener.clone()).await {
                        warn!("Could not attach SLA listener to {}: {}", metric.key(), e);
                    }
                }
            }
            Err(e) => warn!("Could not start SLA metric {}: {}", metric.key(), e),
        }
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Let a discovery agent follow the resource tree (replay, then live events)
    pub async fn attach_discovery_agent(&self, agent: Arc<dyn ResourceListener>) {
        info!("Attaching resource discovery agent");
        self.registry.add_listener(agent).await
    }

    pub async fn detach_discovery_agent(&self, agent: &Arc<dyn ResourceListener>) -> bool {
        self.registry.remove_listener(agent).await
    }

    /// Apply one discovery event; per-resource failures are logged and the
    /// rest of the batch continues. Returns the number of resources applied.
    pub async fn on_discovery_event(&self, event: &ResourceDiscoveryEvent) -> usize {
        match event.event_type {
            DiscoveryEventType::NewResourcesDiscovered => self.on_resources_discovered(event).await,
            DiscoveryEventType::ResourcesRemoved => self.on_resources_removed(event).await,
        }
    }

    async fn on_resources_discovered(&self, event: &ResourceDiscoveryEvent) -> usize {
        let mut applied = 0;
        for resource in &event.resources {
            let uri = event.resolve_uri(resource);
            let resource_type = event
                .resource_types
                .get(resource)
                .cloned()
                .unwrap_or_default();
            let properties = event
                .resource_properties
                .get(resource)
                .cloned()
                .unwrap_or_default();

            if let Err(e) = self
                .registry
                .register_child(&event.parent_uri, &uri, &resource_type, properties)
                .await
            {
                error!(
                    "Discovered resource {} under {} not registered: {}",
                    uri, event.parent_uri, e
                );
                continue;
            }
            applied += 1;

            let state = self.sla.lock().await;
            if let (true, Some(sla)) = (state.running, state.current.as_ref()) {
                for pattern in sla.patterns_matching(&uri) {
                    for metric_uri in pattern.metrics() {
                        self.start_sla_metric(self.factory.create_metric(metric_uri, &uri))
                            .await;
                    }
                }
            }
        }
        applied
    }

    async fn on_resources_removed(&self, event: &ResourceDiscoveryEvent) -> usize {
        let mut applied = 0;
        for resource in &event.resources {
            let uri = event.resolve_uri(resource);
            match self.unregister_resource(&uri).await {
                Ok(()) => applied += 1,
                Err(e) => error!("Removed resource {} not unregistered: {}", uri, e),
            }
        }
        applied
    }

    /// Main loop: apply discovery events until shutdown or until every
    /// discovery handle is dropped
    pub async fn run(
        &self,
        mut discovery_rx: mpsc::Receiver<ResourceDiscoveryEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("coordinator starting main loop");

        loop {
            tokio::select! {
                event = discovery_rx.recv() => match event {
                    Some(event) => {
                        let applied = self.on_discovery_event(&event).await;
                        debug!(
                            "Discovery event under {} applied to {}/{} resources",
                            event.parent_uri,
                            applied,
                            event.resources.len()
                        );
                    }
                    None => {
                        info!("coordinator: discovery channel closed");
                        break;
                    }
                },

                _ = shutdown_rx.recv() => {
                    info!("coordinator: shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
        info!("coordinator: main loop exited");
    }

    /// Stop SLA validation and every running metric
    pub async fn shutdown(&self) {
        if let Err(e) = self.stop_sla_validation().await {
            debug!("No SLA to stop on shutdown: {}", e);
        }
        self.metrics.stop_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorBuilder;
    use crate::domain::{
        AlarmSource, ResourceEvent, ResourceEventKind, SlaDefinition, SlaPatternDefinition,
    };
    use crate::listener::same_listener;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn sla(name: &str, patterns: &[(&str, &str, &[&str])]) -> ServiceLevelAgreement {
        ServiceLevelAgreement::new(SlaDefinition {
            name: name.to_string(),
            patterns: patterns
                .iter()
                .map(|(pattern, resource_type, metrics)| SlaPatternDefinition {
                    pattern: pattern.to_string(),
                    resource_type: resource_type.to_string(),
                    parameters: Parameters::new(),
                    metrics: metrics.iter().map(|m| m.to_string()).collect(),
                })
                .collect(),
        })
        .unwrap()
    }

    #[derive(Default)]
    struct RecordingAgent {
        events: StdMutex<Vec<(ResourceEventKind, String)>>,
    }

    #[async_trait]
    impl ResourceListener for RecordingAgent {
        async fn process_event(&self, event: &ResourceEvent) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((event.kind, event.uri.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingAlarms {
        alarms: StdMutex<Vec<Alarm>>,
    }

    #[async_trait]
    impl AlarmListener for RecordingAlarms {
        async fn handle_alarm(&self, alarm: &Alarm) -> Result<()> {
            self.alarms.lock().unwrap().push(alarm.clone());
            Ok(())
        }
    }

    async fn coordinator() -> Arc<Coordinator> {
        CoordinatorBuilder::new().build().await
    }

    #[tokio::test]
    async fn test_register_resource_detects_parent() {
        let coordinator = coordinator().await;
        assert_ok!(coordinator.register_resource("/host1", "host", Parameters::new()).await);
        assert_ok!(
            coordinator
                .register_resource("/host1/cpu0", "cpu", Parameters::new())
                .await
        );

        let host = coordinator.resource("/host1").await.unwrap();
        assert_eq!(host.children, vec!["/host1/cpu0".to_string()]);
        assert!(matches!(
            coordinator.register_resource("/host1", "host", Parameters::new()).await,
            Err(MapeError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_start_sla_on_registered_resources() {
        let coordinator = coordinator().await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();
        coordinator
            .register_resource("/host1/cpu0", "cpu", Parameters::new())
            .await
            .unwrap();

        coordinator
            .start_sla_validation(sla("gold", &[("/host1/.*", "cpu", &["cpu.load"])]))
            .await
            .unwrap();

        let metric = coordinator.create_metric("cpu.load", "/host1/cpu0");
        assert!(coordinator.is_metric_running(&metric).await);
        assert_eq!(coordinator.running_metrics().await.len(), 1);
        assert_eq!(coordinator.retrieve_current_sla().await.unwrap().name(), "gold");
    }

    #[tokio::test]
    async fn test_stop_sla_stops_its_metrics() {
        let coordinator = coordinator().await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();
        coordinator
            .start_sla_validation(sla("gold", &[("/host1", "host", &["mem.used", "net.rx"])]))
            .await
            .unwrap();
        assert_eq!(coordinator.running_metrics().await.len(), 2);

        coordinator.stop_sla_validation().await.unwrap();
        assert!(coordinator.running_metrics().await.is_empty());
        assert!(!coordinator.is_sla_validation_running().await);
        assert!(matches!(
            coordinator.retrieve_current_sla().await,
            Err(MapeError::NoSla)
        ));
        assert!(matches!(
            coordinator.stop_sla_validation().await,
            Err(MapeError::SlaNotRunning)
        ));
    }

    #[tokio::test]
    async fn test_update_without_running_sla_starts_validation() {
        let coordinator = coordinator().await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();

        coordinator
            .update_sla(sla("silver", &[("/host1", "host", &["mem.used"])]))
            .await
            .unwrap();
        assert!(coordinator.is_sla_validation_running().await);
        assert_eq!(coordinator.running_metrics().await.len(), 1);
    }

    #[tokio::test]
    async fn test_sla_metric_already_running_gets_listeners() {
        let coordinator = coordinator().await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();
        let metric = coordinator.create_metric("mem.used", "/host1");
        coordinator.start_metric(metric.clone()).await.unwrap();

        coordinator
            .start_sla_validation(sla("gold", &[("/host1", "host", &["mem.used"])]))
            .await
            .unwrap();

        let listeners = coordinator.metric_listeners(&metric).await.unwrap();
        assert!(listeners
            .iter()
            .any(|l| same_listener(l, coordinator.sla_validator_listener())));
        assert!(listeners
            .iter()
            .any(|l| same_listener(l, coordinator.cost_evaluator_listener())));
    }

    #[tokio::test]
    async fn test_discovery_with_unknown_parent_keeps_batch_going() {
        let coordinator = coordinator().await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();

        let orphan = ResourceDiscoveryEvent::discovered("/ghost").with_resource(
            "cpu0",
            "cpu",
            Parameters::new(),
        );
        assert_eq!(coordinator.on_discovery_event(&orphan).await, 0);
        assert!(!coordinator.is_registered("/ghost/cpu0").await);

        let batch = ResourceDiscoveryEvent::discovered("/host1")
            .with_resource("/host1", "host", Parameters::new())
            .with_resource("cpu1", "cpu", Parameters::new());
        assert_eq!(coordinator.on_discovery_event(&batch).await, 1);
        assert_eq!(
            coordinator.resource_type("/host1/cpu1").await.unwrap(),
            "cpu"
        );
    }

    #[tokio::test]
    async fn test_resources_removed_event_stops_metrics() {
        let coordinator = coordinator().await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();
        coordinator
            .start_sla_validation(sla("gold", &[("/host1/.*", "cpu", &["cpu.load"])]))
            .await
            .unwrap();
        coordinator
            .on_discovery_event(
                &ResourceDiscoveryEvent::discovered("/host1").with_resource(
                    "cpu0",
                    "cpu",
                    Parameters::new(),
                ),
            )
            .await;
        assert_eq!(coordinator.running_metrics().await.len(), 1);

        let removed = ResourceDiscoveryEvent::removed("/host1", &["cpu0", "cpu9"]);
        assert_eq!(coordinator.on_discovery_event(&removed).await, 1);
        assert!(!coordinator.is_registered("/host1/cpu0").await);
        assert!(coordinator.running_metrics().await.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_agent_sees_replay_then_live() {
        let coordinator = coordinator().await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();

        let agent = Arc::new(RecordingAgent::default());
        let as_dyn: Arc<dyn ResourceListener> = agent.clone();
        coordinator.attach_discovery_agent(as_dyn.clone()).await;
        coordinator
            .register_resource("/host2", "host", Parameters::new())
            .await
            .unwrap();
        assert!(coordinator.detach_discovery_agent(&as_dyn).await);
        coordinator
            .register_resource("/host3", "host", Parameters::new())
            .await
            .unwrap();

        assert_eq!(
            agent.events.lock().unwrap().clone(),
            vec![
                (ResourceEventKind::Initial, "/host1".to_string()),
                (ResourceEventKind::Added, "/host2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_published_value_reaches_rules_with_resource_type() {
        let coordinator = coordinator().await;
        let alarms = Arc::new(RecordingAlarms::default());
        coordinator.add_alarm_listener(alarms.clone()).await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();
        coordinator
            .add_rule(
                Rule::new("busy-host")
                    .with_resource_type_uri("host")
                    .with_condition("value >= 0.9"),
            )
            .await
            .unwrap();

        let metric = coordinator.create_metric("cpu.load", "/host1");
        coordinator.start_metric(metric.clone()).await.unwrap();
        coordinator.publish_metric_value(&metric, 0.95).await.unwrap();
        coordinator.publish_metric_value(&metric, 0.10).await.unwrap();

        let alarms = alarms.alarms.lock().unwrap();
        assert_eq!(alarms.len(), 1);
        assert_eq!(
            alarms[0].source,
            AlarmSource::Rule {
                name: "busy-host".to_string()
            }
        );
        assert_eq!(alarms[0].metric.as_ref(), Some(&metric));
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let coordinator = coordinator().await;
        coordinator
            .register_resource("/host1", "host", Parameters::new())
            .await
            .unwrap();

        let (handle, rx) = crate::coordinator::DiscoveryHandle::channel(8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(rx, shutdown_rx).await })
        };

        handle
            .publish(ResourceDiscoveryEvent::discovered("/host1").with_resource(
                "disk0",
                "disk",
                Parameters::new(),
            ))
            .await
            .unwrap();

        // events are applied in order, so wait for the registration to land
        tokio::time::timeout(Duration::from_secs(2), async {
            while !coordinator.is_registered("/host1/disk0").await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[derive(Default)]
    struct LearningDone {
        finished: AtomicUsize,
    }

    #[async_trait]
    impl LearningStageListener for LearningDone {
        async fn learning_stage_finished(&self) -> Result<()> {
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingExperimentator {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Experimentator for CountingExperimentator {
        async fn execute_initial_learning(
            &self,
            listener: Arc<dyn LearningStageListener>,
        ) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            listener.learning_stage_finished().await
        }
    }

    #[tokio::test]
    async fn test_start_learning_without_experiments_finishes() {
        let coordinator = coordinator().await;
        let listener = Arc::new(LearningDone::default());

        assert_ok!(coordinator.start_learning(listener.clone()).await);
        assert_eq!(listener.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_learning_runs_configured_experimentator() {
        let experimentator = Arc::new(CountingExperimentator::default());
        let coordinator = CoordinatorBuilder::new()
            .experimentator(experimentator.clone())
            .build()
            .await;
        let listener = Arc::new(LearningDone::default());

        assert_ok!(coordinator.start_learning(listener.clone()).await);
        assert_eq!(experimentator.runs.load(Ordering::SeqCst), 1);
        assert_eq!(listener.finished.load(Ordering::SeqCst), 1);
    }
}
