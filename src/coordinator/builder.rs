use std::sync::Arc;
use std::time::Duration;

use super::coordinator::Coordinator;
use super::wiring::{PlanningListener, RuleEngineSink};
use crate::config::AppConfig;
use crate::domain::DEFAULT_POLL_INTERVAL;
use crate::execution::{
    ActionExecutor, ActionHandler, LoggingActionHandler, OverflowPolicy, QueuedActionExecutor,
};
use crate::metrics::{
    DefaultMetricFactory, MetricFactory, MetricListener, MetricSource, MetricsManager,
    PushOnlySource,
};
use crate::registry::ResourceRegistry;
use crate::rules::{AlarmListener, RuleEngine};
use crate::sla::{
    CurrentCostEvaluator, DecisionMaker, Experimentator, NoExperiments, NoopDecisionMaker,
    RecordingCostEvaluator, RecordingSlaValidator, SlaValidator,
};

/// Assembles a coordinator from its collaborators.
///
/// Anything not supplied falls back to the passive implementations.
pub struct CoordinatorBuilder {
    source: Option<Arc<dyn MetricSource>>,
    factory: Option<Arc<dyn MetricFactory>>,
    executor: Option<Arc<dyn ActionExecutor>>,
    handler: Option<Arc<dyn ActionHandler>>,
    validator: Option<(Arc<dyn SlaValidator>, Arc<dyn MetricListener>)>,
    cost_evaluator: Option<(Arc<dyn CurrentCostEvaluator>, Arc<dyn MetricListener>)>,
    decision_maker: Option<Arc<dyn DecisionMaker>>,
    experimentator: Option<Arc<dyn Experimentator>>,
    poll_interval: Duration,
    queue_capacity: usize,
    overflow: OverflowPolicy,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            factory: None,
            executor: None,
            handler: None,
            validator: None,
            cost_evaluator: None,
            decision_maker: None,
            experimentator: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_capacity: 256,
            overflow: OverflowPolicy::Reject,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.metrics.default_poll_interval(),
            queue_capacity: config.actions.queue_capacity,
            overflow: config.actions.overflow,
            ..Self::new()
        }
    }

    pub fn metric_source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn metric_factory(mut self, factory: Arc<dyn MetricFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Replaces the built-in queued executor
    pub fn action_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Handler run by the built-in queued executor
    pub fn action_handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn sla_validator<V: SlaValidator + 'static>(mut self, validator: Arc<V>) -> Self {
        let listener: Arc<dyn MetricListener> = validator.clone();
        let validator: Arc<dyn SlaValidator> = validator;
        self.validator = Some((validator, listener));
        self
    }

    pub fn cost_evaluator<C: CurrentCostEvaluator + 'static>(mut self, evaluator: Arc<C>) -> Self {
        let listener: Arc<dyn MetricListener> = evaluator.clone();
        let evaluator: Arc<dyn CurrentCostEvaluator> = evaluator;
        self.cost_evaluator = Some((evaluator, listener));
        self
    }

    pub fn decision_maker(mut self, decision_maker: Arc<dyn DecisionMaker>) -> Self {
        self.decision_maker = Some(decision_maker);
        self
    }

    /// Runs the learning stage started by `Coordinator::start_learning`
    pub fn experimentator(mut self, experimentator: Arc<dyn Experimentator>) -> Self {
        self.experimentator = Some(experimentator);
        self
    }

    /// Must be awaited inside a tokio runtime; the default executor spawns its worker
    pub async fn build(self) -> Arc<Coordinator> {
        let executor: Arc<dyn ActionExecutor> = match self.executor {
            Some(executor) => executor,
            None => {
                let handler: Arc<dyn ActionHandler> = match self.handler {
                    Some(handler) => handler,
                    None => Arc::new(LoggingActionHandler),
                };
                Arc::new(QueuedActionExecutor::new(
                    handler,
                    self.queue_capacity,
                    self.overflow,
                ))
            }
        };
        let factory: Arc<dyn MetricFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(DefaultMetricFactory::new(self.poll_interval)),
        };
        let source: Arc<dyn MetricSource> = match self.source {
            Some(source) => source,
            None => Arc::new(PushOnlySource),
        };

        let (validator, validator_listener) = match self.validator {
            Some(pair) => pair,
            None => {
                let validator = Arc::new(RecordingSlaValidator::new());
                let pair: (Arc<dyn SlaValidator>, Arc<dyn MetricListener>) =
                    (validator.clone(), validator);
                pair
            }
        };
        let (cost_evaluator, cost_listener) = match self.cost_evaluator {
            Some(pair) => pair,
            None => {
                let evaluator = Arc::new(RecordingCostEvaluator::new());
                let pair: (Arc<dyn CurrentCostEvaluator>, Arc<dyn MetricListener>) =
                    (evaluator.clone(), evaluator);
                pair
            }
        };
        let decision_maker: Arc<dyn DecisionMaker> = match self.decision_maker {
            Some(decision_maker) => decision_maker,
            None => Arc::new(NoopDecisionMaker),
        };
        let experimentator: Arc<dyn Experimentator> = match self.experimentator {
            Some(experimentator) => experimentator,
            None => Arc::new(NoExperiments),
        };

        let registry = Arc::new(ResourceRegistry::new());
        let metrics = Arc::new(MetricsManager::new(source));
        let rules = Arc::new(RuleEngine::new(executor.clone()));

        metrics
            .add_default_listener(Arc::new(RuleEngineSink::new(registry.clone(), rules.clone())))
            .await;

        let planner: Arc<dyn AlarmListener> =
            Arc::new(PlanningListener::new(decision_maker.clone(), executor.clone()));
        rules.add_alarm_listener(planner.clone()).await;
        validator.add_alarm_listener(planner).await;

        Arc::new(Coordinator::from_parts(
            registry,
            metrics,
            rules,
            executor,
            factory,
            (validator, validator_listener),
            (cost_evaluator, cost_listener),
            decision_maker,
            experimentator,
        ))
    }
}
