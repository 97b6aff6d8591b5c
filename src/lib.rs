pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod execution;
pub mod listener;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod rules;
pub mod sla;

pub use config::AppConfig;
pub use coordinator::{
    Coordinator, CoordinatorBuilder, DiscoveryEventType, DiscoveryHandle, ResourceDiscoveryEvent,
};
pub use error::{MapeError, Result};
pub use execution::{
    ActionExecutionListener, ActionExecutor, ActionHandler, OverflowPolicy, QueuedActionExecutor,
};
pub use metrics::{MetricFactory, MetricListener, MetricSource, MetricsManager, MetricsManagerListener};
pub use registry::{ResourceListener, ResourceRegistry};
pub use rules::{AlarmListener, RuleEngine};
pub use sla::{
    CurrentCostEvaluator, DecisionMaker, Experimentator, LearningStageListener, SlaValidator,
};
