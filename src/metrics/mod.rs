//! Metric Lifecycle Manager
//!
//! Starts and stops metric instances bound to (metric kind, resource) pairs,
//! polls their values on tokio tasks and fans values out to listeners.

pub mod manager;
pub mod traits;

pub use manager::MetricsManager;
pub use traits::{
    DefaultMetricFactory, MetricFactory, MetricListener, MetricSource, MetricsManagerListener,
    PushOnlySource,
};
