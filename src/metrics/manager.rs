use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::traits::{MetricListener, MetricSource, MetricsManagerListener};
use crate::domain::{ConfiguredMetric, MetricKey};
use crate::error::{MapeError, Result};
use crate::listener::ListenerSet;

type ValueListeners = Arc<RwLock<ListenerSet<dyn MetricListener>>>;

/// Shortest poll period accepted; tokio intervals reject zero
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// State of one started metric
struct RunningMetric {
    metric: ConfiguredMetric,
    listeners: ValueListeners,
    /// Dropping the sender ends the poll loop
    interval_tx: watch::Sender<Duration>,
}

/// Owns the running-metric set and its listener fan-out lists
pub struct MetricsManager {
    source: Arc<dyn MetricSource>,
    running: RwLock<HashMap<MetricKey, RunningMetric>>,
    /// Attached to every metric as it starts
    default_listeners: RwLock<ListenerSet<dyn MetricListener>>,
    manager_listeners: RwLock<ListenerSet<dyn MetricsManagerListener>>,
}

impl MetricsManager {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self {
            source,
            running: RwLock::new(HashMap::new()),
            default_listeners: RwLock::new(ListenerSet::new()),
            manager_listeners: RwLock::new(ListenerSet::new()),
        }
    }

    /// Start polling a metric
    pub async fn start(&self, metric: ConfiguredMetric) -> Result<()> {
        self.start_and_listen(metric, Vec::new()).await
    }

    /// Start a metric with its listeners already attached, so no value is
    /// emitted to an empty listener set.
    pub async fn start_and_listen(
        &self,
        metric: ConfiguredMetric,
        listeners: Vec<Arc<dyn MetricListener>>,
    ) -> Result<()> {
        {
            let mut running = self.running.write().await;
            if running.contains_key(metric.key()) {
                return Err(MapeError::already_running(&metric));
            }

            let mut set = ListenerSet::new();
            for listener in self.default_listeners.read().await.snapshot() {
                set.add(listener);
            }
            for listener in listeners {
                set.add(listener);
            }
            let listeners = Arc::new(RwLock::new(set));
            let (interval_tx, interval_rx) = watch::channel(metric.poll_interval());

            tokio::spawn(poll_loop(
                metric.clone(),
                self.source.clone(),
                listeners.clone(),
                interval_rx,
            ));

            running.insert(
                metric.key().clone(),
                RunningMetric {
                    metric: metric.clone(),
                    listeners,
                    interval_tx,
                },
            );
        }

        info!("Started metric {}", metric);
        self.notify_started(&[metric]).await;
        Ok(())
    }

    /// Stop a metric: end polling, tell its value listeners, tell manager
    /// listeners, then discard the value listeners.
    pub async fn stop(&self, metric: &ConfiguredMetric) -> Result<()> {
        let stopped = {
            let mut running = self.running.write().await;
            running
                .remove(metric.key())
                .ok_or_else(|| MapeError::not_running(metric))?
        };

        let RunningMetric {
            metric,
            listeners,
            interval_tx,
        } = stopped;
        drop(interval_tx);

        let value_listeners = std::mem::take(&mut *listeners.write().await);
        for listener in value_listeners.snapshot() {
            if let Err(e) = listener.notify_metric_stopped(&metric).await {
                warn!("Metric listener failed on stop of {}: {}", metric.key(), e);
            }
        }

        info!("Stopped metric {}", metric.key());
        self.notify_stopped(&[metric]).await;
        Ok(())
    }

    /// Stop every running metric
    pub async fn stop_all(&self) {
        let metrics = self.running_metrics().await;
        for metric in metrics {
            if let Err(e) = self.stop(&metric).await {
                debug!("Metric {} already gone during stop_all: {}", metric.key(), e);
            }
        }
    }

    pub async fn add_value_listener(
        &self,
        metric: &ConfiguredMetric,
        listener: Arc<dyn MetricListener>,
    ) -> Result<()> {
        let listeners = self.listeners_of(metric).await?;
        listeners.write().await.add(listener);
        Ok(())
    }

    /// Returns false if the metric is not running or the listener was absent
    pub async fn remove_value_listener(
        &self,
        metric: &ConfiguredMetric,
        listener: &Arc<dyn MetricListener>,
    ) -> bool {
        match self.listeners_of(metric).await {
            Ok(listeners) => listeners.write().await.remove(listener),
            Err(_) => false,
        }
    }

    /// Current value listeners of a running metric
    pub async fn value_listeners(
        &self,
        metric: &ConfiguredMetric,
    ) -> Result<Vec<Arc<dyn MetricListener>>> {
        let listeners = self.listeners_of(metric).await?;
        let snapshot = listeners.read().await.snapshot();
        Ok(snapshot)
    }

    /// Apply the poll interval carried by `metric` to the running instance
    pub async fn update_poll_interval(&self, metric: &ConfiguredMetric) -> Result<()> {
        let mut running = self.running.write().await;
        let entry = running
            .get_mut(metric.key())
            .ok_or_else(|| MapeError::not_running(metric))?;

        entry.metric.set_poll_interval(metric.poll_interval());
        entry.interval_tx.send_replace(metric.poll_interval());
        debug!(
            "Poll interval of {} set to {}ms",
            metric.key(),
            metric.poll_interval().as_millis()
        );
        Ok(())
    }

    pub async fn is_running(&self, metric: &ConfiguredMetric) -> bool {
        self.running.read().await.contains_key(metric.key())
    }

    /// Snapshot of all running metrics, sorted by identity
    pub async fn running_metrics(&self) -> Vec<ConfiguredMetric> {
        let running = self.running.read().await;
        let mut metrics: Vec<_> = running.values().map(|r| r.metric.clone()).collect();
        metrics.sort_by(|a, b| a.key().cmp(b.key()));
        metrics
    }

    /// Running metrics bound to one resource
    pub async fn metrics_for_resource(&self, resource_uri: &str) -> Vec<ConfiguredMetric> {
        self.running_metrics()
            .await
            .into_iter()
            .filter(|m| m.resource_uri() == resource_uri)
            .collect()
    }

    /// Deliver a pushed value to the metric's listeners
    pub async fn publish_value(&self, metric: &ConfiguredMetric, value: f64) -> Result<()> {
        let (metric, listeners) = {
            let running = self.running.read().await;
            let entry = running
                .get(metric.key())
                .ok_or_else(|| MapeError::not_running(metric))?;
            (entry.metric.clone(), entry.listeners.clone())
        };
        deliver(&metric, value, &listeners).await;
        Ok(())
    }

    /// Attach `listener` to every metric started from now on. Metrics that
    /// are already running are not affected.
    pub async fn add_default_listener(&self, listener: Arc<dyn MetricListener>) -> bool {
        self.default_listeners.write().await.add(listener)
    }

    pub async fn remove_default_listener(&self, listener: &Arc<dyn MetricListener>) -> bool {
        self.default_listeners.write().await.remove(listener)
    }

    pub async fn add_manager_listener(&self, listener: Arc<dyn MetricsManagerListener>) {
        self.manager_listeners.write().await.add(listener);
    }

    pub async fn remove_manager_listener(
        &self,
        listener: &Arc<dyn MetricsManagerListener>,
    ) -> bool {
        self.manager_listeners.write().await.remove(listener)
    }

    async fn listeners_of(&self, metric: &ConfiguredMetric) -> Result<ValueListeners> {
        let running = self.running.read().await;
        running
            .get(metric.key())
            .map(|r| r.listeners.clone())
            .ok_or_else(|| MapeError::not_running(metric))
    }

    async fn notify_started(&self, metrics: &[ConfiguredMetric]) {
        let listeners = self.manager_listeners.read().await.snapshot();
        for listener in listeners {
            if let Err(e) = listener.notify_metrics_started(metrics).await {
                warn!("Metrics manager listener failed on start: {}", e);
            }
        }
    }

    async fn notify_stopped(&self, metrics: &[ConfiguredMetric]) {
        let listeners = self.manager_listeners.read().await.snapshot();
        for listener in listeners {
            if let Err(e) = listener.notify_metrics_stopped(metrics).await {
                warn!("Metrics manager listener failed on stop: {}", e);
            }
        }
    }
}

async fn deliver(metric: &ConfiguredMetric, value: f64, listeners: &ValueListeners) {
    let snapshot = listeners.read().await.snapshot();
    for listener in snapshot {
        if let Err(e) = listener.notify_metric_value(metric, value).await {
            warn!("Metric listener failed for {}: {}", metric.key(), e);
        }
    }
}

fn ticker(period: Duration) -> time::Interval {
    let period = period.max(MIN_POLL_INTERVAL);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn poll_loop(
    mut metric: ConfiguredMetric,
    source: Arc<dyn MetricSource>,
    listeners: ValueListeners,
    mut interval_rx: watch::Receiver<Duration>,
) {
    let mut interval = ticker(*interval_rx.borrow_and_update());

    loop {
        tokio::select! {
            biased;

            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let period = *interval_rx.borrow_and_update();
                metric.set_poll_interval(period);
                interval = ticker(period);
            }
            _ = interval.tick() => {
                match source.sample(&metric).await {
                    Ok(Some(value)) => deliver(&metric, value, &listeners).await,
                    Ok(None) => {}
                    Err(e) => warn!("Sampling {} failed: {}", metric.key(), e),
                }
            }
        }
    }

    debug!("Poll loop for {} exited", metric.key());
}
