use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::executor::{ActionExecutionListener, ActionExecutor, ActionHandler};
use crate::domain::{Action, ActionExecution};
use crate::error::{MapeError, Result};
use crate::listener::ListenerSet;

/// What `execute_request` does when the queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Fail with `ActionQueueFull`
    #[default]
    Reject,
    /// Wait for a free slot
    Block,
}

type ExecutionListeners = Arc<RwLock<ListenerSet<dyn ActionExecutionListener>>>;

struct QueuedAction {
    request_id: Uuid,
    action: Action,
    submitted_at: DateTime<Utc>,
}

/// Bounded queue drained by one worker task
pub struct QueuedActionExecutor {
    tx: mpsc::Sender<QueuedAction>,
    policy: OverflowPolicy,
    listeners: ExecutionListeners,
}

impl QueuedActionExecutor {
    /// Spawn the worker; must be called inside a tokio runtime.
    /// The worker exits once the executor is dropped and the queue is drained.
    pub fn new(handler: Arc<dyn ActionHandler>, capacity: usize, policy: OverflowPolicy) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let listeners: ExecutionListeners = Arc::new(RwLock::new(ListenerSet::new()));

        tokio::spawn(run_worker(rx, handler, listeners.clone()));
        info!(
            capacity = capacity.max(1),
            policy = ?policy,
            "action executor started"
        );

        Self {
            tx,
            policy,
            listeners,
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Number of free queue slots
    pub fn available_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

#[async_trait]
impl ActionExecutor for QueuedActionExecutor {
    async fn execute_request(&self, action: Action) -> Result<Uuid> {
        let request_id = Uuid::new_v4();
        let uri = action.action_uri.clone();
        let queued = QueuedAction {
            request_id,
            action,
            submitted_at: Utc::now(),
        };

        match self.policy {
            OverflowPolicy::Reject => self.tx.try_send(queued).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => MapeError::ActionQueueFull(uri.clone()),
                mpsc::error::TrySendError::Closed(_) => {
                    MapeError::ChannelClosed("action queue".into())
                }
            })?,
            OverflowPolicy::Block => self
                .tx
                .send(queued)
                .await
                .map_err(|_| MapeError::ChannelClosed("action queue".into()))?,
        }

        debug!(%request_id, action = %uri, "action queued");
        Ok(request_id)
    }

    async fn add_execution_listener(&self, listener: Arc<dyn ActionExecutionListener>) -> bool {
        self.listeners.write().await.add(listener)
    }

    async fn remove_execution_listener(
        &self,
        listener: &Arc<dyn ActionExecutionListener>,
    ) -> bool {
        self.listeners.write().await.remove(listener)
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<QueuedAction>,
    handler: Arc<dyn ActionHandler>,
    listeners: ExecutionListeners,
) {
    while let Some(queued) = rx.recv().await {
        let outcome = handler.handle(&queued.action).await;
        if let Err(e) = &outcome {
            warn!(
                request_id = %queued.request_id,
                action = %queued.action.action_uri,
                error = %e,
                "action failed"
            );
        }

        let execution = ActionExecution {
            request_id: queued.request_id,
            action: queued.action,
            success: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            submitted_at: queued.submitted_at,
            finished_at: Utc::now(),
        };

        let snapshot = listeners.read().await.snapshot();
        for listener in snapshot {
            if let Err(e) = listener.notify_action_executed(&execution).await {
                warn!(request_id = %execution.request_id, error = %e, "execution listener failed");
            }
        }
    }
    debug!("action worker exited");
}
