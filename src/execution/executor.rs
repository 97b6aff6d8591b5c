use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Action, ActionExecution};
use crate::error::Result;

/// Carries out submitted actions and reports their outcome
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Submit an action; returns the request id once it is accepted
    async fn execute_request(&self, action: Action) -> Result<Uuid>;

    async fn add_execution_listener(&self, listener: Arc<dyn ActionExecutionListener>) -> bool;

    async fn remove_execution_listener(&self, listener: &Arc<dyn ActionExecutionListener>)
        -> bool;
}

/// Receives the outcome of every executed action
#[async_trait]
pub trait ActionExecutionListener: Send + Sync {
    async fn notify_action_executed(&self, execution: &ActionExecution) -> Result<()>;
}

/// Performs a single action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, action: &Action) -> Result<()>;
}

/// Handler that only logs; used when no actuator is wired in
pub struct LoggingActionHandler;

#[async_trait]
impl ActionHandler for LoggingActionHandler {
    async fn handle(&self, action: &Action) -> Result<()> {
        info!(
            action = %action.action_uri,
            parameters = ?action.parameters,
            "executing action"
        );
        Ok(())
    }
}
