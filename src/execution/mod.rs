//! Action execution
//!
//! Rules and the decision maker submit actions without waiting for them.
//! `QueuedActionExecutor` runs them on a worker task and publishes each outcome.

pub mod executor;
pub mod queue;

pub use executor::{ActionExecutionListener, ActionExecutor, ActionHandler, LoggingActionHandler};
pub use queue::{OverflowPolicy, QueuedActionExecutor};

#[cfg(test)]
pub use executor::MockActionExecutor;
