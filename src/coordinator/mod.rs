//! Central management unit
//!
//! Composes the registry, metrics manager, rule engine and SLA triad into one
//! facade. Discovery agents push events through a `DiscoveryHandle`.

pub mod builder;
pub mod coordinator;
pub mod discovery;
mod wiring;

pub use builder::CoordinatorBuilder;
pub use coordinator::Coordinator;
pub use discovery::{DiscoveryEventType, DiscoveryHandle, ResourceDiscoveryEvent};
