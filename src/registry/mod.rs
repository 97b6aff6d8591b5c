//! Resource Registry
//!
//! In-memory tree of managed resources keyed by URI, with listener fan-out for
//! structural changes. New listeners get every registered resource replayed as
//! an `Initial` event before any live event reaches them.

pub mod registry;

pub use registry::{ResourceListener, ResourceRegistry};
