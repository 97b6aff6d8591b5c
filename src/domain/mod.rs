pub mod action;
pub mod alarm;
pub mod event;
pub mod metric;
pub mod pattern;
pub mod resource;
pub mod rule;
pub mod sla;

pub use action::*;
pub use alarm::*;
pub use event::*;
pub use metric::*;
pub use pattern::*;
pub use resource::*;
pub use rule::*;
pub use sla::*;
