//! Rule/event engine
//!
//! Rules are compiled into matchers over the metric and measurement streams.
//! A match either submits the rule's action or fires an alarm.

pub mod engine;
pub mod query;

pub use engine::{check_rule, AlarmListener, RuleEngine};
pub use query::{build_query, parse_condition, CompiledQuery, Expr, Query, StreamKind};
