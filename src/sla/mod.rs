//! SLA collaborators: validator, decision maker, cost evaluator and the
//! experimentator running the learning stage
//!
//! The coordinator only wires these together. The bundled implementations are
//! passive: they record what they see and never raise violations on their own.

pub mod passive;
pub mod traits;

pub use passive::{
    NoExperiments, NoopDecisionMaker, RecordingCostEvaluator, RecordingSlaValidator,
};
pub use traits::{
    CurrentCostEvaluator, DecisionMaker, Experimentator, LearningStageListener, SlaValidator,
};
