//! The evaluation engine
//!
//! Repeated, randomized, timed executions of the matching algorithm per
//! metric configuration, with cross-repetition consistency validation,
//! noise-robust runtime averaging and confusion statistics that reconcile by
//! construction.

pub mod manager;
pub mod metric_evaluation;
pub mod result;
pub mod runtime;

pub use manager::{DocumentEvaluations, EvaluationManager, RUN_TIMEOUT};
pub use metric_evaluation::{ChannelOutcome, MetricEvaluation};
pub use result::ConfusionResult;
pub use runtime::{RuntimeSample, ThreadTimer};
