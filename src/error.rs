//! Error taxonomy for the benchmark harness
//!
//! Fatal conditions are typed so callers can tell a broken corpus
//! (`Configuration`) apart from a broken matching algorithm (`Consistency`)
//! and from a broken scheduler (`Scheduling`). Degenerate input ("too short
//! to score") is deliberately NOT an error: it is a recorded outcome.

use std::time::Duration;
use thiserror::Error;

/// Fatal benchmark errors. None of these are retried: a consistency or
/// measurement failure would only be hidden by retrying.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The corpus or metric selection is inconsistent; no run is attempted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Correctness results changed between repetitions, or the confusion
    /// counts do not reconcile with the possible-connection count.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Repetition counter desynchronization between caller and evaluation.
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// The run did not complete within the allowed time; partial output is
    /// not reported.
    #[error("evaluation run timed out after {0:?}")]
    Timeout(Duration),

    /// A worker was cancelled because another worker failed.
    #[error("evaluation cancelled")]
    Cancelled,
}
