//! Benchmark harness for similarity metrics
//!
//! Evaluates pluggable string-similarity functions against a fixed ground
//! truth, selecting which function/threshold combination best reconstructs
//! block-level correspondences across document revisions. The evaluation
//! engine runs repeated, randomized, timed executions of a matching
//! algorithm per metric configuration and reports confusion statistics and
//! noise-averaged runtimes as CSV.

pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluation;
pub mod matcher;
pub mod metrics;
pub mod report;

pub use config::{Channel, MatcherConfig};
pub use error::BenchError;
pub use evaluation::EvaluationManager;
