//! Similarity-metric library and registry
//!
//! Metrics are named function values (no subclassing): a [`SimilarityMetric`]
//! pairs a stable name with a scoring closure, and a [`MetricRegistry`] is an
//! explicit catalog built once at startup and handed to the evaluation
//! manager. Metric selection for a benchmark run works through catalogs of
//! [`MetricConfig`] (metric + threshold) pairs:
//!
//! - [`default_catalog`] — the full library crossed with the default
//!   threshold range,
//! - [`default_metric_catalog`] — a single baseline entry,
//! - [`combined_catalog`] — n-gram metrics with a token-level fallback for
//!   short inputs,
//! - [`selected_catalog`] — a subset read from a TOML file.

pub mod functions;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::BenchError;

/// Signalled by a metric when an input is too short to score (e.g. fewer
/// characters than the n-gram size). Recorded as a degenerate outcome, not
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputTooShort;

impl fmt::Display for InputTooShort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("input too short to score")
    }
}

impl std::error::Error for InputTooShort {}

type ScoreFn = Arc<dyn Fn(&str, &str) -> Result<f64, InputTooShort> + Send + Sync>;

/// A named similarity-scoring function. Cheap to clone; the closure is
/// shared.
#[derive(Clone)]
pub struct SimilarityMetric {
    name: Arc<str>,
    func: ScoreFn,
}

impl SimilarityMetric {
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&str, &str) -> Result<f64, InputTooShort> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self, a: &str, b: &str) -> Result<f64, InputTooShort> {
        (self.func)(a, b)
    }
}

impl fmt::Debug for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilarityMetric")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A metric bound to a decision threshold in [0, 1]. Name + threshold is the
/// lookup key within a manager's catalog and must be unique there.
#[derive(Debug, Clone)]
pub struct MetricConfig {
    pub metric: SimilarityMetric,
    pub threshold: f64,
}

impl MetricConfig {
    pub fn new(metric: SimilarityMetric, threshold: f64) -> Self {
        Self { metric, threshold }
    }
}

/// Thresholds tested for every metric in the default catalog.
pub const DEFAULT_THRESHOLDS: [f64; 7] = [0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Baseline metric name used when `--default-metric` is given.
pub const DEFAULT_METRIC: &str = "four_gram_jaccard";

/// Baseline threshold used when `--default-metric` is given.
pub const DEFAULT_METRIC_THRESHOLD: f64 = 0.6;

/// Explicit catalog of similarity metrics, keyed by name.
pub struct MetricRegistry {
    entries: Vec<SimilarityMetric>,
}

impl MetricRegistry {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// The full default metric library: edit-based, token-based, profile-based
    /// and character-n-gram-based functions.
    pub fn with_default_metrics() -> Self {
        let mut registry = Self::empty();

        registry.register(SimilarityMetric::new("levenshtein", functions::levenshtein));
        registry.register(SimilarityMetric::new(
            "longest_common_subsequence",
            functions::longest_common_subsequence,
        ));

        registry.register(SimilarityMetric::new("token_jaccard", functions::token_jaccard));
        registry.register(SimilarityMetric::new("token_dice", functions::token_dice));
        registry.register(SimilarityMetric::new("token_overlap", functions::token_overlap));
        registry.register(SimilarityMetric::new("token_cosine", functions::token_cosine));

        for (n, prefix) in [(2, "two"), (3, "three"), (4, "four"), (5, "five")] {
            registry.register(SimilarityMetric::new(
                format!("{prefix}_gram_jaccard"),
                move |a: &str, b: &str| functions::ngram_jaccard(a, b, n),
            ));
            registry.register(SimilarityMetric::new(
                format!("{prefix}_gram_dice"),
                move |a: &str, b: &str| functions::ngram_dice(a, b, n),
            ));
            registry.register(SimilarityMetric::new(
                format!("{prefix}_gram_overlap"),
                move |a: &str, b: &str| functions::ngram_overlap(a, b, n),
            ));
        }

        registry
    }

    pub fn register(&mut self, metric: SimilarityMetric) {
        self.entries.push(metric);
    }

    pub fn get(&self, name: &str) -> Option<&SimilarityMetric> {
        self.entries.iter().find(|m| m.name() == name)
    }

    pub fn metrics(&self) -> &[SimilarityMetric] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A metric that falls back to a token-level function when the primary
/// signals [`InputTooShort`]. Covers short inputs that n-gram metrics cannot
/// score.
fn with_fallback(primary: SimilarityMetric, fallback: SimilarityMetric) -> SimilarityMetric {
    let name = format!("{}+{}", primary.name(), fallback.name());
    SimilarityMetric::new(name, move |a: &str, b: &str| match primary.score(a, b) {
        Err(InputTooShort) => fallback.score(a, b),
        other => other,
    })
}

/// The full library crossed with the default threshold range.
pub fn default_catalog() -> Vec<MetricConfig> {
    let registry = MetricRegistry::with_default_metrics();
    let mut catalog = Vec::new();
    for metric in registry.metrics() {
        for &threshold in &DEFAULT_THRESHOLDS {
            catalog.push(MetricConfig::new(metric.clone(), threshold));
        }
    }
    catalog
}

/// A single baseline entry.
pub fn default_metric_catalog() -> Vec<MetricConfig> {
    let registry = MetricRegistry::with_default_metrics();
    let metric = registry
        .get(DEFAULT_METRIC)
        .cloned()
        .expect("baseline metric registered in the default library");
    vec![MetricConfig::new(metric, DEFAULT_METRIC_THRESHOLD)]
}

/// N-gram metrics combined with a token-level fallback, crossed with the
/// default threshold range.
pub fn combined_catalog() -> Vec<MetricConfig> {
    let registry = MetricRegistry::with_default_metrics();
    let mut catalog = Vec::new();
    for (primary, fallback) in [
        ("two_gram_jaccard", "token_jaccard"),
        ("three_gram_jaccard", "token_jaccard"),
        ("four_gram_jaccard", "token_jaccard"),
        ("four_gram_dice", "token_dice"),
        ("four_gram_overlap", "token_overlap"),
    ] {
        let (Some(primary), Some(fallback)) = (registry.get(primary), registry.get(fallback))
        else {
            continue;
        };
        let combined = with_fallback(primary.clone(), fallback.clone());
        for &threshold in &DEFAULT_THRESHOLDS {
            catalog.push(MetricConfig::new(combined.clone(), threshold));
        }
    }
    catalog
}

#[derive(Debug, Deserialize)]
struct SelectedMetricsFile {
    metric: Vec<SelectedMetric>,
}

#[derive(Debug, Deserialize)]
struct SelectedMetric {
    name: String,
    #[serde(default = "default_thresholds_vec")]
    thresholds: Vec<f64>,
}

fn default_thresholds_vec() -> Vec<f64> {
    DEFAULT_THRESHOLDS.to_vec()
}

/// Load a metric subset from a TOML file:
///
/// ```toml
/// [[metric]]
/// name = "four_gram_jaccard"
/// thresholds = [0.5, 0.6]
/// ```
///
/// Unknown metric names and thresholds outside [0, 1] are fatal
/// configuration errors.
pub fn selected_catalog(path: &Path) -> Result<Vec<MetricConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read selected metrics file: {}", path.display()))?;
    let file: SelectedMetricsFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse selected metrics file: {}", path.display()))?;

    let registry = MetricRegistry::with_default_metrics();
    let mut catalog = Vec::new();
    for selected in &file.metric {
        let metric = registry.get(&selected.name).ok_or_else(|| {
            BenchError::Configuration(format!("unknown similarity metric: {}", selected.name))
        })?;
        for &threshold in &selected.thresholds {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(BenchError::Configuration(format!(
                    "threshold {} for metric {} is outside [0, 1]",
                    threshold, selected.name
                ))
                .into());
            }
            catalog.push(MetricConfig::new(metric.clone(), threshold));
        }
    }
    Ok(catalog)
}
