//! Benchmark run orchestration for one sample
//!
//! The manager owns the full lifecycle: load the sample's documents and
//! ground truth, validate them against each other, run the documents ×
//! metrics × thresholds cross product over a worker pool, and hand the
//! finished evaluations to the report writer. One worker owns one document's
//! complete evaluation set to completion, so matcher state never has two
//! writers. Any worker failure aborts the whole run; there is no partial
//! recovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::corpus::{self, Document, GroundTruth};
use crate::error::BenchError;
use crate::matcher::{GreedyMatcher, Matcher, MatcherState};
use crate::metrics::MetricConfig;

use super::metric_evaluation::MetricEvaluation;

/// Generous upper bound on one sample's run; on expiry workers are cancelled
/// and the run fails rather than reporting partial output.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// All evaluations of one document, owned by a single worker during the run.
#[derive(Debug)]
pub struct DocumentEvaluations {
    pub document: Arc<Document>,
    pub ground_truth: Arc<GroundTruth>,
    pub evaluations: Vec<MetricEvaluation>,
}

/// Orchestrates loading, validation, execution and export for one sample
/// directory.
pub struct EvaluationManager {
    sample_name: String,
    sample_dir: PathBuf,
    catalog: Vec<MetricConfig>,
    repetitions: u32,
    thread_count: usize,
    randomize_order: bool,
    matcher: Arc<dyn Matcher>,
    documents: Vec<(Arc<Document>, Arc<GroundTruth>)>,
    results: Vec<DocumentEvaluations>,
}

impl EvaluationManager {
    /// Fails when the catalog is empty or contains a duplicate
    /// (metric, threshold) pair.
    pub fn new(sample_dir: &Path, catalog: Vec<MetricConfig>) -> Result<Self> {
        if catalog.is_empty() {
            return Err(BenchError::Configuration("empty metric catalog".into()).into());
        }
        let mut seen = HashSet::new();
        for entry in &catalog {
            if !seen.insert((entry.metric.name().to_string(), entry.threshold.to_bits())) {
                return Err(BenchError::Configuration(format!(
                    "duplicate catalog entry: {} @ {}",
                    entry.metric.name(),
                    entry.threshold
                ))
                .into());
            }
        }

        let sample_name = sample_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sample")
            .to_string();

        Ok(Self {
            sample_name,
            sample_dir: sample_dir.to_path_buf(),
            catalog,
            repetitions: 4,
            thread_count: 1,
            randomize_order: true,
            matcher: Arc::new(GreedyMatcher::new()),
            documents: Vec::new(),
            results: Vec::new(),
        })
    }

    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = repetitions.max(1);
        self
    }

    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count.max(1);
        self
    }

    pub fn with_shuffle(mut self, randomize_order: bool) -> Self {
        self.randomize_order = randomize_order;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn sample_name(&self) -> &str {
        &self.sample_name
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    pub fn randomize_order(&self) -> bool {
        self.randomize_order
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Finished evaluations, available after [`run`](Self::run).
    pub fn document_evaluations(&self) -> &[DocumentEvaluations] {
        &self.results
    }

    /// Read the catalog and every document plus its ground truth, asserting
    /// the declared revision counts and the possible-connection totals. Any
    /// mismatch aborts before the run starts.
    pub fn load(&mut self) -> Result<()> {
        let sample = corpus::load_sample(&self.sample_dir)?;
        for entry in &sample.catalog {
            let document = corpus::load_document(&self.sample_dir, entry.document_id)?;
            let ground_truth = corpus::load_ground_truth(&self.sample_dir, entry.document_id)?;

            if document.revision_count() != entry.version_count {
                return Err(BenchError::Configuration(format!(
                    "document {}: catalog declares {} revisions, file has {}",
                    entry.document_id,
                    entry.version_count,
                    document.revision_count()
                ))
                .into());
            }
            if document.revision_ids() != ground_truth.revision_ids() {
                return Err(BenchError::Configuration(format!(
                    "document {}: ground-truth revision sequence differs from the document's",
                    entry.document_id
                ))
                .into());
            }
            if document.possible_connections() != ground_truth.possible_connections_total() {
                return Err(BenchError::Configuration(format!(
                    "document {}: possible connections differ (document {}, ground truth {})",
                    entry.document_id,
                    document.possible_connections(),
                    ground_truth.possible_connections_total()
                ))
                .into());
            }
            self.documents.push((Arc::new(document), Arc::new(ground_truth)));
        }

        tracing::info!(
            sample = %self.sample_name,
            documents = self.documents.len(),
            metrics = self.catalog.len(),
            "sample loaded"
        );
        Ok(())
    }

    /// Independently re-derive the connection sets from the documents'
    /// predecessor links and from the ground truth, and assert equality.
    pub fn validate(&self) -> Result<()> {
        for (document, ground_truth) in &self.documents {
            if document.connections(None) != ground_truth.all_connections(None) {
                return Err(BenchError::Configuration(format!(
                    "document {}: predecessor links disagree with the ground truth",
                    document.id()
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Run all repetitions of the documents × metrics × thresholds cross
    /// product over the worker pool.
    pub fn run(&mut self) -> Result<()> {
        let jobs: Vec<DocumentEvaluations> = self
            .documents
            .iter()
            .map(|(document, ground_truth)| DocumentEvaluations {
                document: Arc::clone(document),
                ground_truth: Arc::clone(ground_truth),
                evaluations: self
                    .catalog
                    .iter()
                    .map(|metric| {
                        MetricEvaluation::new(
                            Arc::clone(document),
                            Arc::clone(ground_truth),
                            metric,
                            self.repetitions,
                        )
                    })
                    .collect(),
            })
            .collect();
        let expected = jobs.len();
        if expected == 0 {
            return Ok(());
        }

        tracing::info!(
            sample = %self.sample_name,
            documents = expected,
            evaluations = expected * self.catalog.len(),
            workers = self.thread_count.min(expected),
            repetitions = self.repetitions,
            shuffle = self.randomize_order,
            "starting benchmark run"
        );
        let started = Instant::now();

        let queue = Arc::new(Mutex::new(jobs));
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<Result<DocumentEvaluations, BenchError>>();

        let mut handles = Vec::new();
        for _ in 0..self.thread_count.min(expected) {
            let queue = Arc::clone(&queue);
            let cancel = Arc::clone(&cancel);
            let tx = tx.clone();
            let matcher = Arc::clone(&self.matcher);
            let repetitions = self.repetitions;
            let randomize_order = self.randomize_order;

            handles.push(std::thread::spawn(move || loop {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                let Some(job) = queue.lock().ok().and_then(|mut q| q.pop()) else {
                    break;
                };
                let result =
                    run_document(job, matcher.as_ref(), repetitions, randomize_order, &cancel);
                if tx.send(result).is_err() {
                    break;
                }
            }));
        }
        drop(tx);

        let deadline = started + RUN_TIMEOUT;
        let mut outcome: Result<()> = Ok(());
        for _ in 0..expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(Ok(finished)) => self.results.push(finished),
                Ok(Err(error)) => {
                    cancel.store(true, Ordering::Relaxed);
                    outcome = Err(error.into());
                    break;
                }
                Err(_) => {
                    cancel.store(true, Ordering::Relaxed);
                    outcome = Err(BenchError::Timeout(RUN_TIMEOUT).into());
                    break;
                }
            }
        }
        for handle in handles {
            if handle.join().is_err() && outcome.is_ok() {
                outcome = Err(BenchError::Cancelled.into());
            }
        }
        outcome.with_context(|| format!("benchmark run failed for sample {}", self.sample_name))?;

        self.results.sort_by_key(|de| de.document.id());
        tracing::info!(
            sample = %self.sample_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "benchmark run finished"
        );
        Ok(())
    }
}

/// Run all repetitions for one document, optionally shuffling the evaluation
/// order per repetition with a fresh seed.
fn run_document(
    mut job: DocumentEvaluations,
    matcher: &dyn Matcher,
    repetitions: u32,
    randomize_order: bool,
    cancel: &AtomicBool,
) -> Result<DocumentEvaluations, BenchError> {
    let mut state = MatcherState::new();
    for k in 1..=repetitions {
        if cancel.load(Ordering::Relaxed) {
            return Err(BenchError::Cancelled);
        }
        let mut order: Vec<usize> = (0..job.evaluations.len()).collect();
        if randomize_order {
            order.shuffle(&mut StdRng::from_entropy());
        }
        for index in order {
            job.evaluations[index].run_repetition(matcher, &mut state, k)?;
        }
    }
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Channel;
    use crate::metrics::{default_metric_catalog, MetricRegistry};

    fn temp_sample_dir(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("simbench-manager-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_sample(dir: &Path) {
        std::fs::write(dir.join("documents.csv"), "DocumentId;VersionCount\n1;2\n").unwrap();
        std::fs::write(
            dir.join("1.csv"),
            "RevisionId;Channel;Position;Content;PredPosition\n\
             10;text;0;the quick brown fox;\n\
             10;code;0;fn main() { run() };\n\
             20;text;0;the quick brown foxes;0\n\
             20;code;0;fn main() { run() };0\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("1_gt.csv"),
            "RevisionId;Channel;Position;PredPosition\n\
             10;text;0;\n\
             10;code;0;\n\
             20;text;0;0\n\
             20;code;0;0\n",
        )
        .unwrap();
    }

    fn small_catalog() -> Vec<MetricConfig> {
        let registry = MetricRegistry::with_default_metrics();
        vec![
            MetricConfig::new(registry.get("token_jaccard").unwrap().clone(), 0.5),
            MetricConfig::new(registry.get("token_jaccard").unwrap().clone(), 0.9),
        ]
    }

    #[test]
    fn test_full_run_end_to_end() {
        let dir = temp_sample_dir("run");
        write_sample(&dir);

        let mut manager = EvaluationManager::new(&dir, small_catalog())
            .unwrap()
            .with_repetitions(2)
            .with_shuffle(false);
        manager.load().unwrap();
        manager.validate().unwrap();
        manager.run().unwrap();

        let documents = manager.document_evaluations();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].evaluations.len(), 2);

        let loose = &documents[0].evaluations[0];
        assert_eq!(loose.threshold(), 0.5);
        let code = loose.channel(Channel::Code).document_result();
        assert_eq!(code.true_positives, Some(1));
        assert_eq!(code.possible_connections, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_shuffled_run_gives_same_confusion() {
        let dir = temp_sample_dir("shuffle");
        write_sample(&dir);

        let mut shuffled = EvaluationManager::new(&dir, small_catalog())
            .unwrap()
            .with_repetitions(3)
            .with_shuffle(true);
        shuffled.load().unwrap();
        shuffled.run().unwrap();

        let mut ordered = EvaluationManager::new(&dir, small_catalog())
            .unwrap()
            .with_repetitions(3)
            .with_shuffle(false);
        ordered.load().unwrap();
        ordered.run().unwrap();

        for (a, b) in shuffled.document_evaluations()[0]
            .evaluations
            .iter()
            .zip(&ordered.document_evaluations()[0].evaluations)
        {
            for channel in Channel::ALL {
                assert_eq!(
                    a.channel(channel).document_result(),
                    b.channel(channel).document_result()
                );
            }
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_duplicate_catalog_entry_rejected() {
        let dir = temp_sample_dir("dup");
        write_sample(&dir);

        let registry = MetricRegistry::with_default_metrics();
        let metric = registry.get("token_jaccard").unwrap().clone();
        let catalog = vec![
            MetricConfig::new(metric.clone(), 0.5),
            MetricConfig::new(metric, 0.5),
        ];
        assert!(EvaluationManager::new(&dir, catalog).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_version_count_mismatch_fails_load() {
        let dir = temp_sample_dir("mismatch");
        write_sample(&dir);
        std::fs::write(dir.join("documents.csv"), "DocumentId;VersionCount\n1;3\n").unwrap();

        let mut manager = EvaluationManager::new(&dir, default_metric_catalog()).unwrap();
        assert!(manager.load().is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_detects_link_disagreement() {
        let dir = temp_sample_dir("links");
        write_sample(&dir);
        // ground truth drops the code connection the document claims
        std::fs::write(
            dir.join("1_gt.csv"),
            "RevisionId;Channel;Position;PredPosition\n\
             10;text;0;\n\
             10;code;0;\n\
             20;text;0;0\n\
             20;code;0;\n",
        )
        .unwrap();

        let mut manager = EvaluationManager::new(&dir, default_metric_catalog()).unwrap();
        // possible-connection totals still match, only validate catches this
        manager.load().unwrap();
        assert!(manager.validate().is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
