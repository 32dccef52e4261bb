//! Per-(document, metric, threshold) evaluation state
//!
//! A [`MetricEvaluation`] is mutated exactly once per repetition via
//! [`run_repetition`](MetricEvaluation::run_repetition) and is read-only
//! afterwards. The repetition counter must advance by exactly one per call;
//! channels are evaluated in alternating order across repetitions so neither
//! channel systematically benefits from cache warm-up; correctness results
//! must be identical across repetitions while runtimes accumulate into a
//! rounded mean.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::config::{Channel, MatcherConfig};
use crate::corpus::{Connection, Document, DocumentId, GroundTruth, RevisionId};
use crate::error::BenchError;
use crate::matcher::{MatchError, Matcher, MatcherState};
use crate::metrics::MetricConfig;

use super::result::ConfusionResult;
use super::runtime::{RuntimeSample, ThreadTimer};

/// Per-channel results and runtimes, keyed by revision id. Runtimes are
/// recorded per revision but measured per whole-document matcher call, so
/// all entries of one channel carry the same sample.
#[derive(Debug, Default)]
pub struct ChannelOutcome {
    results: BTreeMap<RevisionId, ConfusionResult>,
    runtimes: BTreeMap<RevisionId, RuntimeSample>,
}

impl ChannelOutcome {
    pub fn results(&self) -> &BTreeMap<RevisionId, ConfusionResult> {
        &self.results
    }

    pub fn revision_result(&self, revision_id: RevisionId) -> Option<&ConfusionResult> {
        self.results.get(&revision_id)
    }

    /// Nullable-aware sum over all revisions.
    pub fn document_result(&self) -> ConfusionResult {
        self.results
            .values()
            .fold(ConfusionResult::default(), |acc, r| acc.add(r))
    }

    pub fn revision_runtime(&self, revision_id: RevisionId) -> Option<RuntimeSample> {
        self.runtimes.get(&revision_id).copied()
    }

    pub fn document_runtime(&self) -> RuntimeSample {
        self.runtimes.values().next().copied().unwrap_or_default()
    }
}

/// Channel evaluation order for repetition `k`: odd repetitions text first,
/// even repetitions code first.
fn channel_order(k: u32) -> [Channel; 2] {
    if k % 2 == 1 {
        [Channel::Text, Channel::Code]
    } else {
        [Channel::Code, Channel::Text]
    }
}

/// Evaluation of one metric/threshold pair against one document.
#[derive(Debug)]
pub struct MetricEvaluation {
    document: Arc<Document>,
    ground_truth: Arc<GroundTruth>,
    config: MatcherConfig,
    threshold: f64,
    repetitions: u32,
    completed: u32,
    text: ChannelOutcome,
    code: ChannelOutcome,
}

impl MetricEvaluation {
    pub fn new(
        document: Arc<Document>,
        ground_truth: Arc<GroundTruth>,
        metric: &MetricConfig,
        repetitions: u32,
    ) -> Self {
        Self {
            document,
            ground_truth,
            config: MatcherConfig::uniform(metric.metric.clone(), metric.threshold),
            threshold: metric.threshold,
            repetitions,
            completed: 0,
            text: ChannelOutcome::default(),
            code: ChannelOutcome::default(),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document.id()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn metric_name(&self) -> &str {
        self.config.metric(Channel::Text).name()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn completed_repetitions(&self) -> u32 {
        self.completed
    }

    pub fn channel(&self, channel: Channel) -> &ChannelOutcome {
        match channel {
            Channel::Text => &self.text,
            Channel::Code => &self.code,
        }
    }

    fn context(&self, channel: Channel, revision_id: RevisionId) -> String {
        format!(
            "document {}, metric {} @ {}, revision {}, {} channel",
            self.document.id(),
            self.metric_name(),
            self.threshold,
            revision_id,
            channel,
        )
    }

    /// Run repetition `k`. `k` must be exactly one past the last completed
    /// repetition; anything else is a fatal scheduling error.
    pub fn run_repetition(
        &mut self,
        matcher: &dyn Matcher,
        state: &mut MatcherState,
        k: u32,
    ) -> Result<(), BenchError> {
        if k != self.completed + 1 {
            return Err(BenchError::Scheduling(format!(
                "repetition {k} requested, but {} repetitions completed (document {}, metric {} @ {})",
                self.completed,
                self.document.id(),
                self.metric_name(),
                self.threshold,
            )));
        }
        self.completed = k;

        for channel in channel_order(k) {
            self.evaluate_channel(matcher, state, channel, k)?;
        }
        Ok(())
    }

    fn evaluate_channel(
        &mut self,
        matcher: &dyn Matcher,
        state: &mut MatcherState,
        channel: Channel,
        k: u32,
    ) -> Result<(), BenchError> {
        let timer = ThreadTimer::start();
        let outcome = matcher.process(&self.document, state, &self.config, channel);
        let runtime = timer.elapsed();
        let computed = state.extract();
        state.reset();

        let degenerate = match outcome {
            Ok(()) => false,
            Err(MatchError::InputTooShort) => true,
        };

        let mut fresh: BTreeMap<RevisionId, ConfusionResult> = BTreeMap::new();
        for revision in self.document.revisions() {
            let possible = self.ground_truth.possible_connections(revision.id, channel);
            let block_count = revision.block_count(channel) as u64;
            let result = if degenerate {
                ConfusionResult::degenerate(possible, block_count)
            } else {
                let expected = self.ground_truth.connections(revision.id, channel);
                let claimed: HashSet<Connection> = computed
                    .iter()
                    .filter(|c| c.revision_id == revision.id)
                    .copied()
                    .collect();
                ConfusionResult::measured(possible, block_count, &expected, &claimed).map_err(
                    |e| {
                        BenchError::Consistency(format!(
                            "{e} ({})",
                            self.context(channel, revision.id)
                        ))
                    },
                )?
            };
            fresh.insert(revision.id, result);
        }

        if k >= 2 {
            for (revision_id, result) in &fresh {
                let seeded = self.channel(channel).revision_result(*revision_id);
                if seeded != Some(result) {
                    return Err(BenchError::Consistency(format!(
                        "confusion counts changed between repetitions ({})",
                        self.context(channel, *revision_id)
                    )));
                }
            }
        }

        let repetitions = self.repetitions;
        let slot = match channel {
            Channel::Text => &mut self.text,
            Channel::Code => &mut self.code,
        };

        if k == 1 {
            slot.runtimes = fresh.keys().map(|&id| (id, runtime)).collect();
            slot.results = fresh;
        } else {
            for sample in slot.runtimes.values_mut() {
                sample.accumulate(runtime);
            }
        }
        if k == repetitions {
            for sample in slot.runtimes.values_mut() {
                *sample = sample.mean(repetitions);
            }
        }

        tracing::trace!(
            document = self.document.id(),
            metric = self.metric_name(),
            threshold = self.threshold,
            %channel,
            repetition = k,
            wall_nanos = runtime.wall_nanos,
            "channel evaluated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::corpus::ground_truth::test_fixtures::two_revision_ground_truth;
    use crate::corpus::test_fixtures::*;
    use crate::corpus::Revision;
    use crate::matcher::GreedyMatcher;
    use crate::metrics::MetricRegistry;

    fn metric_config(name: &str, threshold: f64) -> MetricConfig {
        let registry = MetricRegistry::with_default_metrics();
        MetricConfig::new(registry.get(name).unwrap().clone(), threshold)
    }

    fn evaluation(metric: &str, threshold: f64, repetitions: u32) -> MetricEvaluation {
        MetricEvaluation::new(
            Arc::new(two_revision_document(1)),
            Arc::new(two_revision_ground_truth(1)),
            &metric_config(metric, threshold),
            repetitions,
        )
    }

    #[test]
    fn test_channel_order_alternates() {
        assert_eq!(channel_order(1), [Channel::Text, Channel::Code]);
        assert_eq!(channel_order(2), [Channel::Code, Channel::Text]);
        assert_eq!(channel_order(3), [Channel::Text, Channel::Code]);
    }

    /// Matcher that records the channel of every call and claims nothing.
    #[derive(Default)]
    struct RecordingMatcher {
        calls: Mutex<Vec<Channel>>,
    }

    impl Matcher for RecordingMatcher {
        fn process(
            &self,
            _document: &Document,
            _state: &mut MatcherState,
            _config: &MatcherConfig,
            channel: Channel,
        ) -> Result<(), MatchError> {
            self.calls.lock().unwrap().push(channel);
            Ok(())
        }
    }

    #[test]
    fn test_repetitions_alternate_channel_order() {
        let matcher = RecordingMatcher::default();
        let mut state = MatcherState::new();
        let mut evaluation = evaluation("token_jaccard", 0.5, 2);

        evaluation.run_repetition(&matcher, &mut state, 1).unwrap();
        evaluation.run_repetition(&matcher, &mut state, 2).unwrap();

        let calls = matcher.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![Channel::Text, Channel::Code, Channel::Code, Channel::Text]
        );
    }

    #[test]
    fn test_skipped_repetition_is_scheduling_error() {
        let mut evaluation = evaluation("token_jaccard", 0.5, 4);
        let mut state = MatcherState::new();
        let error = evaluation
            .run_repetition(&GreedyMatcher::new(), &mut state, 2)
            .unwrap_err();
        assert!(matches!(error, BenchError::Scheduling(_)));
    }

    #[test]
    fn test_full_run_computes_confusion() {
        let mut evaluation = evaluation("token_jaccard", 0.5, 4);
        let mut state = MatcherState::new();
        let matcher = GreedyMatcher::new();
        for k in 1..=4 {
            evaluation.run_repetition(&matcher, &mut state, k).unwrap();
        }

        for channel in Channel::ALL {
            let result = evaluation.channel(channel).document_result();
            assert_eq!(result.possible_connections, 1);
            assert_eq!(result.true_positives, Some(1));
            assert_eq!(result.false_positives, Some(0));
            assert_eq!(result.true_negatives, Some(0));
            assert_eq!(result.false_negatives, Some(0));
        }
        assert_eq!(evaluation.completed_repetitions(), 4);
    }

    #[test]
    fn test_short_inputs_yield_degenerate_results() {
        let mut first = Revision::new(1);
        first.push_block(Channel::Text, block("ab"));
        let mut second = Revision::new(2);
        second.push_block(Channel::Text, linked_block("abcdef", 0));
        let document = Document::new(4, vec![first, second]);

        let mut gt_first = crate::corpus::ground_truth::GtRevision::new(1);
        gt_first.push_pred(Channel::Text, None);
        let mut gt_second = crate::corpus::ground_truth::GtRevision::new(2);
        gt_second.push_pred(Channel::Text, Some(0));
        let ground_truth = GroundTruth::new(4, vec![gt_first, gt_second]);

        let mut evaluation = MetricEvaluation::new(
            Arc::new(document),
            Arc::new(ground_truth),
            &metric_config("four_gram_jaccard", 0.5),
            3,
        );
        let mut state = MatcherState::new();
        // degenerate outcomes must also pass the consistency check
        for k in 1..=3 {
            evaluation
                .run_repetition(&GreedyMatcher::new(), &mut state, k)
                .unwrap();
        }

        let result = evaluation.channel(Channel::Text).document_result();
        assert!(result.is_degenerate());
        // block counts survive even when confusion is absent
        assert_eq!(result.block_count, 2);
        assert_eq!(result.possible_connections, 1);
    }

    /// Matcher that claims a connection only on its first call per channel.
    #[derive(Default)]
    struct FlakyMatcher {
        calls: AtomicU32,
    }

    impl Matcher for FlakyMatcher {
        fn process(
            &self,
            document: &Document,
            state: &mut MatcherState,
            _config: &MatcherConfig,
            channel: Channel,
        ) -> Result<(), MatchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
                if let Some(revision) = document.revisions().last() {
                    state.record(Connection {
                        revision_id: revision.id,
                        channel,
                        pred_position: 0,
                        position: 0,
                    });
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_changed_results_are_consistency_error() {
        let mut evaluation = evaluation("token_jaccard", 0.5, 4);
        let mut state = MatcherState::new();
        let matcher = FlakyMatcher::default();

        evaluation.run_repetition(&matcher, &mut state, 1).unwrap();
        let error = evaluation
            .run_repetition(&matcher, &mut state, 2)
            .unwrap_err();
        assert!(matches!(error, BenchError::Consistency(_)));
    }

    #[test]
    fn test_repeated_single_repetition_runs_are_identical() {
        let matcher = GreedyMatcher::new();
        let mut results = Vec::new();
        for _ in 0..2 {
            let mut evaluation = evaluation("token_jaccard", 0.5, 1);
            let mut state = MatcherState::new();
            evaluation.run_repetition(&matcher, &mut state, 1).unwrap();
            results.push((
                evaluation.channel(Channel::Text).document_result(),
                evaluation.channel(Channel::Code).document_result(),
            ));
        }
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_single_revision_document_has_empty_results() {
        let mut revision = Revision::new(1);
        revision.push_block(Channel::Text, block("only version"));
        let document = Document::new(8, vec![revision]);

        let mut gt_revision = crate::corpus::ground_truth::GtRevision::new(1);
        gt_revision.push_pred(Channel::Text, None);
        let ground_truth = GroundTruth::new(8, vec![gt_revision]);

        let mut evaluation = MetricEvaluation::new(
            Arc::new(document),
            Arc::new(ground_truth),
            &metric_config("token_jaccard", 0.5),
            1,
        );
        let mut state = MatcherState::new();
        evaluation
            .run_repetition(&GreedyMatcher::new(), &mut state, 1)
            .unwrap();

        let result = evaluation.channel(Channel::Text).document_result();
        assert_eq!(result.possible_connections, 0);
        assert_eq!(result.true_positives, Some(0));
        assert_eq!(result.block_count, 1);
    }
}
