//! Matching algorithms
//!
//! A [`Matcher`] reconstructs block correspondences between adjacent
//! revisions of a document, one channel at a time, writing the connections it
//! claims into a [`MatcherState`]. The state is owned by the caller so the
//! harness can extract and reset it between channel passes, and so a matcher
//! implementation stays free of evaluation bookkeeping.

use std::collections::HashSet;

use crate::config::{Channel, MatcherConfig};
use crate::corpus::{Connection, Document};
use crate::metrics::InputTooShort;

/// Non-fatal matching outcomes. `InputTooShort` marks the whole channel pass
/// degenerate; the harness records block counts but no confusion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchError {
    InputTooShort,
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::InputTooShort => f.write_str("input too short to score"),
        }
    }
}

impl std::error::Error for MatchError {}

impl From<InputTooShort> for MatchError {
    fn from(_: InputTooShort) -> Self {
        MatchError::InputTooShort
    }
}

/// Connections claimed by a matcher during one channel pass.
#[derive(Debug, Default)]
pub struct MatcherState {
    connections: HashSet<Connection>,
}

impl MatcherState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, connection: Connection) {
        self.connections.insert(connection);
    }

    pub fn connections(&self) -> &HashSet<Connection> {
        &self.connections
    }

    /// Take the recorded connections, leaving the state empty.
    pub fn extract(&mut self) -> HashSet<Connection> {
        std::mem::take(&mut self.connections)
    }

    pub fn reset(&mut self) {
        self.connections.clear();
    }
}

/// A block-correspondence reconstruction algorithm.
pub trait Matcher: Send + Sync {
    /// Match blocks of `channel` across all adjacent revision pairs of
    /// `document`, recording claimed connections into `state`.
    fn process(
        &self,
        document: &Document,
        state: &mut MatcherState,
        config: &MatcherConfig,
        channel: Channel,
    ) -> Result<(), MatchError>;
}

/// Greedy best-score-first matching. For each revision pair, all block pairs
/// scoring at or above the threshold are sorted by descending score and
/// assigned greedily, each block on either side used at most once. Ties break
/// by position, then predecessor position, so the result is deterministic.
#[derive(Debug, Default)]
pub struct GreedyMatcher;

impl GreedyMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl Matcher for GreedyMatcher {
    fn process(
        &self,
        document: &Document,
        state: &mut MatcherState,
        config: &MatcherConfig,
        channel: Channel,
    ) -> Result<(), MatchError> {
        let metric = config.metric(channel);
        let threshold = config.threshold(channel);

        for pair in document.revisions().windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);

            let mut candidates: Vec<(f64, u32, u32)> = Vec::new();
            for (position, block) in curr.blocks(channel).iter().enumerate() {
                for (pred_position, pred_block) in prev.blocks(channel).iter().enumerate() {
                    let score = metric.score(&pred_block.content, &block.content)?;
                    if score >= threshold {
                        candidates.push((score, position as u32, pred_position as u32));
                    }
                }
            }

            candidates.sort_by(|a, b| {
                b.0.total_cmp(&a.0)
                    .then(a.1.cmp(&b.1))
                    .then(a.2.cmp(&b.2))
            });

            let mut used_positions = HashSet::new();
            let mut used_preds = HashSet::new();
            for (_, position, pred_position) in candidates {
                if used_positions.contains(&position) || used_preds.contains(&pred_position) {
                    continue;
                }
                used_positions.insert(position);
                used_preds.insert(pred_position);
                state.record(Connection {
                    revision_id: curr.id,
                    channel,
                    pred_position,
                    position,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::test_fixtures::*;
    use crate::corpus::Revision;
    use crate::metrics::MetricRegistry;

    fn uniform_config(metric: &str, threshold: f64) -> MatcherConfig {
        let registry = MetricRegistry::with_default_metrics();
        let metric = registry.get(metric).unwrap().clone();
        MatcherConfig::uniform(metric, threshold)
    }

    #[test]
    fn test_greedy_matches_identical_blocks() {
        let document = two_revision_document(1);
        let config = uniform_config("token_jaccard", 0.5);
        let mut state = MatcherState::new();

        GreedyMatcher::new()
            .process(&document, &mut state, &config, Channel::Code)
            .unwrap();

        let connections = state.extract();
        assert_eq!(connections.len(), 1);
        assert!(connections.contains(&Connection {
            revision_id: 2,
            channel: Channel::Code,
            pred_position: 0,
            position: 0,
        }));
        assert!(state.connections().is_empty());
    }

    #[test]
    fn test_greedy_assigns_each_block_once() {
        let mut first = Revision::new(1);
        first.push_block(Channel::Text, block("alpha beta gamma"));

        let mut second = Revision::new(2);
        second.push_block(Channel::Text, block("alpha beta gamma"));
        second.push_block(Channel::Text, block("alpha beta gamma delta"));
        let document = Document::new(5, vec![first, second]);

        let config = uniform_config("token_jaccard", 0.5);
        let mut state = MatcherState::new();
        GreedyMatcher::new()
            .process(&document, &mut state, &config, Channel::Text)
            .unwrap();

        // the single predecessor goes to the exact copy at position 0
        let connections = state.extract();
        assert_eq!(connections.len(), 1);
        assert!(connections.contains(&Connection {
            revision_id: 2,
            channel: Channel::Text,
            pred_position: 0,
            position: 0,
        }));
    }

    #[test]
    fn test_threshold_filters_candidates() {
        let mut first = Revision::new(1);
        first.push_block(Channel::Text, block("alpha beta"));
        let mut second = Revision::new(2);
        second.push_block(Channel::Text, block("gamma delta"));
        let document = Document::new(6, vec![first, second]);

        let config = uniform_config("token_jaccard", 0.5);
        let mut state = MatcherState::new();
        GreedyMatcher::new()
            .process(&document, &mut state, &config, Channel::Text)
            .unwrap();
        assert!(state.connections().is_empty());
    }

    #[test]
    fn test_too_short_input_aborts_pass() {
        let mut first = Revision::new(1);
        first.push_block(Channel::Text, block("ab"));
        let mut second = Revision::new(2);
        second.push_block(Channel::Text, block("abcdef"));
        let document = Document::new(7, vec![first, second]);

        let config = uniform_config("four_gram_jaccard", 0.5);
        let mut state = MatcherState::new();
        let result = GreedyMatcher::new().process(&document, &mut state, &config, Channel::Text);
        assert_eq!(result.unwrap_err(), MatchError::InputTooShort);
    }
}
