//! Configuration passed into the matching algorithm
//!
//! A `MatcherConfig` binds a similarity metric and threshold per content
//! channel. The evaluation engine builds one per (metric, threshold) pair;
//! both channels use the same metric during benchmarking, but the matcher
//! only ever reads the channel it was asked to process, so mixed
//! configurations remain possible.

use serde::{Deserialize, Serialize};

use crate::metrics::SimilarityMetric;

/// Content partition within a document's blocks, scored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Text,
    Code,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Text, Channel::Code];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Metric and threshold configuration for one matcher invocation.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    text_metric: SimilarityMetric,
    text_threshold: f64,
    code_metric: SimilarityMetric,
    code_threshold: f64,
}

impl MatcherConfig {
    /// Use the same metric and threshold for both channels.
    pub fn uniform(metric: SimilarityMetric, threshold: f64) -> Self {
        Self {
            text_metric: metric.clone(),
            text_threshold: threshold,
            code_metric: metric,
            code_threshold: threshold,
        }
    }

    pub fn with_text_metric(mut self, metric: SimilarityMetric, threshold: f64) -> Self {
        self.text_metric = metric;
        self.text_threshold = threshold;
        self
    }

    pub fn with_code_metric(mut self, metric: SimilarityMetric, threshold: f64) -> Self {
        self.code_metric = metric;
        self.code_threshold = threshold;
        self
    }

    pub fn metric(&self, channel: Channel) -> &SimilarityMetric {
        match channel {
            Channel::Text => &self.text_metric,
            Channel::Code => &self.code_metric,
        }
    }

    pub fn threshold(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Text => self.text_threshold,
            Channel::Code => self.code_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SimilarityMetric;

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::Text.name(), "text");
        assert_eq!(Channel::Code.name(), "code");
    }

    #[test]
    fn test_per_channel_config() {
        let equal =
            SimilarityMetric::new("equal", |a: &str, b: &str| Ok(if a == b { 1.0 } else { 0.0 }));
        let config = MatcherConfig::uniform(equal.clone(), 0.5).with_code_metric(equal, 0.9);

        assert_eq!(config.threshold(Channel::Text), 0.5);
        assert_eq!(config.threshold(Channel::Code), 0.9);
        assert_eq!(config.metric(Channel::Text).name(), "equal");
    }
}
