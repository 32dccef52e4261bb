//! Confusion-matrix results
//!
//! Counts are `Option<u64>`: absent (not yet measured, or degenerate input)
//! is distinct from zero and must survive aggregation. For any fully
//! computed result the four counts reconcile with the possible-connection
//! count by construction; the constructor asserts this identity every time.

use std::collections::HashSet;

use crate::corpus::Connection;
use crate::error::BenchError;

/// Confusion counts for one revision (or an aggregation of revisions) and
/// one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionResult {
    pub possible_connections: u64,
    pub block_count: u64,
    pub true_positives: Option<u64>,
    pub false_positives: Option<u64>,
    pub true_negatives: Option<u64>,
    pub false_negatives: Option<u64>,
}

/// Nullable-aware addition: both absent stays absent, one absent keeps the
/// other, both present sums.
fn add_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x + y),
        (Some(x), None) => Some(x),
        (None, y) => y,
    }
}

impl ConfusionResult {
    /// Result of a degenerate channel pass: block counts recorded, confusion
    /// absent.
    pub fn degenerate(possible_connections: u64, block_count: u64) -> Self {
        Self {
            possible_connections,
            block_count,
            ..Self::default()
        }
    }

    /// Compute confusion counts from the ground-truth and computed connection
    /// sets. Fails with a consistency error when the counts do not reconcile
    /// with the possible-connection count.
    pub fn measured(
        possible_connections: u64,
        block_count: u64,
        ground_truth: &HashSet<Connection>,
        computed: &HashSet<Connection>,
    ) -> Result<Self, BenchError> {
        let true_positives = ground_truth.intersection(computed).count() as u64;
        let false_positives = computed.difference(ground_truth).count() as u64;
        let false_negatives = ground_truth.difference(computed).count() as u64;
        let union = ground_truth.union(computed).count() as u64;

        if union > possible_connections {
            return Err(BenchError::Consistency(format!(
                "connection union {union} exceeds possible connections {possible_connections}"
            )));
        }
        let true_negatives = possible_connections - union;

        let total = true_positives + false_positives + true_negatives + false_negatives;
        if total != possible_connections {
            return Err(BenchError::Consistency(format!(
                "confusion counts sum to {total}, expected {possible_connections}"
            )));
        }

        Ok(Self {
            possible_connections,
            block_count,
            true_positives: Some(true_positives),
            false_positives: Some(false_positives),
            true_negatives: Some(true_negatives),
            false_negatives: Some(false_negatives),
        })
    }

    /// True when the confusion counts are absent (degenerate or unmeasured).
    pub fn is_degenerate(&self) -> bool {
        self.true_positives.is_none()
    }

    /// Field-wise aggregation over revisions or documents.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            possible_connections: self.possible_connections + other.possible_connections,
            block_count: self.block_count + other.block_count,
            true_positives: add_opt(self.true_positives, other.true_positives),
            false_positives: add_opt(self.false_positives, other.false_positives),
            true_negatives: add_opt(self.true_negatives, other.true_negatives),
            false_negatives: add_opt(self.false_negatives, other.false_negatives),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Channel;

    fn connection(revision_id: u32, position: u32) -> Connection {
        Connection {
            revision_id,
            channel: Channel::Text,
            pred_position: 0,
            position,
        }
    }

    #[test]
    fn test_measured_counts_reconcile() {
        let gt: HashSet<_> = [connection(2, 0), connection(2, 1)].into();
        let computed: HashSet<_> = [connection(2, 0), connection(2, 2)].into();

        let result = ConfusionResult::measured(6, 5, &gt, &computed).unwrap();
        assert_eq!(result.true_positives, Some(1));
        assert_eq!(result.false_positives, Some(1));
        assert_eq!(result.false_negatives, Some(1));
        assert_eq!(result.true_negatives, Some(3));
        assert!(!result.is_degenerate());
    }

    #[test]
    fn test_measured_rejects_impossible_counts() {
        let gt: HashSet<_> = [connection(2, 0)].into();
        let computed: HashSet<_> = [connection(2, 1)].into();
        // union of two connections cannot fit one possible connection
        assert!(ConfusionResult::measured(1, 2, &gt, &computed).is_err());
    }

    #[test]
    fn test_degenerate_keeps_block_count() {
        let result = ConfusionResult::degenerate(4, 3);
        assert!(result.is_degenerate());
        assert_eq!(result.block_count, 3);
        assert_eq!(result.possible_connections, 4);
    }

    #[test]
    fn test_nullable_aware_addition() {
        let measured =
            ConfusionResult::measured(1, 2, &HashSet::from([connection(2, 0)]), &HashSet::new())
                .unwrap();
        let degenerate = ConfusionResult::degenerate(4, 3);

        let sum = measured.add(&degenerate);
        assert_eq!(sum.possible_connections, 5);
        assert_eq!(sum.block_count, 5);
        // absent does not collapse present counts to absent
        assert_eq!(sum.true_positives, Some(0));
        assert_eq!(sum.false_negatives, Some(1));

        let both_absent = degenerate.add(&degenerate);
        assert!(both_absent.is_degenerate());
    }
}
