//! Ground truth for one document
//!
//! The authoritative connection set and possible-connection counts, recorded
//! independently of the document's revision history so load-time validation
//! can cross-check the two.

use std::collections::HashSet;

use crate::config::Channel;

use super::{Connection, DocumentId, RevisionId};

/// Per-revision ground-truth records: one optional predecessor position per
/// block position and channel.
#[derive(Debug, Clone)]
pub struct GtRevision {
    pub id: RevisionId,
    text_preds: Vec<Option<u32>>,
    code_preds: Vec<Option<u32>>,
}

impl GtRevision {
    pub fn new(id: RevisionId) -> Self {
        Self {
            id,
            text_preds: Vec::new(),
            code_preds: Vec::new(),
        }
    }

    pub fn push_pred(&mut self, channel: Channel, pred: Option<u32>) {
        match channel {
            Channel::Text => self.text_preds.push(pred),
            Channel::Code => self.code_preds.push(pred),
        }
    }

    pub fn preds(&self, channel: Channel) -> &[Option<u32>] {
        match channel {
            Channel::Text => &self.text_preds,
            Channel::Code => &self.code_preds,
        }
    }

    pub fn block_count(&self, channel: Channel) -> usize {
        self.preds(channel).len()
    }
}

/// The authoritative correspondences for one document.
#[derive(Debug, Clone)]
pub struct GroundTruth {
    document_id: DocumentId,
    revisions: Vec<GtRevision>,
}

impl GroundTruth {
    pub fn new(document_id: DocumentId, revisions: Vec<GtRevision>) -> Self {
        Self {
            document_id,
            revisions,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn revision_ids(&self) -> Vec<RevisionId> {
        self.revisions.iter().map(|r| r.id).collect()
    }

    /// Authoritative connections for one revision and channel.
    pub fn connections(&self, revision_id: RevisionId, channel: Channel) -> HashSet<Connection> {
        let mut connections = HashSet::new();
        // the first revision has no predecessor, so no connections
        let Some(index) = self.revisions.iter().position(|r| r.id == revision_id) else {
            return connections;
        };
        if index == 0 {
            return connections;
        }
        for (position, pred) in self.revisions[index].preds(channel).iter().enumerate() {
            if let Some(pred_position) = pred {
                connections.insert(Connection {
                    revision_id,
                    channel,
                    pred_position: *pred_position,
                    position: position as u32,
                });
            }
        }
        connections
    }

    /// All connections across revisions; `None` selects both channels.
    pub fn all_connections(&self, channel: Option<Channel>) -> HashSet<Connection> {
        let mut connections = HashSet::new();
        for revision in &self.revisions {
            for ch in Channel::ALL {
                if channel.is_some_and(|selected| selected != ch) {
                    continue;
                }
                connections.extend(self.connections(revision.id, ch));
            }
        }
        connections
    }

    /// Possible connections for one revision and channel, computed from the
    /// ground truth's own block counts.
    pub fn possible_connections(&self, revision_id: RevisionId, channel: Channel) -> u64 {
        let Some(index) = self.revisions.iter().position(|r| r.id == revision_id) else {
            return 0;
        };
        if index == 0 {
            return 0;
        }
        let prev = self.revisions[index - 1].block_count(channel) as u64;
        let curr = self.revisions[index].block_count(channel) as u64;
        prev * curr
    }

    /// Possible connections over all revisions and both channels.
    pub fn possible_connections_total(&self) -> u64 {
        self.revisions
            .iter()
            .flat_map(|r| Channel::ALL.map(|c| self.possible_connections(r.id, c)))
            .sum()
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;

    /// Ground truth matching `corpus::test_fixtures::two_revision_document`.
    pub fn two_revision_ground_truth(document_id: DocumentId) -> GroundTruth {
        let mut first = GtRevision::new(1);
        first.push_pred(Channel::Text, None);
        first.push_pred(Channel::Code, None);

        let mut second = GtRevision::new(2);
        second.push_pred(Channel::Text, Some(0));
        second.push_pred(Channel::Code, Some(0));

        GroundTruth::new(document_id, vec![first, second])
    }

    /// Ground truth with blocks but no connections at all.
    pub fn empty_connection_ground_truth(document_id: DocumentId) -> GroundTruth {
        let mut first = GtRevision::new(1);
        first.push_pred(Channel::Text, None);
        GroundTruth::new(document_id, vec![first])
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;

    #[test]
    fn test_connections_skip_first_revision() {
        let gt = two_revision_ground_truth(1);
        assert!(gt.connections(1, Channel::Text).is_empty());
        assert_eq!(gt.connections(2, Channel::Text).len(), 1);
    }

    #[test]
    fn test_possible_connections_total() {
        let gt = two_revision_ground_truth(1);
        // 1x1 text + 1x1 code between revisions 1 and 2
        assert_eq!(gt.possible_connections_total(), 2);
    }

    #[test]
    fn test_all_connections_channel_filter() {
        let gt = two_revision_ground_truth(1);
        assert_eq!(gt.all_connections(None).len(), 2);
        assert_eq!(gt.all_connections(Some(Channel::Code)).len(), 1);
    }

    #[test]
    fn test_empty_ground_truth() {
        let gt = empty_connection_ground_truth(9);
        assert!(gt.all_connections(None).is_empty());
        assert_eq!(gt.possible_connections_total(), 0);
    }
}
