//! Corpus model
//!
//! A [`Document`] is an ordered sequence of revisions, each holding text and
//! code blocks. Blocks optionally carry an author-annotated predecessor
//! position (the correspondence the ground truth was derived from); the
//! harness never feeds those links to the matching algorithm, they exist
//! only for load-time validation.

pub mod ground_truth;
pub mod loader;

use std::collections::HashSet;

use serde::Serialize;

use crate::config::Channel;

pub use ground_truth::GroundTruth;
pub use loader::{load_document, load_ground_truth, load_sample, DocumentCatalogEntry, Sample};

pub type DocumentId = u32;
pub type RevisionId = u32;

/// A claimed correspondence between a block in a revision and a block in the
/// preceding revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Connection {
    pub revision_id: RevisionId,
    pub channel: Channel,
    /// Block position in the preceding revision.
    pub pred_position: u32,
    /// Block position in this revision.
    pub position: u32,
}

/// One block of content within a revision.
#[derive(Debug, Clone)]
pub struct Block {
    pub content: String,
    /// Author-annotated predecessor position, if any.
    pub pred_position: Option<u32>,
}

/// One historical version of a document.
#[derive(Debug, Clone)]
pub struct Revision {
    pub id: RevisionId,
    text_blocks: Vec<Block>,
    code_blocks: Vec<Block>,
}

impl Revision {
    pub fn new(id: RevisionId) -> Self {
        Self {
            id,
            text_blocks: Vec::new(),
            code_blocks: Vec::new(),
        }
    }

    pub fn push_block(&mut self, channel: Channel, block: Block) {
        match channel {
            Channel::Text => self.text_blocks.push(block),
            Channel::Code => self.code_blocks.push(block),
        }
    }

    pub fn blocks(&self, channel: Channel) -> &[Block] {
        match channel {
            Channel::Text => &self.text_blocks,
            Channel::Code => &self.code_blocks,
        }
    }

    pub fn block_count(&self, channel: Channel) -> usize {
        self.blocks(channel).len()
    }
}

/// A document: a stable id plus its chronological revision sequence.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    revisions: Vec<Revision>,
}

impl Document {
    pub fn new(id: DocumentId, revisions: Vec<Revision>) -> Self {
        Self { id, revisions }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    pub fn revision_ids(&self) -> Vec<RevisionId> {
        self.revisions.iter().map(|r| r.id).collect()
    }

    pub fn revision(&self, id: RevisionId) -> Option<&Revision> {
        self.revisions.iter().find(|r| r.id == id)
    }

    /// Total block count for a channel across all revisions.
    pub fn block_count(&self, channel: Channel) -> u64 {
        self.revisions
            .iter()
            .map(|r| r.block_count(channel) as u64)
            .sum()
    }

    /// Theoretically possible connections for one revision and channel: the
    /// product of the adjacent revisions' block counts. The first revision
    /// has no predecessor, so zero.
    pub fn possible_connections_for(&self, revision_id: RevisionId, channel: Channel) -> u64 {
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

    /// Possible connections for a channel, summed over all revisions.
    pub fn possible_connections_channel(&self, channel: Channel) -> u64 {
        self.revisions
            .iter()
            .map(|r| self.possible_connections_for(r.id, channel))
            .sum()
    }

    /// Possible connections over both channels.
    pub fn possible_connections(&self) -> u64 {
        Channel::ALL
            .iter()
            .map(|&c| self.possible_connections_channel(c))
            .sum()
    }

    /// Connections derived from the author-annotated predecessor links.
    /// `None` selects both channels.
    pub fn connections(&self, channel: Option<Channel>) -> HashSet<Connection> {
        let mut connections = HashSet::new();
        for revision in self.revisions.iter().skip(1) {
            for ch in Channel::ALL {
                if channel.is_some_and(|selected| selected != ch) {
                    continue;
                }
                for (position, block) in revision.blocks(ch).iter().enumerate() {
                    if let Some(pred_position) = block.pred_position {
                        connections.insert(Connection {
                            revision_id: revision.id,
                            channel: ch,
                            pred_position,
                            position: position as u32,
                        });
                    }
                }
            }
        }
        connections
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;

    /// A block without a predecessor link.
    pub fn block(content: &str) -> Block {
        Block {
            content: content.to_string(),
            pred_position: None,
        }
    }

    /// A block linked to a predecessor position.
    pub fn linked_block(content: &str, pred: u32) -> Block {
        Block {
            content: content.to_string(),
            pred_position: Some(pred),
        }
    }

    /// Two-revision document: one text block and one code block per revision,
    /// each second-revision block linked to its predecessor.
    pub fn two_revision_document(id: DocumentId) -> Document {
        let mut first = Revision::new(1);
        first.push_block(Channel::Text, block("the quick brown fox"));
        first.push_block(Channel::Code, block("fn main() { println!(\"hi\"); }"));

        let mut second = Revision::new(2);
        second.push_block(Channel::Text, linked_block("the quick brown fox jumps", 0));
        second.push_block(Channel::Code, linked_block("fn main() { println!(\"hi\"); }", 0));

        Document::new(id, vec![first, second])
    }
}
