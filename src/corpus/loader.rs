//! Corpus CSV loaders
//!
//! A sample is a directory with a `documents.csv` catalog plus one revision
//! history file (`<id>.csv`) and one ground-truth file (`<id>_gt.csv`) per
//! document. All files are semicolon-delimited with headers, matching the
//! report formats.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::config::Channel;

use super::{Block, Document, DocumentId, GroundTruth, Revision};
use super::ground_truth::GtRevision;

/// One row of `documents.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentCatalogEntry {
    #[serde(rename = "DocumentId")]
    pub document_id: DocumentId,
    #[serde(rename = "VersionCount")]
    pub version_count: usize,
}

/// A loaded sample: its name plus the document catalog. Documents themselves
/// are loaded one by one so the manager can validate each against its
/// declared version count.
#[derive(Debug)]
pub struct Sample {
    pub name: String,
    pub catalog: Vec<DocumentCatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct RevisionRecord {
    #[serde(rename = "RevisionId")]
    revision_id: u32,
    #[serde(rename = "Channel")]
    channel: Channel,
    #[serde(rename = "Position")]
    position: u32,
    #[serde(rename = "Content")]
    content: String,
    #[serde(rename = "PredPosition")]
    pred_position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GroundTruthRecord {
    #[serde(rename = "RevisionId")]
    revision_id: u32,
    #[serde(rename = "Channel")]
    channel: Channel,
    #[serde(rename = "Position")]
    position: u32,
    #[serde(rename = "PredPosition")]
    pred_position: Option<u32>,
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.is_file() {
        bail!("file not found: {}", path.display());
    }
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("failed to open CSV file: {}", path.display()))
}

/// Read the document catalog of a sample directory.
pub fn load_sample(sample_dir: &Path) -> Result<Sample> {
    let name = sample_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("sample")
        .to_string();
    let catalog_path = sample_dir.join("documents.csv");
    let mut reader = reader(&catalog_path)?;

    let mut catalog = Vec::new();
    for record in reader.deserialize() {
        let entry: DocumentCatalogEntry = record
            .with_context(|| format!("malformed catalog row in {}", catalog_path.display()))?;
        catalog.push(entry);
    }

    tracing::info!(sample = %name, documents = catalog.len(), "read document catalog");
    Ok(Sample { name, catalog })
}

/// Read one document's revision history (`<id>.csv`). Revision order is
/// first appearance; block positions must be contiguous per revision and
/// channel.
pub fn load_document(sample_dir: &Path, document_id: DocumentId) -> Result<Document> {
    let path = sample_dir.join(format!("{document_id}.csv"));
    let mut reader = reader(&path)?;

    let mut revisions: Vec<Revision> = Vec::new();
    for record in reader.deserialize() {
        let record: RevisionRecord =
            record.with_context(|| format!("malformed revision row in {}", path.display()))?;

        if revisions.last().map(|r| r.id) != Some(record.revision_id) {
            if revisions.iter().any(|r| r.id == record.revision_id) {
                bail!(
                    "revision {} appears out of order in {}",
                    record.revision_id,
                    path.display()
                );
            }
            revisions.push(Revision::new(record.revision_id));
        }
        let index = revisions.len() - 1;
        let revision = &mut revisions[index];

        let expected = revision.block_count(record.channel) as u32;
        if record.position != expected {
            bail!(
                "non-contiguous {} block position {} (expected {}) for revision {} in {}",
                record.channel,
                record.position,
                expected,
                record.revision_id,
                path.display()
            );
        }
        revision.push_block(
            record.channel,
            Block {
                content: record.content,
                pred_position: record.pred_position,
            },
        );
    }

    Ok(Document::new(document_id, revisions))
}

/// Read one document's ground truth (`<id>_gt.csv`).
pub fn load_ground_truth(sample_dir: &Path, document_id: DocumentId) -> Result<GroundTruth> {
    let path = sample_dir.join(format!("{document_id}_gt.csv"));
    let mut reader = reader(&path)?;

    let mut revisions: Vec<GtRevision> = Vec::new();
    for record in reader.deserialize() {
        let record: GroundTruthRecord =
            record.with_context(|| format!("malformed ground truth row in {}", path.display()))?;

        if revisions.last().map(|r| r.id) != Some(record.revision_id) {
            if revisions.iter().any(|r| r.id == record.revision_id) {
                bail!(
                    "revision {} appears out of order in {}",
                    record.revision_id,
                    path.display()
                );
            }
            revisions.push(GtRevision::new(record.revision_id));
        }
        let index = revisions.len() - 1;
        let revision = &mut revisions[index];

        let expected = revision.block_count(record.channel) as u32;
        if record.position != expected {
            bail!(
                "non-contiguous {} block position {} (expected {}) for revision {} in {}",
                record.channel,
                record.position,
                expected,
                record.revision_id,
                path.display()
            );
        }
        revision.push_pred(record.channel, record.pred_position);
    }

    Ok(GroundTruth::new(document_id, revisions))
}
