//! Benchmark report output
//!
//! Semicolon-delimited CSV files plus a JSON run summary per sample. Absent
//! confusion counts (degenerate input) serialize as empty fields, never as
//! zero, so downstream analysis can tell "no correct connections" apart from
//! "could not be scored".

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Channel;
use crate::evaluation::{ConfusionResult, EvaluationManager, MetricEvaluation, RuntimeSample};

// The csv serializer cannot flatten nested structs, so every row struct
// repeats the shared column block in full.

#[derive(Debug, Serialize)]
struct PerRevisionRow<'a> {
    #[serde(rename = "Sample")]
    sample: &'a str,
    #[serde(rename = "Metric")]
    metric: &'a str,
    #[serde(rename = "Threshold")]
    threshold: f64,
    #[serde(rename = "DocumentId")]
    document_id: u32,
    #[serde(rename = "RevisionId")]
    revision_id: u32,
    #[serde(rename = "PossibleConnections")]
    possible_connections: u64,
    #[serde(rename = "RuntimeTextTotal")]
    runtime_text_total: u64,
    #[serde(rename = "RuntimeTextUser")]
    runtime_text_user: u64,
    #[serde(rename = "TextBlockCount")]
    text_block_count: u64,
    #[serde(rename = "PossibleConnectionsText")]
    possible_connections_text: u64,
    #[serde(rename = "TruePositivesText")]
    true_positives_text: Option<u64>,
    #[serde(rename = "TrueNegativesText")]
    true_negatives_text: Option<u64>,
    #[serde(rename = "FalsePositivesText")]
    false_positives_text: Option<u64>,
    #[serde(rename = "FalseNegativesText")]
    false_negatives_text: Option<u64>,
    #[serde(rename = "RuntimeCodeTotal")]
    runtime_code_total: u64,
    #[serde(rename = "RuntimeCodeUser")]
    runtime_code_user: u64,
    #[serde(rename = "CodeBlockCount")]
    code_block_count: u64,
    #[serde(rename = "PossibleConnectionsCode")]
    possible_connections_code: u64,
    #[serde(rename = "TruePositivesCode")]
    true_positives_code: Option<u64>,
    #[serde(rename = "TrueNegativesCode")]
    true_negatives_code: Option<u64>,
    #[serde(rename = "FalsePositivesCode")]
    false_positives_code: Option<u64>,
    #[serde(rename = "FalseNegativesCode")]
    false_negatives_code: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PerDocumentRow<'a> {
    #[serde(rename = "Sample")]
    sample: &'a str,
    #[serde(rename = "Metric")]
    metric: &'a str,
    #[serde(rename = "Threshold")]
    threshold: f64,
    #[serde(rename = "DocumentId")]
    document_id: u32,
    #[serde(rename = "VersionCount")]
    version_count: u64,
    #[serde(rename = "PossibleConnections")]
    possible_connections: u64,
    #[serde(rename = "RuntimeTextTotal")]
    runtime_text_total: u64,
    #[serde(rename = "RuntimeTextUser")]
    runtime_text_user: u64,
    #[serde(rename = "TextBlockCount")]
    text_block_count: u64,
    #[serde(rename = "PossibleConnectionsText")]
    possible_connections_text: u64,
    #[serde(rename = "TruePositivesText")]
    true_positives_text: Option<u64>,
    #[serde(rename = "TrueNegativesText")]
    true_negatives_text: Option<u64>,
    #[serde(rename = "FalsePositivesText")]
    false_positives_text: Option<u64>,
    #[serde(rename = "FalseNegativesText")]
    false_negatives_text: Option<u64>,
    #[serde(rename = "RuntimeCodeTotal")]
    runtime_code_total: u64,
    #[serde(rename = "RuntimeCodeUser")]
    runtime_code_user: u64,
    #[serde(rename = "CodeBlockCount")]
    code_block_count: u64,
    #[serde(rename = "PossibleConnectionsCode")]
    possible_connections_code: u64,
    #[serde(rename = "TruePositivesCode")]
    true_positives_code: Option<u64>,
    #[serde(rename = "TrueNegativesCode")]
    true_negatives_code: Option<u64>,
    #[serde(rename = "FalsePositivesCode")]
    false_positives_code: Option<u64>,
    #[serde(rename = "FalseNegativesCode")]
    false_negatives_code: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AggregatedRow<'a> {
    #[serde(rename = "Metric")]
    metric: &'a str,
    #[serde(rename = "Threshold")]
    threshold: f64,
    #[serde(rename = "Documents")]
    documents: u64,
    #[serde(rename = "PossibleConnections")]
    possible_connections: u64,
    #[serde(rename = "RuntimeTextTotal")]
    runtime_text_total: u64,
    #[serde(rename = "RuntimeTextUser")]
    runtime_text_user: u64,
    #[serde(rename = "TextBlockCount")]
    text_block_count: u64,
    #[serde(rename = "PossibleConnectionsText")]
    possible_connections_text: u64,
    #[serde(rename = "TruePositivesText")]
    true_positives_text: Option<u64>,
    #[serde(rename = "TrueNegativesText")]
    true_negatives_text: Option<u64>,
    #[serde(rename = "FalsePositivesText")]
    false_positives_text: Option<u64>,
    #[serde(rename = "FalseNegativesText")]
    false_negatives_text: Option<u64>,
    #[serde(rename = "RuntimeCodeTotal")]
    runtime_code_total: u64,
    #[serde(rename = "RuntimeCodeUser")]
    runtime_code_user: u64,
    #[serde(rename = "CodeBlockCount")]
    code_block_count: u64,
    #[serde(rename = "PossibleConnectionsCode")]
    possible_connections_code: u64,
    #[serde(rename = "TruePositivesCode")]
    true_positives_code: Option<u64>,
    #[serde(rename = "TrueNegativesCode")]
    true_negatives_code: Option<u64>,
    #[serde(rename = "FalsePositivesCode")]
    false_positives_code: Option<u64>,
    #[serde(rename = "FalseNegativesCode")]
    false_negatives_code: Option<u64>,
}

/// The shared column block: overall possible connections, then runtime,
/// block and confusion counts per channel. Internal carrier only; the row
/// structs above repeat these fields for serialization.
#[derive(Debug)]
struct ChannelColumns {
    possible_connections: u64,
    runtime_text_total: u64,
    runtime_text_user: u64,
    text_block_count: u64,
    possible_connections_text: u64,
    true_positives_text: Option<u64>,
    true_negatives_text: Option<u64>,
    false_positives_text: Option<u64>,
    false_negatives_text: Option<u64>,
    runtime_code_total: u64,
    runtime_code_user: u64,
    code_block_count: u64,
    possible_connections_code: u64,
    true_positives_code: Option<u64>,
    true_negatives_code: Option<u64>,
    false_positives_code: Option<u64>,
    false_negatives_code: Option<u64>,
}

impl ChannelColumns {
    fn new(
        text: &ConfusionResult,
        text_runtime: RuntimeSample,
        code: &ConfusionResult,
        code_runtime: RuntimeSample,
    ) -> Self {
        // total runtime is the wall-clock measurement; CPU time stays internal
        Self {
            possible_connections: text.possible_connections + code.possible_connections,
            runtime_text_total: text_runtime.wall_nanos,
            runtime_text_user: text_runtime.user_nanos,
            text_block_count: text.block_count,
            possible_connections_text: text.possible_connections,
            true_positives_text: text.true_positives,
            true_negatives_text: text.true_negatives,
            false_positives_text: text.false_positives,
            false_negatives_text: text.false_negatives,
            runtime_code_total: code_runtime.wall_nanos,
            runtime_code_user: code_runtime.user_nanos,
            code_block_count: code.block_count,
            possible_connections_code: code.possible_connections,
            true_positives_code: code.true_positives,
            true_negatives_code: code.true_negatives,
            false_positives_code: code.false_positives,
            false_negatives_code: code.false_negatives,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    sample: &'a str,
    timestamp: DateTime<Utc>,
    repetitions: u32,
    shuffle: bool,
    metric_count: usize,
    document_count: usize,
    per_revision_rows: usize,
    per_document_rows: usize,
}

/// Writes all report files for benchmark runs into one output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("failed to create output directory: {}", output_dir.display())
        })?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    fn csv_writer(&self, file_name: &str) -> Result<(csv::Writer<File>, PathBuf)> {
        let path = self.output_dir.join(file_name);
        let writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_path(&path)
            .with_context(|| format!("failed to create report file: {}", path.display()))?;
        Ok((writer, path))
    }

    /// One row per (metric, threshold, document, revision). Returns the row
    /// count.
    pub fn write_per_revision(&self, manager: &EvaluationManager) -> Result<usize> {
        let (mut writer, path) =
            self.csv_writer(&format!("{}_per_revision.csv", manager.sample_name()))?;

        let mut rows = 0;
        for document in manager.document_evaluations() {
            for evaluation in &document.evaluations {
                for revision in evaluation.document().revisions() {
                    let c = revision_columns(evaluation, revision.id);
                    let row = PerRevisionRow {
                        sample: manager.sample_name(),
                        metric: evaluation.metric_name(),
                        threshold: evaluation.threshold(),
                        document_id: evaluation.document_id(),
                        revision_id: revision.id,
                        possible_connections: c.possible_connections,
                        runtime_text_total: c.runtime_text_total,
                        runtime_text_user: c.runtime_text_user,
                        text_block_count: c.text_block_count,
                        possible_connections_text: c.possible_connections_text,
                        true_positives_text: c.true_positives_text,
                        true_negatives_text: c.true_negatives_text,
                        false_positives_text: c.false_positives_text,
                        false_negatives_text: c.false_negatives_text,
                        runtime_code_total: c.runtime_code_total,
                        runtime_code_user: c.runtime_code_user,
                        code_block_count: c.code_block_count,
                        possible_connections_code: c.possible_connections_code,
                        true_positives_code: c.true_positives_code,
                        true_negatives_code: c.true_negatives_code,
                        false_positives_code: c.false_positives_code,
                        false_negatives_code: c.false_negatives_code,
                    };
                    writer.serialize(row)?;
                    rows += 1;
                }
            }
        }
        writer.flush()?;
        tracing::info!(path = %path.display(), rows, "per-revision report written");
        Ok(rows)
    }

    /// One row per (metric, threshold, document), confusion summed over
    /// revisions.
    pub fn write_per_document(&self, manager: &EvaluationManager) -> Result<usize> {
        let (mut writer, path) =
            self.csv_writer(&format!("{}_per_document.csv", manager.sample_name()))?;

        let mut rows = 0;
        for document in manager.document_evaluations() {
            for evaluation in &document.evaluations {
                let c = document_columns(evaluation);
                let row = PerDocumentRow {
                    sample: manager.sample_name(),
                    metric: evaluation.metric_name(),
                    threshold: evaluation.threshold(),
                    document_id: evaluation.document_id(),
                    version_count: evaluation.document().revision_count() as u64,
                    possible_connections: c.possible_connections,
                    runtime_text_total: c.runtime_text_total,
                    runtime_text_user: c.runtime_text_user,
                    text_block_count: c.text_block_count,
                    possible_connections_text: c.possible_connections_text,
                    true_positives_text: c.true_positives_text,
                    true_negatives_text: c.true_negatives_text,
                    false_positives_text: c.false_positives_text,
                    false_negatives_text: c.false_negatives_text,
                    runtime_code_total: c.runtime_code_total,
                    runtime_code_user: c.runtime_code_user,
                    code_block_count: c.code_block_count,
                    possible_connections_code: c.possible_connections_code,
                    true_positives_code: c.true_positives_code,
                    true_negatives_code: c.true_negatives_code,
                    false_positives_code: c.false_positives_code,
                    false_negatives_code: c.false_negatives_code,
                };
                writer.serialize(row)?;
                rows += 1;
            }
        }
        writer.flush()?;
        tracing::info!(path = %path.display(), rows, "per-document report written");
        Ok(rows)
    }

    /// JSON run summary for one sample.
    pub fn write_run_summary(
        &self,
        manager: &EvaluationManager,
        per_revision_rows: usize,
        per_document_rows: usize,
    ) -> Result<()> {
        let path = self.output_dir.join(format!("{}_run.json", manager.sample_name()));
        let summary = RunSummary {
            sample: manager.sample_name(),
            timestamp: Utc::now(),
            repetitions: manager.repetitions(),
            shuffle: manager.randomize_order(),
            metric_count: manager.catalog_len(),
            document_count: manager.document_count(),
            per_revision_rows,
            per_document_rows,
        };
        let file = File::create(&path)
            .with_context(|| format!("failed to create run summary: {}", path.display()))?;
        serde_json::to_writer_pretty(file, &summary)?;
        Ok(())
    }
}

fn revision_columns(evaluation: &MetricEvaluation, revision_id: u32) -> ChannelColumns {
    let empty = ConfusionResult::default();
    let text = evaluation.channel(Channel::Text);
    let code = evaluation.channel(Channel::Code);
    ChannelColumns::new(
        text.revision_result(revision_id).unwrap_or(&empty),
        text.revision_runtime(revision_id).unwrap_or_default(),
        code.revision_result(revision_id).unwrap_or(&empty),
        code.revision_runtime(revision_id).unwrap_or_default(),
    )
}

fn document_columns(evaluation: &MetricEvaluation) -> ChannelColumns {
    let text = evaluation.channel(Channel::Text);
    let code = evaluation.channel(Channel::Code);
    ChannelColumns::new(
        &text.document_result(),
        text.document_runtime(),
        &code.document_result(),
        code.document_runtime(),
    )
}

#[derive(Debug)]
struct AggregateEntry {
    metric: String,
    threshold: f64,
    documents: u64,
    text: ConfusionResult,
    code: ConfusionResult,
    text_runtime: RuntimeSample,
    code_runtime: RuntimeSample,
}

/// Accumulates per-(metric, threshold) totals across all samples; written as
/// `aggregated.csv` once every sample has run.
#[derive(Debug, Default)]
pub struct Aggregator {
    entries: Vec<AggregateEntry>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_manager(&mut self, manager: &EvaluationManager) {
        for document in manager.document_evaluations() {
            for evaluation in &document.evaluations {
                let entry = self.entry(evaluation.metric_name(), evaluation.threshold());
                entry.documents += 1;
                entry.text = entry
                    .text
                    .add(&evaluation.channel(Channel::Text).document_result());
                entry.code = entry
                    .code
                    .add(&evaluation.channel(Channel::Code).document_result());
                entry
                    .text_runtime
                    .accumulate(evaluation.channel(Channel::Text).document_runtime());
                entry
                    .code_runtime
                    .accumulate(evaluation.channel(Channel::Code).document_runtime());
            }
        }
    }

    fn entry(&mut self, metric: &str, threshold: f64) -> &mut AggregateEntry {
        let position = self
            .entries
            .iter()
            .position(|e| e.metric == metric && e.threshold.to_bits() == threshold.to_bits());
        match position {
            Some(index) => &mut self.entries[index],
            None => {
                self.entries.push(AggregateEntry {
                    metric: metric.to_string(),
                    threshold,
                    documents: 0,
                    text: ConfusionResult::default(),
                    code: ConfusionResult::default(),
                    text_runtime: RuntimeSample::default(),
                    code_runtime: RuntimeSample::default(),
                });
                let index = self.entries.len() - 1;
                &mut self.entries[index]
            }
        }
    }

    /// Write `aggregated.csv`. Returns the row count.
    pub fn write(&self, writer: &ReportWriter) -> Result<usize> {
        let (mut csv_writer, path) = writer.csv_writer("aggregated.csv")?;
        for entry in &self.entries {
            let c = ChannelColumns::new(
                &entry.text,
                entry.text_runtime,
                &entry.code,
                entry.code_runtime,
            );
            csv_writer.serialize(AggregatedRow {
                metric: &entry.metric,
                threshold: entry.threshold,
                documents: entry.documents,
                possible_connections: c.possible_connections,
                runtime_text_total: c.runtime_text_total,
                runtime_text_user: c.runtime_text_user,
                text_block_count: c.text_block_count,
                possible_connections_text: c.possible_connections_text,
                true_positives_text: c.true_positives_text,
                true_negatives_text: c.true_negatives_text,
                false_positives_text: c.false_positives_text,
                false_negatives_text: c.false_negatives_text,
                runtime_code_total: c.runtime_code_total,
                runtime_code_user: c.runtime_code_user,
                code_block_count: c.code_block_count,
                possible_connections_code: c.possible_connections_code,
                true_positives_code: c.true_positives_code,
                true_negatives_code: c.true_negatives_code,
                false_positives_code: c.false_positives_code,
                false_negatives_code: c.false_negatives_code,
            })?;
        }
        csv_writer.flush()?;
        tracing::info!(path = %path.display(), rows = self.entries.len(), "aggregated report written");
        Ok(self.entries.len())
    }
}
