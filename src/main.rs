use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use similarity_benchmark::evaluation::EvaluationManager;
use similarity_benchmark::metrics::{self, MetricConfig};
use similarity_benchmark::report::{Aggregator, ReportWriter};

/// Benchmark similarity metrics against ground-truth block correspondences.
#[derive(Debug, Parser)]
#[command(name = "similarity-benchmark", version)]
struct Cli {
    /// Directory containing one subdirectory per sample
    #[arg(long)]
    samples_dir: PathBuf,

    /// Directory the reports are written to
    #[arg(long)]
    output_dir: PathBuf,

    /// Worker pool size; each worker owns one document at a time
    #[arg(long, default_value_t = 1)]
    thread_count: usize,

    /// Timed repetitions per evaluation
    #[arg(long, default_value_t = 4)]
    repetitions: u32,

    /// Keep the evaluation order fixed instead of shuffling per repetition
    #[arg(long)]
    no_shuffle: bool,

    /// TOML file selecting a subset of metrics and thresholds
    #[arg(long, conflicts_with_all = ["default_metric", "combined_metrics"])]
    selected_metrics: Option<PathBuf>,

    /// Run only the baseline metric
    #[arg(long, conflicts_with = "combined_metrics")]
    default_metric: bool,

    /// Run the combined metrics (n-gram primary with token-level fallback)
    #[arg(long)]
    combined_metrics: bool,
}

fn build_catalog(cli: &Cli) -> Result<Vec<MetricConfig>> {
    if let Some(path) = &cli.selected_metrics {
        return metrics::selected_catalog(path);
    }
    if cli.default_metric {
        return Ok(metrics::default_metric_catalog());
    }
    if cli.combined_metrics {
        return Ok(metrics::combined_catalog());
    }
    Ok(metrics::default_catalog())
}

/// Sample directories are the subdirectories carrying a document catalog.
fn sample_dirs(samples_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(samples_dir)
        .with_context(|| format!("failed to read samples directory: {}", samples_dir.display()))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() && path.join("documents.csv").is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let catalog = build_catalog(&cli)?;
    let samples = sample_dirs(&cli.samples_dir)?;
    if samples.is_empty() {
        bail!("no sample directories found in {}", cli.samples_dir.display());
    }
    tracing::info!(
        samples = samples.len(),
        metrics = catalog.len(),
        repetitions = cli.repetitions,
        threads = cli.thread_count,
        "benchmark configured"
    );

    let writer = ReportWriter::new(&cli.output_dir)?;
    let mut aggregator = Aggregator::new();

    for sample in samples {
        let mut manager = EvaluationManager::new(&sample, catalog.clone())?
            .with_repetitions(cli.repetitions)
            .with_thread_count(cli.thread_count)
            .with_shuffle(!cli.no_shuffle);
        manager.load()?;
        manager.validate()?;
        manager.run()?;

        let per_revision_rows = writer.write_per_revision(&manager)?;
        let per_document_rows = writer.write_per_document(&manager)?;
        writer.write_run_summary(&manager, per_revision_rows, per_document_rows)?;
        aggregator.add_manager(&manager);
    }

    aggregator.write(&writer)?;
    Ok(())
}
