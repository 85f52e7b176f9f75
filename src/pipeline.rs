//! End-to-end columnizing run.
//!
//! 1. reset the output directory
//! 2. ingest every input file, routing observations into year buffers
//! 3. flush every buffer
//! 4. sort and write each year's columns in parallel
//!
//! Any error aborts the run and is returned to the caller; whether a single
//! bad input file is fatal is decided by [`Config::failure_policy`].

use crate::buffer::{BufferManager, BufferReport};
use crate::columns::{PartitionSummary, emit_all};
use crate::config::Config;
use crate::ingest::{IngestOptions, IngestReport, ingest_files};
use crate::io::glob::discover_inputs;
use crate::observation::Observation;
use crate::parser::parse_line;
use crate::staging::StagingLayout;
use crate::stats::{RunStats, StatsSnapshot};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, info_span};

#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub ingest: IngestReport,
    pub buffers: BufferReport,
    pub partitions: Vec<PartitionSummary>,
    pub stats: StatsSnapshot,
}

impl RunReport {
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.partitions.iter().map(|p| p.rows).sum()
    }
}

/// Remove and recreate `dir`.
///
/// # Errors
/// Returns an error if the directory cannot be removed or created.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("mkdir -p {}", dir.display()))
}

/// Run the whole pipeline described by `config`.
///
/// # Errors
/// Returns the first fatal error: invalid config, unreadable inputs (under
/// the abort policy), malformed line headers, staging or output I/O.
pub fn run(config: &Config) -> Result<RunReport> {
    config.validate()?;
    let span = info_span!("columnize", element = %config.element);
    let _guard = span.enter();

    let stats = RunStats::new();
    let files = discover_inputs(&config.input_dir, &config.input_pattern)?;
    info!(files = files.len(), input = %config.input_dir.display(), "discovered inputs");

    reset_dir(&config.output_dir)?;
    let layout = StagingLayout::new(&config.output_dir);
    let mut manager = BufferManager::new(layout.clone(), config.flush_threshold_bytes);

    let element = config.element;
    let ingest = ingest_files(
        &files,
        &IngestOptions::from(config),
        |line| {
            let parsed = parse_line(line, element)?;
            if !parsed.matched {
                return Ok(None);
            }
            stats.add_skips(parsed.skipped);
            stats.add_observations(parsed.observations.len() as u64);
            Ok(Some(parsed.observations))
        },
        |batch: Vec<Observation>| manager.route_all(batch),
    )?;
    stats.add_lines(ingest.lines_read, ingest.lines_matched);
    stats.add_files(ingest.files_read, ingest.files_skipped);

    let buffers = manager.finish()?;
    stats.add_flushes(buffers.flushes);

    let partitions = emit_all(&layout, config.sort_workers(), config.compression_level)?;
    stats.add_partitions_emitted(partitions.len() as u64);

    let snapshot = stats.snapshot();
    info!(
        files = snapshot.files_read,
        skipped_files = snapshot.files_skipped,
        observations = snapshot.observations,
        partitions = partitions.len(),
        elapsed_ms = snapshot.elapsed_ms,
        "run complete"
    );
    Ok(RunReport { ingest, buffers, partitions, stats: snapshot })
}
