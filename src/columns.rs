//! Sort-and-emit: turn each partition's staging file into three aligned,
//! gzip'd columns.
//!
//! ```text
//! <out>/<year>/ids.gz      station ids, one per line
//! <out>/<year>/dates.gz    YYYY-MM-DD, one per line
//! <out>/<year>/values.gz   little-endian f64
//! ```

use crate::io::columnar::{read_f64s, read_strings, write_f64s, write_strings};
use crate::observation::{Observation, sort_observations};
use crate::staging::{self, StagingLayout};
use anyhow::{Context, Result, ensure};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::info;

pub const IDS_FILE: &str = "ids.gz";
pub const DATES_FILE: &str = "dates.gz";
pub const VALUES_FILE: &str = "values.gz";

/// Three index-aligned columns for one partition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnTriple {
    pub ids: Vec<String>,
    pub dates: Vec<String>,
    pub values: Vec<f64>,
}

impl ColumnTriple {
    /// Project already-sorted observations into columns.
    #[must_use]
    pub fn from_sorted(obs: &[Observation]) -> Self {
        let mut out = Self {
            ids: Vec::with_capacity(obs.len()),
            dates: Vec::with_capacity(obs.len()),
            values: Vec::with_capacity(obs.len()),
        };
        for o in obs {
            out.ids.push(o.station.clone());
            out.dates.push(o.iso_date());
            out.values.push(o.value);
        }
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `true` when all three columns have the same length.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.ids.len() == self.dates.len() && self.dates.len() == self.values.len()
    }

    /// # Errors
    /// Returns an error if any column file fails to write.
    pub fn write_to(&self, dir: &Path, level: u32) -> Result<()> {
        write_strings(&dir.join(IDS_FILE), &self.ids, level)?;
        write_strings(&dir.join(DATES_FILE), &self.dates, level)?;
        write_f64s(&dir.join(VALUES_FILE), &self.values, level)?;
        Ok(())
    }

    /// Read a partition's columns back.
    ///
    /// # Errors
    /// Returns an error if a file is missing or unreadable, or the columns
    /// differ in length.
    pub fn read_from(dir: &Path) -> Result<Self> {
        let triple = Self {
            ids: read_strings(&dir.join(IDS_FILE))?,
            dates: read_strings(&dir.join(DATES_FILE))?,
            values: read_f64s(&dir.join(VALUES_FILE))?,
        };
        ensure!(
            triple.is_aligned(),
            "columns in {} are misaligned: {} ids, {} dates, {} values",
            dir.display(),
            triple.ids.len(),
            triple.dates.len(),
            triple.values.len()
        );
        Ok(triple)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionSummary {
    pub partition: i32,
    pub rows: usize,
}

/// Sort one partition's staging data and write its columns.
///
/// The staging file is deleted once the columns are written.
///
/// # Errors
/// A missing or corrupt staging file, or any write failure, is an error.
pub fn emit_partition(layout: &StagingLayout, partition: i32, level: u32) -> Result<PartitionSummary> {
    let staging_path = layout.staging_path(partition);
    let mut obs = staging::read_all(&staging_path)
        .with_context(|| format!("load staging data for {partition}"))?;
    sort_observations(&mut obs);

    let triple = ColumnTriple::from_sorted(&obs);
    drop(obs);
    let dir = layout.partition_dir(partition);
    triple
        .write_to(&dir, level)
        .with_context(|| format!("write columns for {partition}"))?;

    fs::remove_file(&staging_path)
        .with_context(|| format!("remove {}", staging_path.display()))?;
    info!(partition, rows = triple.len(), "partition written");
    Ok(PartitionSummary { partition, rows: triple.len() })
}

/// Emit every partition under the layout root on a pool of `workers` threads.
///
/// Waits for all partitions. Order between partitions is unspecified; the
/// returned summaries are sorted by partition.
///
/// # Errors
/// Returns the first partition error.
pub fn emit_all(layout: &StagingLayout, workers: usize, level: u32) -> Result<Vec<PartitionSummary>> {
    let partitions = layout.partitions()?;
    info!(partitions = partitions.len(), workers, "sorting and writing output");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("emit-{i}"))
        .build()
        .context("build emit pool")?;

    let mut summaries = pool.install(|| {
        partitions
            .par_iter()
            .map(|&p| emit_partition(layout, p, level))
            .collect::<Result<Vec<_>>>()
    })?;
    summaries.sort_unstable_by_key(|s| s.partition);
    Ok(summaries)
}
