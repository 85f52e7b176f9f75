//! Run statistics.
//!
//! [`RunStats`] is a set of atomic counters shared by every ingest worker and
//! the aggregation consumer. Take a [`StatsSnapshot`] at the end of a run to
//! report it or save it as JSON.

use crate::parser::SkipCounts;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct RunStats {
    started: Instant,
    files_read: AtomicU64,
    files_skipped: AtomicU64,
    lines_read: AtomicU64,
    lines_matched: AtomicU64,
    observations: AtomicU64,
    missing: AtomicU64,
    flagged: AtomicU64,
    malformed: AtomicU64,
    flushes: AtomicU64,
    partitions_emitted: AtomicU64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            files_read: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            lines_read: AtomicU64::new(0),
            lines_matched: AtomicU64::new(0),
            observations: AtomicU64::new(0),
            missing: AtomicU64::new(0),
            flagged: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            partitions_emitted: AtomicU64::new(0),
        }
    }

    pub fn add_files(&self, read: u64, skipped: u64) {
        self.files_read.fetch_add(read, Ordering::Relaxed);
        self.files_skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn add_lines(&self, read: u64, matched: u64) {
        self.lines_read.fetch_add(read, Ordering::Relaxed);
        self.lines_matched.fetch_add(matched, Ordering::Relaxed);
    }

    pub fn add_observations(&self, n: u64) {
        self.observations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_skips(&self, skips: SkipCounts) {
        self.missing.fetch_add(skips.missing, Ordering::Relaxed);
        self.flagged.fetch_add(skips.flagged, Ordering::Relaxed);
        self.malformed.fetch_add(skips.malformed, Ordering::Relaxed);
    }

    pub fn add_flushes(&self, n: u64) {
        self.flushes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_partitions_emitted(&self, n: u64) {
        self.partitions_emitted.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            files_read: get(&self.files_read),
            files_skipped: get(&self.files_skipped),
            lines_read: get(&self.lines_read),
            lines_matched: get(&self.lines_matched),
            observations: get(&self.observations),
            skipped: SkipCounts {
                missing: get(&self.missing),
                flagged: get(&self.flagged),
                malformed: get(&self.malformed),
            },
            flushes: get(&self.flushes),
            partitions_emitted: get(&self.partitions_emitted),
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Point-in-time copy of [`RunStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub files_read: u64,
    pub files_skipped: u64,
    pub lines_read: u64,
    pub lines_matched: u64,
    pub observations: u64,
    pub skipped: SkipCounts,
    pub flushes: u64,
    pub partitions_emitted: u64,
    pub elapsed_ms: u64,
}

impl StatsSnapshot {
    /// Save as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let formatted = serde_json::to_string_pretty(self)?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
