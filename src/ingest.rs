//! Concurrent file ingest.
//!
//! Files are read on a dedicated rayon pool whose size is the open-file bound:
//! a worker holds one file open until it has sent every line's result, so at
//! most `max_open_files` files are open at once. Every worker sends into one
//! bounded crossbeam channel and the calling thread is the only consumer, so
//! whatever `consume` mutates needs no locking.
//!
//! The call returns only after every file task has finished and the channel
//! has drained. If `consume` fails, the receiver is dropped and producers stop
//! at their next send.

use crate::config::{Config, FailurePolicy};
use crate::io::compression::open_lines;
use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Sender, bounded};
use rayon::prelude::*;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngestOptions {
    pub max_open_files: usize,
    pub channel_capacity: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions::from(&Config::default())
    }
}

impl From<&Config> for IngestOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            max_open_files: cfg.max_open_files.max(1),
            channel_capacity: cfg.channel_capacity(),
            failure_policy: cfg.failure_policy,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_read: u64,
    pub files_skipped: u64,
    pub lines_read: u64,
    /// Lines for which `per_line` produced a message.
    pub lines_matched: u64,
    /// Messages received by the consumer.
    pub messages: u64,
    pub skipped_files: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default)]
struct FileTally {
    lines_read: u64,
    lines_matched: u64,
}

/// Raised in a producer when the consumer has hung up.
#[derive(Debug, Error)]
#[error("aggregation consumer stopped")]
struct ConsumerGone;

/// Read every file, map each line through `per_line`, and feed the results to
/// `consume` on the calling thread.
///
/// Lines are handed to `per_line` as raw bytes, so a stray non-UTF-8 byte
/// only affects the field it sits in. Blank lines are ignored and a trailing
/// `\r` is stripped first. `per_line` returns `Ok(None)` for lines it filters
/// out.
///
/// # Errors
/// With [`FailurePolicy::Abort`], the first file that fails to open, read, or
/// parse aborts the run. With [`FailurePolicy::SkipFile`] such files are
/// logged and listed in [`IngestReport::skipped_files`]. An error from
/// `consume` always aborts.
pub fn ingest_files<T, P, C>(
    files: &[PathBuf],
    opts: &IngestOptions,
    per_line: P,
    mut consume: C,
) -> Result<IngestReport>
where
    T: Send,
    P: Fn(&[u8]) -> Result<Option<T>> + Sync,
    C: FnMut(T) -> Result<()>,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.max_open_files.max(1))
        .thread_name(|i| format!("ingest-{i}"))
        .build()
        .context("build ingest pool")?;
    let (tx, rx) = bounded::<T>(opts.channel_capacity.max(1));
    let policy = opts.failure_policy;
    let pool = &pool;
    let per_line = &per_line;

    std::thread::scope(|s| {
        let producer = s.spawn(move || produce(pool, files, policy, per_line, tx));

        let mut messages = 0u64;
        let mut consumer_err = None;
        for item in &rx {
            messages += 1;
            if let Err(e) = consume(item) {
                consumer_err = Some(e);
                break;
            }
        }
        drop(rx);

        let produced = producer
            .join()
            .map_err(|_| anyhow!("ingest producer panicked"))?;
        if let Some(e) = consumer_err {
            return Err(e);
        }
        let mut report = produced?;
        report.messages = messages;
        Ok(report)
    })
}

fn produce<T, P>(
    pool: &rayon::ThreadPool,
    files: &[PathBuf],
    policy: FailurePolicy,
    per_line: &P,
    tx: Sender<T>,
) -> Result<IngestReport>
where
    T: Send,
    P: Fn(&[u8]) -> Result<Option<T>> + Sync,
{
    let outcomes: Vec<(PathBuf, Option<FileTally>)> = pool.install(|| {
        files
            .par_iter()
            .map(|path| match read_file(path, per_line, &tx) {
                Ok(tally) => Ok((path.clone(), Some(tally))),
                Err(e) if policy == FailurePolicy::SkipFile && e.downcast_ref::<ConsumerGone>().is_none() => {
                    warn!(file = %path.display(), error = %format!("{e:#}"), "skipping file");
                    Ok((path.clone(), None))
                }
                Err(e) => Err(e),
            })
            .collect::<Result<Vec<_>>>()
    })?;
    drop(tx);

    let mut report = IngestReport::default();
    for (path, tally) in outcomes {
        match tally {
            Some(t) => {
                report.files_read += 1;
                report.lines_read += t.lines_read;
                report.lines_matched += t.lines_matched;
            }
            None => {
                report.files_skipped += 1;
                report.skipped_files.push(path);
            }
        }
    }
    Ok(report)
}

fn read_file<T, P>(path: &Path, per_line: &P, tx: &Sender<T>) -> Result<FileTally>
where
    P: Fn(&[u8]) -> Result<Option<T>>,
{
    info!(file = %path.display(), "reading");
    let reader = open_lines(path)?;
    let mut tally = FileTally::default();
    for (idx, line) in reader.split(b'\n').enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", idx + 1, path.display()))?;
        let line = line.strip_suffix(b"\r").unwrap_or(&line);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        tally.lines_read += 1;
        let item = per_line(line)
            .with_context(|| format!("parse line {} in {}", idx + 1, path.display()))?;
        if let Some(item) = item {
            tally.lines_matched += 1;
            tx.send(item).map_err(|_| ConsumerGone)?;
        }
    }
    Ok(tally)
}
