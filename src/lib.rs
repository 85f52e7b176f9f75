//! # ghcn-columnar
//!
//! Pivot GHCN-Daily station files (one line per station, month and element)
//! into long-format columns partitioned by year:
//!
//! ```text
//! out/
//!   1909/
//!     ids.gz      station ids, newline-delimited
//!     dates.gz    ISO dates, newline-delimited
//!     values.gz   little-endian f64 temperatures in degrees C
//! ```
//!
//! The three files of a year are index-aligned and sorted by station, then
//! date.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ghcn_columnar::{Config, ElementType, run};
//! # fn main() -> anyhow::Result<()> {
//! let mut config = Config::new("/data/ghcnd_gsn", "/data/by_year");
//! config.element = ElementType::Tmin;
//! config.max_open_files = 32;
//!
//! let report = run(&config)?;
//! println!("{} rows in {} years", report.total_rows(), report.partitions.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. [`ingest`] reads input files on a pool bounded by the open-file limit
//!    and sends parsed lines through one channel to a single consumer.
//! 2. [`parser`] turns each fixed-width line into [`Observation`]s, skipping
//!    missing, flagged, and malformed values.
//! 3. [`buffer`] routes observations into per-year buffers and spills them to
//!    [`staging`] files once they pass a size threshold.
//! 4. [`columns`] sorts each year's staging data and writes the output columns
//!    on a bounded worker pool.
//!
//! [`pipeline::run`] wires these together. [`monthly`] reuses the same ingest
//! to produce per station-month means instead.
//!
//! ## Module Overview
//!
//! - [`config`] - static run configuration, loadable from JSON
//! - [`error`] - typed line and staging errors
//! - [`io`] - codec detection, input discovery, column file formats
//! - [`logging`] - `tracing` subscriber setup
//! - [`stats`] - run counters and JSON snapshots
//! - [`testing`] - fixtures and assertions for tests

pub mod buffer;
pub mod columns;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io;
pub mod logging;
pub mod monthly;
pub mod observation;
pub mod parser;
pub mod pipeline;
pub mod staging;
pub mod stats;
pub mod testing;

pub use buffer::{BufferManager, BufferReport, PartitionBuffer, PartitionStore};
pub use columns::{ColumnTriple, PartitionSummary, emit_all, emit_partition};
pub use config::{Config, FailurePolicy};
pub use error::{LineError, StagingError};
pub use ingest::{IngestOptions, IngestReport, ingest_files};
pub use monthly::{MonthlyRecord, run_monthly};
pub use observation::Observation;
pub use parser::{ElementType, ParsedLine, SkipCounts, parse_line};
pub use pipeline::{RunReport, run};
pub use staging::StagingLayout;
pub use stats::{RunStats, StatsSnapshot};
