//! Station-month summaries.
//!
//! Instead of pivoting daily values, reduce each matching line to the mean of
//! its valid days and write one gzip'd CSV row per station-month:
//!
//! ```text
//! Id,Year,Month,Nvalid,Mean
//! USC00123456,2016,6,30,27.413
//! ```
//!
//! A value is valid when its quality flag is blank and it is not the missing
//! sentinel. A month with no valid days has a `NaN` mean.

use crate::config::Config;
use crate::ingest::{IngestOptions, IngestReport, ingest_files};
use crate::io::compression::create_gzip;
use crate::io::glob::discover_inputs;
use crate::parser::{DayValue, ElementType, HEADER_LEN, day_fields, line_matches, parse_header};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::create_dir_all;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const CSV_HEADER: [&str; 5] = ["Id", "Year", "Month", "Nvalid", "Mean"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    pub station: String,
    pub year: i32,
    pub month: u8,
    pub nvalid: u32,
    /// Mean in degrees; `NaN` when `nvalid == 0`.
    pub mean: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyReport {
    pub ingest: IngestReport,
    pub rows: usize,
}

/// Summarize one line, or `None` if it carries a different element.
///
/// Valid readings are summed in tenths and the mean is scaled to degrees
/// last, so rounding matches a mean taken over the raw file values.
///
/// # Errors
/// Fails when the line header is unusable.
pub fn summarize_line<L: AsRef<[u8]> + ?Sized>(
    line: &L,
    element: ElementType,
) -> Result<Option<MonthlyRecord>> {
    if line.as_ref().len() >= HEADER_LEN && !line_matches(line, element) {
        return Ok(None);
    }
    let header = parse_header(line)?;
    let (sum, nvalid) = day_fields(line).fold((0_i64, 0_u32), |(sum, n), (_, v)| match v {
        DayValue::Valid(tenths) => (sum + i64::from(tenths), n + 1),
        _ => (sum, n),
    });
    Ok(Some(MonthlyRecord {
        station: header.station.to_string(),
        year: header.year,
        month: header.month,
        nvalid,
        mean: mean_degrees(sum, nvalid),
    }))
}

/// Mean of `nvalid` readings summing to `sum_tenths`, in degrees.
#[must_use]
pub fn mean_degrees(sum_tenths: i64, nvalid: u32) -> f64 {
    if nvalid == 0 {
        return f64::NAN;
    }
    // sums of i32 tenths over at most 31 days are exact in f64
    #[allow(clippy::cast_precision_loss)]
    let sum = sum_tenths as f64;
    sum / f64::from(nvalid) / 10.0
}

/// Sort by `(station, year, month)`.
pub fn sort_records(records: &mut [MonthlyRecord]) {
    records.sort_by(|a, b| {
        a.station
            .cmp(&b.station)
            .then(a.year.cmp(&b.year))
            .then(a.month.cmp(&b.month))
    });
}

/// Write records as gzip'd CSV with a header row; the mean uses three decimals.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_csv_gz(path: &Path, records: &[MonthlyRecord], level: u32) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let gz = create_gzip(path, level)?;
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(gz);
    w.write_record(CSV_HEADER)?;
    for (i, r) in records.iter().enumerate() {
        w.write_record([
            r.station.clone(),
            r.year.to_string(),
            r.month.to_string(),
            r.nvalid.to_string(),
            format!("{:.3}", r.mean),
        ])
        .with_context(|| format!("write row #{} to {}", i + 1, path.display()))?;
    }
    let gz = w
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flush csv writer for {}: {}", path.display(), e.error()))?;
    gz.finish()
        .and_then(|mut inner| inner.flush())
        .with_context(|| format!("finish {}", path.display()))?;
    Ok(())
}

/// Summarize every input file of `config` into `out_file`.
///
/// Uses the same bounded ingest as the columnizing run; `output_dir` is not
/// touched.
///
/// # Errors
/// Returns the first fatal ingest or write error.
pub fn run_monthly(config: &Config, out_file: &Path) -> Result<MonthlyReport> {
    config.validate()?;
    let files = discover_inputs(&config.input_dir, &config.input_pattern)?;
    info!(files = files.len(), element = %config.element, "summarizing months");

    let element = config.element;
    let mut records = Vec::new();
    let ingest = ingest_files(
        &files,
        &IngestOptions::from(config),
        |line| summarize_line(line, element),
        |rec: MonthlyRecord| {
            records.push(rec);
            Ok(())
        },
    )?;

    sort_records(&mut records);
    write_csv_gz(out_file, &records, config.compression_level)?;
    info!(rows = records.len(), out = %out_file.display(), "monthly summary written");
    Ok(MonthlyReport { ingest, rows: records.len() })
}
