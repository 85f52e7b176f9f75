//! Write station-month mean temperatures as a gzip'd CSV.
//!
//! Run with: `cargo run --example monthly -- config.json`
//!
//! Reads the same JSON config as the `columnize` demo and writes
//! `<output_dir>/monthly_<ELEMENT>.csv.gz`.

use anyhow::{Context, Result, bail};
use ghcn_columnar::logging::{LogFormat, init_logging};
use ghcn_columnar::{Config, run_monthly};

fn main() -> Result<()> {
    init_logging(LogFormat::Pretty);

    let Some(path) = std::env::args_os().nth(1) else {
        bail!("usage: monthly <config.json>");
    };
    let config = Config::from_json_file(&path)
        .with_context(|| format!("load config {}", path.to_string_lossy()))?;
    let out = config
        .output_dir
        .join(format!("monthly_{}.csv.gz", config.element));

    let report = run_monthly(&config, &out)?;
    println!(
        "{} rows from {} files -> {}",
        report.rows,
        report.ingest.files_read,
        out.display()
    );
    Ok(())
}
