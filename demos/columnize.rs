//! Pivot a directory of GHCN-Daily station files into per-year columns.
//!
//! Run with: `cargo run --release --example columnize -- config.json`
//!
//! The only argument is a JSON config file (see `ghcn_columnar::Config`).
//! Without it, a small synthetic dataset is generated in a temporary
//! directory and processed instead.

use anyhow::{Context, Result};
use ghcn_columnar::logging::{LogFormat, init_logging};
use ghcn_columnar::testing::{TempWorkspace, read_output, sample_stations};
use ghcn_columnar::{Config, run};

fn main() -> Result<()> {
    init_logging(LogFormat::Pretty);

    match std::env::args_os().nth(1) {
        Some(path) => {
            let config = Config::from_json_file(&path)
                .with_context(|| format!("load config {}", path.to_string_lossy()))?;
            let report = run(&config)?;
            println!("{}", serde_json::to_string_pretty(&report.stats)?);
        }
        None => {
            let ws = TempWorkspace::new()?;
            for (station, lines) in sample_stations() {
                ws.add_station(&station, &lines)?;
            }
            let mut config = ws.config();
            config.flush_threshold_bytes = 64;
            let report = run(&config)?;
            println!("{}", serde_json::to_string_pretty(&report.stats)?);

            for (year, triple) in read_output(ws.output())? {
                println!("== {year} ==");
                for ((id, date), value) in triple.ids.iter().zip(&triple.dates).zip(&triple.values) {
                    println!("{id} {date} {value:>6.1}");
                }
            }
        }
    }
    Ok(())
}
