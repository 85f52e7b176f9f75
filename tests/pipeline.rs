//! End-to-end tests for the columnizing run.

use ghcn_columnar::logging::init_test_logging;
use ghcn_columnar::staging::STAGING_FILE_NAME;
use ghcn_columnar::testing::*;
use ghcn_columnar::{Config, ElementType, FailurePolicy, run};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

fn sample_workspace() -> anyhow::Result<TempWorkspace> {
    let ws = TempWorkspace::new()?;
    for (station, lines) in sample_stations() {
        ws.add_station(&station, &lines)?;
    }
    Ok(ws)
}

/// Every file under `root`, keyed by relative path.
fn snapshot(root: &Path) -> anyhow::Result<BTreeMap<PathBuf, Vec<u8>>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.insert(path.strip_prefix(root)?.to_path_buf(), fs::read(&path)?);
            }
        }
    }
    Ok(out)
}

#[test]
fn test_sample_run() -> anyhow::Result<()> {
    init_test_logging();
    let ws = sample_workspace()?;
    let report = run(&ws.config())?;

    assert_eq!(report.total_rows(), 30);
    let per_year: Vec<(i32, usize)> = report.partitions.iter().map(|p| (p.partition, p.rows)).collect();
    assert_eq!(per_year, vec![(1999, 6), (2000, 21), (2001, 3)]);

    let output = read_output(ws.output())?;
    assert_eq!(output.keys().copied().collect::<Vec<_>>(), vec![1999, 2000, 2001]);
    for (year, triple) in &output {
        assert_partition_invariants(*year, triple);
        assert!(!ws.output().join(year.to_string()).join(STAGING_FILE_NAME).exists());
    }

    let rows_1999: Vec<(&str, &str, f64)> = output[&1999]
        .ids
        .iter()
        .zip(&output[&1999].dates)
        .zip(&output[&1999].values)
        .map(|((i, d), v)| (i.as_str(), d.as_str(), *v))
        .collect();
    assert_eq!(
        rows_1999,
        vec![
            ("ASN00000001", "1999-12-01", 2.0),
            ("ASN00000001", "1999-12-03", -1.5),
            ("GME00000002", "1999-12-01", 3.0),
            ("GME00000002", "1999-12-03", -0.5),
            ("USC00000003", "1999-12-01", 1.0),
            ("USC00000003", "1999-12-03", -2.5),
        ]
    );
    Ok(())
}

#[test]
fn test_stats_count_every_skip() -> anyhow::Result<()> {
    let ws = sample_workspace()?;
    let report = run(&ws.config())?;
    let stats = &report.stats;

    assert_eq!(stats.files_read, 3);
    assert_eq!(stats.files_skipped, 0);
    assert_eq!(stats.lines_read, 18);
    assert_eq!(stats.lines_matched, 12);
    assert_eq!(stats.observations, 30);
    assert_eq!((stats.skipped.missing, stats.skipped.flagged, stats.skipped.malformed), (3, 3, 3));
    assert_eq!(stats.partitions_emitted, 3);
    assert_eq!(report.buffers.total_routed(), 30);

    let path = ws.scratch("stats.json");
    stats.save_json(&path)?;
    let loaded: ghcn_columnar::StatsSnapshot = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(&loaded, stats);
    Ok(())
}

#[test]
fn test_output_is_independent_of_concurrency() -> anyhow::Result<()> {
    let ws = sample_workspace()?;

    let mut narrow = ws.config();
    narrow.max_open_files = 1;
    narrow.channel_capacity = Some(1);
    narrow.sort_workers = Some(1);
    narrow.flush_threshold_bytes = 1;
    run(&narrow)?;
    let expected = snapshot(ws.output())?;

    let mut wide = ws.config();
    wide.max_open_files = 50;
    wide.sort_workers = Some(8);
    run(&wide)?;
    assert_eq!(snapshot(ws.output())?, expected);

    // plain rerun with defaults
    run(&ws.config())?;
    assert_eq!(snapshot(ws.output())?, expected);
    Ok(())
}

#[test]
fn test_tmin_run() -> anyhow::Result<()> {
    let ws = sample_workspace()?;
    let mut config = ws.config();
    config.element = ElementType::Tmin;
    let report = run(&config)?;

    let output = read_output(ws.output())?;
    assert_eq!(output.len(), 1);
    let triple = &output[&1999];
    assert_eq!(triple.len(), 6);
    assert_eq!(triple.values, vec![-5.0, -6.0, -5.0, -6.0, -5.0, -6.0]);
    assert_eq!(report.stats.lines_matched, 3);
    Ok(())
}

#[test]
fn test_stale_output_is_removed() -> anyhow::Result<()> {
    let ws = sample_workspace()?;
    let stale = ws.output().join("1850");
    fs::create_dir_all(&stale)?;
    fs::write(stale.join("ids.gz"), b"old")?;

    run(&ws.config())?;
    assert!(!stale.exists());
    Ok(())
}

#[test]
fn test_empty_input_dir() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let report = run(&ws.config())?;
    assert_eq!(report.total_rows(), 0);
    assert!(report.partitions.is_empty());
    assert!(ws.output().is_dir());
    assert_eq!(fs::read_dir(ws.output())?.count(), 0);
    Ok(())
}

#[test]
fn test_input_pattern_filters_files() -> anyhow::Result<()> {
    let ws = sample_workspace()?;
    fs::write(ws.input().join("README.txt"), "not a station file\n")?;

    let mut config = ws.config();
    config.input_pattern = "*.dly.gz".to_string();
    assert_eq!(run(&config)?.total_rows(), 30);

    config.input_pattern = "*".to_string();
    assert!(run(&config).is_err());
    Ok(())
}

fn add_bad_station(ws: &TempWorkspace) -> anyhow::Result<()> {
    // TMAX line whose year field is not a number
    let bad = "ZZZ0000000919X912TMAX   10   ".to_string();
    ws.add_station("ZZZ00000009", &[bad])?;
    Ok(())
}

#[test]
fn test_malformed_header_aborts() -> anyhow::Result<()> {
    let ws = sample_workspace()?;
    add_bad_station(&ws)?;

    let err = run(&ws.config()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("ZZZ00000009.dly.gz"), "{msg}");
    assert!(msg.contains("year"), "{msg}");
    Ok(())
}

#[test]
fn test_malformed_header_skipped() -> anyhow::Result<()> {
    let ws = sample_workspace()?;
    add_bad_station(&ws)?;

    let mut config = ws.config();
    config.failure_policy = FailurePolicy::SkipFile;
    let report = run(&config)?;
    assert_eq!(report.total_rows(), 30);
    assert_eq!(report.stats.files_skipped, 1);
    assert_eq!(report.ingest.skipped_files.len(), 1);
    Ok(())
}

#[test]
fn test_missing_input_dir() {
    let ws = TempWorkspace::new().unwrap();
    let config = Config::new(ws.scratch("absent"), ws.output());
    assert!(run(&config).is_err());
}

#[test]
fn test_invalid_config_is_rejected_before_io() {
    let ws = TempWorkspace::new().unwrap();
    let mut config = ws.config();
    config.max_open_files = 0;
    assert!(run(&config).is_err());
    assert!(!ws.output().exists());
}

#[test]
fn test_non_utf8_value_is_malformed() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let mut line = LineBuilder::new("USC00000001", 2016, 6, "TMAX").value(67).build().into_bytes();
    line.extend_from_slice(b"  \xff12   ");
    line.extend_from_slice(b"   71   \n");
    fs::write(ws.input().join("USC00000001.dly"), &line)?;

    let report = run(&ws.config())?;
    assert_eq!(report.total_rows(), 2);
    assert_eq!(report.stats.skipped.malformed, 1);
    let triple = &read_output(ws.output())?[&2016];
    assert_eq!(triple.dates, vec!["2016-06-01", "2016-06-03"]);
    assert_eq!(triple.values, vec![6.7, 7.1]);
    Ok(())
}

#[test]
fn test_output_enclosing_input_is_rejected() -> anyhow::Result<()> {
    let ws = sample_workspace()?;
    let parent = ws.input().parent().expect("workspace root").to_path_buf();
    fs::create_dir_all(ws.input().join("sub"))?;

    let mut config = ws.config();
    for output in [parent, ws.input().join("sub").join(".."), ws.input().join(".")] {
        config.output_dir = output;
        assert!(config.validate().is_err(), "{}", config.output_dir.display());
        assert!(run(&config).is_err());
    }
    assert_eq!(fs::read_dir(ws.input())?.count(), 4);

    // a sibling or nested output directory is fine
    config.output_dir = ws.input().join("sub").join("out");
    assert!(config.validate().is_ok());
    Ok(())
}
