//! Tests for run configuration.

use ghcn_columnar::{Config, ElementType, FailurePolicy, IngestOptions};
use std::fs;

#[test]
fn test_defaults() {
    let c = Config::default();
    assert_eq!(c.element, ElementType::Tmax);
    assert_eq!(c.max_open_files, 50);
    assert_eq!(c.flush_threshold_bytes, 10_000_000);
    assert_eq!(c.failure_policy, FailurePolicy::Abort);
    assert_eq!(c.channel_capacity(), 200);
    assert!(c.sort_workers() >= 1);
    assert!(c.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("run.json");
    fs::write(
        &path,
        r#"{
            "input_dir": "/data/gsn",
            "output_dir": "/data/by_year",
            "element": "TMIN",
            "max_open_files": 8,
            "sort_workers": 3,
            "failure_policy": "skip_file"
        }"#,
    )?;
    let c = Config::from_json_file(&path)?;
    assert_eq!(c.element, ElementType::Tmin);
    assert_eq!(c.max_open_files, 8);
    assert_eq!(c.sort_workers(), 3);
    assert_eq!(c.failure_policy, FailurePolicy::SkipFile);
    assert_eq!(c.input_pattern, "*");
    assert_eq!(c.compression_level, 6);

    let o = IngestOptions::from(&c);
    assert_eq!((o.max_open_files, o.channel_capacity), (8, 32));
    Ok(())
}

#[test]
fn test_unknown_keys_are_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("run.json");
    fs::write(&path, r#"{ "max_open_file": 8 }"#)?;
    assert!(Config::from_json_file(&path).is_err());

    fs::write(&path, r#"{ "element": "PRCP" }"#)?;
    assert!(Config::from_json_file(&path).is_err());
    Ok(())
}

#[test]
fn test_validation() {
    let bad: [fn(&mut Config); 7] = [
        |c| c.max_open_files = 0,
        |c| c.flush_threshold_bytes = 0,
        |c| c.sort_workers = Some(0),
        |c| c.channel_capacity = Some(0),
        |c| c.compression_level = 10,
        |c| c.input_pattern.clear(),
        |c| c.output_dir = c.input_dir.clone(),
    ];
    for (i, tweak) in bad.iter().enumerate() {
        let mut c = Config::new("in", "out");
        tweak(&mut c);
        assert!(c.validate().is_err(), "case {i} should be invalid");
    }
}

#[test]
fn test_round_trips_through_json() -> anyhow::Result<()> {
    let mut c = Config::new("a", "b");
    c.channel_capacity = Some(7);
    let text = serde_json::to_string(&c)?;
    let back: Config = serde_json::from_str(&text)?;
    assert_eq!(back, c);
    assert_eq!(back.channel_capacity(), 7);
    Ok(())
}
