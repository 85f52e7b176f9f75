//! Tests for partition buffers and staging files.

use ghcn_columnar::staging::{self, STAGING_FILE_NAME, decode_all, encode_into};
use ghcn_columnar::{BufferManager, Observation, StagingError, StagingLayout};
use std::collections::BTreeMap;
use tempfile::tempdir;

fn observations(n: usize) -> Vec<Observation> {
    (0..n)
        .map(|i| Observation {
            station: format!("ST{:09}", i % 7),
            year: 1990 + (i % 5) as i32,
            month: (i % 12) as u8 + 1,
            day: (i % 28) as u8 + 1,
            value: (i as f64) * 0.1 - 20.0,
        })
        .collect()
}

fn route_and_reload(obs: &[Observation], threshold: usize) -> anyhow::Result<(BTreeMap<i32, Vec<Observation>>, u64)> {
    let dir = tempdir()?;
    let layout = StagingLayout::new(dir.path());
    let mut manager = BufferManager::new(layout.clone(), threshold);
    manager.route_all(obs.iter().cloned())?;
    let report = manager.finish()?;

    let mut staged = BTreeMap::new();
    for p in layout.partitions()? {
        staged.insert(p, staging::read_all(&layout.staging_path(p))?);
    }
    assert_eq!(report.total_routed(), obs.len() as u64);
    Ok((staged, report.flushes))
}

#[test]
fn staged_data_is_independent_of_threshold() -> anyhow::Result<()> {
    let obs = observations(500);

    let mut expected: BTreeMap<i32, Vec<Observation>> = BTreeMap::new();
    for o in &obs {
        expected.entry(o.year).or_default().push(o.clone());
    }

    let mut flush_counts = Vec::new();
    for threshold in [1, 64, 1_000, 10_000_000] {
        let (staged, flushes) = route_and_reload(&obs, threshold)?;
        assert_eq!(staged, expected, "threshold {threshold}");
        flush_counts.push(flushes);
    }
    // threshold 1 flushes on every append; the largest only at finish
    assert_eq!(flush_counts[0], 500);
    assert_eq!(flush_counts[3], 5);
    assert!(flush_counts[1] > flush_counts[2]);
    Ok(())
}

#[test]
fn partitions_are_created_lazily() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let layout = StagingLayout::new(dir.path());
    let mut manager = BufferManager::new(layout.clone(), 1_000_000);
    assert!(manager.store().is_empty());

    let o = observations(1).remove(0);
    manager.route(o.clone())?;
    assert_eq!(manager.store().len(), 1);
    let buffer = manager.store().get(o.year).expect("buffer");
    assert_eq!(buffer.pending().len(), 1);
    assert!(buffer.byte_size() > 0);

    // staging file exists and is empty until a flush
    let path = layout.staging_path(o.year);
    assert!(path.ends_with(STAGING_FILE_NAME));
    assert_eq!(std::fs::metadata(&path)?.len(), 0);

    manager.flush(o.year)?;
    assert!(manager.store().get(o.year).expect("buffer").pending().is_empty());
    assert!(std::fs::metadata(&path)?.len() > 0);
    Ok(())
}

#[test]
fn new_partition_truncates_stale_staging() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let layout = StagingLayout::new(dir.path());
    layout.create(2000)?;
    staging::append(&layout.staging_path(2000), b"stale bytes")?;

    let mut manager = BufferManager::new(layout.clone(), 1);
    let mut o = observations(1).remove(0);
    o.year = 2000;
    manager.route(o.clone())?;
    manager.finish()?;

    assert_eq!(staging::read_all(&layout.staging_path(2000))?, vec![o]);
    Ok(())
}

#[test]
fn finish_flushes_the_tail() -> anyhow::Result<()> {
    let obs = observations(3);
    let dir = tempdir()?;
    let layout = StagingLayout::new(dir.path());
    let mut manager = BufferManager::new(layout.clone(), usize::MAX);
    manager.route_all(obs.iter().cloned())?;
    for p in layout.partitions()? {
        assert_eq!(std::fs::metadata(layout.staging_path(p))?.len(), 0);
    }
    let report = manager.finish()?;
    assert_eq!(report.flushes, 3);
    assert_eq!(report.routed.len(), 3);
    Ok(())
}

#[test]
fn concatenated_frames_decode_in_order() -> anyhow::Result<()> {
    let obs = observations(40);
    let mut buf = Vec::new();
    encode_into(&obs[..10], &mut buf)?;
    encode_into(&obs[10..], &mut buf)?;
    assert_eq!(decode_all(&buf)?, obs);
    assert!(decode_all(&[])?.is_empty());
    Ok(())
}

#[test]
fn truncated_staging_is_corrupt() -> anyhow::Result<()> {
    let obs = observations(4);
    let mut buf = Vec::new();
    encode_into(&obs, &mut buf)?;
    buf.truncate(buf.len() - 3);
    match decode_all(&buf) {
        Err(StagingError::Corrupt { decoded, .. }) => assert_eq!(decoded, 3),
        other => panic!("expected corrupt staging, got {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_staging_file_is_an_error() {
    let dir = tempdir().unwrap();
    let layout = StagingLayout::new(dir.path());
    let err = staging::read_all(&layout.staging_path(1900)).unwrap_err();
    assert!(err.downcast_ref::<StagingError>().is_some());
}

#[test]
fn partitions_lists_numeric_directories_only() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let layout = StagingLayout::new(dir.path());
    for p in [2001, 1999, -5] {
        layout.create(p)?;
    }
    std::fs::create_dir_all(dir.path().join("logs"))?;
    std::fs::write(dir.path().join("1850"), b"a file, not a partition")?;
    assert_eq!(layout.partitions()?, vec![-5, 1999, 2001]);

    let missing = StagingLayout::new(dir.path().join("absent"));
    let err = missing.partitions().unwrap_err();
    assert!(format!("{err:#}").contains("absent"));
    Ok(())
}
