//! Per-partition staging files.
//!
//! A staging file is a plain concatenation of postcard-encoded
//! [`Observation`]s. Postcard frames are self-delimiting, so bytes appended by
//! any number of flushes decode back to the same sequence regardless of where
//! the flush boundaries fell.

use crate::error::StagingError;
use crate::observation::Observation;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const STAGING_FILE_NAME: &str = "raw.bin";

/// Where staging and output files live for each partition.
#[derive(Clone, Debug)]
pub struct StagingLayout {
    root: PathBuf,
}

impl StagingLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn partition_dir(&self, partition: i32) -> PathBuf {
        self.root.join(partition.to_string())
    }

    #[must_use]
    pub fn staging_path(&self, partition: i32) -> PathBuf {
        self.partition_dir(partition).join(STAGING_FILE_NAME)
    }

    /// Create the partition directory and an empty staging file, truncating
    /// any previous one.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be created.
    pub fn create(&self, partition: i32) -> Result<PathBuf> {
        let dir = self.partition_dir(partition);
        create_dir_all(&dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
        let path = self.staging_path(partition);
        File::create(&path).with_context(|| format!("truncate {}", path.display()))?;
        Ok(path)
    }

    /// Partitions with a directory under the root, ascending.
    ///
    /// Entries whose names are not integers are ignored.
    ///
    /// # Errors
    /// Returns an error if the root cannot be listed.
    pub fn partitions(&self) -> Result<Vec<i32>> {
        let mut out = Vec::new();
        let entries =
            fs::read_dir(&self.root).with_context(|| format!("list {}", self.root.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("list {}", self.root.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat {}", entry.path().display()))?;
            if !file_type.is_dir() {
                continue;
            }
            if let Some(p) = entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) {
                out.push(p);
            }
        }
        out.sort_unstable();
        Ok(out)
    }
}

/// Append the encoding of `obs` to `buf`.
///
/// # Errors
/// Returns an error if an observation fails to serialize.
pub fn encode_into(obs: &[Observation], buf: &mut Vec<u8>) -> Result<()> {
    for o in obs {
        let frame = postcard::to_allocvec(o).context("encode observation")?;
        buf.extend_from_slice(&frame);
    }
    Ok(())
}

/// Decode a complete staging buffer.
///
/// # Errors
/// Returns [`StagingError::Corrupt`] if the bytes do not decode exactly into
/// whole observations.
pub fn decode_all(mut bytes: &[u8]) -> Result<Vec<Observation>, StagingError> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let (o, rest) = postcard::take_from_bytes::<Observation>(bytes)
            .map_err(|source| StagingError::Corrupt { decoded: out.len(), source })?;
        out.push(o);
        bytes = rest;
    }
    Ok(out)
}

/// Append already-encoded bytes to an existing staging file.
///
/// # Errors
/// Returns an error if the file is missing or the write fails.
pub fn append(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("open {} for append", path.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("append {} bytes to {}", bytes.len(), path.display()))?;
    Ok(())
}

/// Read and decode a whole staging file.
///
/// # Errors
/// Fails if the file is missing, unreadable, or corrupt.
pub fn read_all(path: &Path) -> Result<Vec<Observation>> {
    if !path.is_file() {
        return Err(StagingError::Missing(path.display().to_string()).into());
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    decode_all(&bytes).with_context(|| format!("decode {}", path.display()))
}
