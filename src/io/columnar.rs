//! Gzip'd column files: newline-delimited strings and raw `f64` vectors.
//!
//! `f64` columns are written little-endian, 8 bytes per value, with no header;
//! the length is implied by the decompressed size.

use crate::io::compression::{create_gzip, open_lines};
use anyhow::{Context, Result, bail};
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// Write one string per line to a gzip file.
///
/// # Errors
/// Returns an error if the file cannot be created or written, or if a value
/// contains a newline.
pub fn write_strings(path: &Path, values: &[String], level: u32) -> Result<()> {
    let mut w = create_gzip(path, level)?;
    for (i, v) in values.iter().enumerate() {
        if v.contains('\n') {
            bail!("value #{i} for {} contains a newline", path.display());
        }
        w.write_all(v.as_bytes())?;
        w.write_all(b"\n")?;
    }
    w.finish()
        .and_then(|mut inner| inner.flush())
        .with_context(|| format!("finish {}", path.display()))?;
    Ok(())
}

/// Write raw little-endian `f64` values to a gzip file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_f64s(path: &Path, values: &[f64], level: u32) -> Result<()> {
    let mut w = create_gzip(path, level)?;
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    w.finish()
        .and_then(|mut inner| inner.flush())
        .with_context(|| format!("finish {}", path.display()))?;
    Ok(())
}

/// Read a newline-delimited string column.
///
/// # Errors
/// Returns an error if the file cannot be opened or decoded.
pub fn read_strings(path: &Path) -> Result<Vec<String>> {
    let reader = open_lines(path)?;
    reader
        .lines()
        .enumerate()
        .map(|(i, l)| l.with_context(|| format!("read line {} in {}", i + 1, path.display())))
        .collect()
}

/// Read a raw little-endian `f64` column.
///
/// # Errors
/// Returns an error if the file cannot be read or its length is not a
/// multiple of 8.
pub fn read_f64s(path: &Path) -> Result<Vec<f64>> {
    let mut bytes = Vec::new();
    open_lines(path)?
        .read_to_end(&mut bytes)
        .with_context(|| format!("read {}", path.display()))?;
    if bytes.len() % 8 != 0 {
        bail!("{} holds {} bytes, not a whole number of f64 values", path.display(), bytes.len());
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect())
}
