//! Input file discovery.

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::{Path, PathBuf};

/// Expand a glob pattern into a sorted vector of matching files.
///
/// Directories are skipped. Zero matches is not an error.
///
/// # Errors
/// Returns an error if the pattern is invalid or an entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }

    result.sort();
    Ok(result)
}

/// Station files under `dir` matching `pattern` (e.g. `*.dly.gz`), sorted.
///
/// # Errors
/// Returns an error if `dir` is not a directory or the pattern is invalid.
pub fn discover_inputs(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("input directory {} does not exist", dir.display());
    }
    let full = dir.join(pattern);
    let full = full
        .to_str()
        .with_context(|| format!("non UTF-8 input path {}", full.display()))?;
    expand_glob(full)
}
