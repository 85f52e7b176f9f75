//! Static run configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it changes:
//!
//! ```json
//! { "input_dir": "/data/ghcnd_gsn", "output_dir": "/data/by_year", "element": "TMIN" }
//! ```

use crate::parser::ElementType;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// What to do when a single input file fails to read or parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run on the first failing file.
    #[default]
    Abort,
    /// Log the failure, count the file as skipped, and keep going.
    SkipFile,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the per-station input files.
    pub input_dir: PathBuf,
    /// Glob applied inside `input_dir`.
    pub input_pattern: String,
    /// Root of the per-year output directories. Reset at the start of a run.
    pub output_dir: PathBuf,
    pub element: ElementType,
    /// Upper bound on input files open at once.
    pub max_open_files: usize,
    /// Per-partition buffer size that triggers a flush to staging.
    pub flush_threshold_bytes: usize,
    /// Sort-and-emit pool size; `None` uses the available parallelism.
    pub sort_workers: Option<usize>,
    pub failure_policy: FailurePolicy,
    /// Gzip level (0-9) for output columns.
    pub compression_level: u32,
    /// Delivery queue bound; `None` means `4 * max_open_files`.
    pub channel_capacity: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            input_pattern: "*".to_string(),
            output_dir: PathBuf::from("out"),
            element: ElementType::Tmax,
            max_open_files: 50,
            flush_threshold_bytes: 10_000_000,
            sort_workers: None,
            failure_policy: FailurePolicy::Abort,
            compression_level: 6,
            channel_capacity: None,
        }
    }
}

impl Config {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self { input_dir: input_dir.into(), output_dir: output_dir.into(), ..Self::default() }
    }

    /// Load and validate a JSON config file.
    ///
    /// # Errors
    /// Returns an error if the file is unreadable, not valid JSON for
    /// [`Config`], or fails [`Config::validate`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Self =
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check bounds and that wiping `output_dir` cannot touch the inputs.
    ///
    /// # Errors
    /// Returns an error describing the first invalid setting, or if either
    /// directory cannot be resolved.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_open_files > 0, "max_open_files must be at least 1");
        ensure!(self.flush_threshold_bytes > 0, "flush_threshold_bytes must be at least 1");
        ensure!(self.sort_workers != Some(0), "sort_workers must be at least 1");
        ensure!(self.channel_capacity != Some(0), "channel_capacity must be at least 1");
        ensure!(self.compression_level <= 9, "compression_level must be 0-9");
        ensure!(!self.input_pattern.is_empty(), "input_pattern must not be empty");
        let input = resolve(&self.input_dir)?;
        let output = resolve(&self.output_dir)?;
        ensure!(
            !input.starts_with(&output),
            "output_dir {} is or contains input_dir {} (it is wiped at the start of a run)",
            self.output_dir.display(),
            self.input_dir.display()
        );
        Ok(())
    }

    #[must_use]
    pub fn sort_workers(&self) -> usize {
        self.sort_workers.unwrap_or_else(num_cpus::get).max(1)
    }

    #[must_use]
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(self.max_open_files * 4).max(1)
    }
}

/// Absolute form of `path` with `.` and `..` removed and symlinks resolved as
/// far as the path exists.
fn resolve(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path).with_context(|| format!("resolve {}", path.display()))?;
    let mut lexical = PathBuf::new();
    for c in abs.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }
    let Some(existing) = lexical.ancestors().find(|a| a.exists()) else {
        return Ok(lexical.clone());
    };
    let mut real = existing
        .canonicalize()
        .with_context(|| format!("canonicalize {}", existing.display()))?;
    if let Ok(rest) = lexical.strip_prefix(existing) {
        real.push(rest);
    }
    Ok(real)
}
