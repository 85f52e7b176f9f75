//! Fixed-width line builders and temporary station files.

use crate::config::Config;
use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds one GHCN-Daily line, one day field at a time.
#[derive(Clone, Debug)]
pub struct LineBuilder {
    line: String,
}

impl LineBuilder {
    /// Start a line. `station` is padded or cut to 11 bytes and `element`
    /// to 4.
    #[must_use]
    pub fn new(station: &str, year: i32, month: u8, element: &str) -> Self {
        let line = format!("{station:<11.11}{year:04}{month:02}{element:<4.4}");
        Self { line }
    }

    /// Append a day field with explicit flag bytes.
    #[must_use]
    pub fn field(mut self, value: i32, mflag: char, qflag: char, sflag: char) -> Self {
        self.line.push_str(&format!("{value:>5}{mflag}{qflag}{sflag}"));
        self
    }

    /// Append a clean reading in tenths of a degree.
    #[must_use]
    pub fn value(self, tenths: i32) -> Self {
        self.field(tenths, ' ', ' ', ' ')
    }

    /// Append a reading whose quality flag is set.
    #[must_use]
    pub fn flagged(self, tenths: i32, qflag: char) -> Self {
        self.field(tenths, ' ', qflag, ' ')
    }

    /// Append the `-9999` missing sentinel.
    #[must_use]
    pub fn missing(self) -> Self {
        self.field(-9999, ' ', ' ', ' ')
    }

    /// Append raw bytes, for malformed fields.
    #[must_use]
    pub fn raw(mut self, text: &str) -> Self {
        self.line.push_str(text);
        self
    }

    /// Append `days` clean readings `start, start + 1, ...`.
    #[must_use]
    pub fn values_from(mut self, start: i32, days: usize) -> Self {
        for t in (start..).take(days) {
            self = self.value(t);
        }
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.line
    }
}

/// Write `lines` to a gzip station file.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_station_gz(path: &Path, lines: &[String]) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut gz = GzEncoder::new(f, Compression::fast());
    for l in lines {
        gz.write_all(l.as_bytes())?;
        gz.write_all(b"\n")?;
    }
    gz.finish()?;
    Ok(())
}

/// Write `lines` to an uncompressed station file.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_station_plain(path: &Path, lines: &[String]) -> Result<()> {
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(path, body).with_context(|| format!("write {}", path.display()))
}

/// Temporary `input/` and `output/` directories removed on drop.
pub struct TempWorkspace {
    #[allow(dead_code)]
    dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl TempWorkspace {
    /// # Errors
    /// Returns an error if the directories cannot be created.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        fs::create_dir_all(&input)?;
        Ok(Self { dir, input, output })
    }

    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// A path next to (not inside) the input and output directories.
    #[must_use]
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a gzip station file named `<station>.dly.gz` into `input/`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn add_station(&self, station: &str, lines: &[String]) -> Result<PathBuf> {
        let path = self.input.join(format!("{station}.dly.gz"));
        write_station_gz(&path, lines)?;
        Ok(path)
    }

    /// A config reading `input/` and writing `output/`.
    #[must_use]
    pub fn config(&self) -> Config {
        Config::new(&self.input, &self.output)
    }
}

/// A small multi-station, multi-year dataset with every kind of skipped value.
///
/// Returns `(station, lines)` pairs. Per station the TMAX lines hold 10 valid
/// values plus one missing, one flagged and one malformed field, across the
/// years 1999-2001. TMIN and PRCP lines are interleaved.
#[must_use]
pub fn sample_stations() -> Vec<(String, Vec<String>)> {
    let mut out = Vec::new();
    for (s, station) in ["USC00000003", "ASN00000001", "GME00000002"].iter().enumerate() {
        let offset = i32::try_from(s).unwrap_or(0) * 10;
        let lines = vec![
            LineBuilder::new(station, 1999, 12, "TMAX")
                .value(10 + offset)
                .missing()
                .value(-25 + offset)
                .build(),
            LineBuilder::new(station, 1999, 12, "TMIN").value(-50).value(-60).build(),
            LineBuilder::new(station, 2000, 1, "TMAX")
                .value(5 + offset)
                .flagged(999, 'X')
                .raw("  abc   ")
                .value(7 + offset)
                .build(),
            LineBuilder::new(station, 2000, 2, "TMAX")
                .values_from(offset, 5)
                .build(),
            LineBuilder::new(station, 2001, 7, "TMAX").value(300 + offset).build(),
            LineBuilder::new(station, 2001, 7, "PRCP").value(12).build(),
        ];
        out.push(((*station).to_string(), lines));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_builder_layout() {
        let line = LineBuilder::new("CA1", 1950, 7, "TMIN").field(-12, 'a', 'b', 'c').build();
        assert_eq!(line, "CA1        195007TMIN  -12abc");
    }

    #[test]
    fn test_sample_stations() {
        let stations = sample_stations();
        assert_eq!(stations.len(), 3);
        assert!(stations.iter().all(|(_, lines)| lines.len() == 6));
        assert!(stations.iter().flat_map(|(_, l)| l).all(|l| l.len() >= 21));
    }

    #[test]
    fn test_workspace_layout() -> Result<()> {
        let ws = TempWorkspace::new()?;
        assert!(ws.input().is_dir());
        assert!(!ws.output().exists());
        let path = ws.add_station("X", &["line".to_string()])?;
        assert!(path.ends_with("X.dly.gz"));
        assert_eq!(ws.config().input_dir, ws.input());
        Ok(())
    }
}
