//! Transparent decompression for station files and gzip output writers.
//!
//! Input files may be plain text or compressed with any enabled codec. The
//! codec is picked from the file extension first and, failing that, from the
//! magic bytes at the head of the stream. Outputs are always gzip.
//!
//! ## Built-in Codecs
//!
//! - **Gzip** (`.gz`) - always available, via `flate2`
//! - **Zstd** (`.zst`) - feature `compression-zstd`
//! - **Bzip2** (`.bz2`) - feature `compression-bzip2`
//! - **Xz** (`.xz`) - feature `compression-xz`

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read};
use std::path::Path;

/// A decompression codec for input files.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip").
    fn name(&self) -> &str;

    /// Lowercase extensions including the leading dot.
    fn extensions(&self) -> &[&str];

    /// Magic byte signature, if the format has one.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Wrap a reader with decompression.
    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>>;
}

static CODECS: &[&dyn CompressionCodec] = &[
    &GzipCodec,
    #[cfg(feature = "compression-zstd")]
    &ZstdCodec,
    #[cfg(feature = "compression-bzip2")]
    &Bzip2Codec,
    #[cfg(feature = "compression-xz")]
    &XzCodec,
];

/// Every codec compiled into this build.
#[must_use]
pub fn codecs() -> &'static [&'static dyn CompressionCodec] {
    CODECS
}

fn detect_from_extension(path: &Path) -> Option<&'static dyn CompressionCodec> {
    let name = path.to_string_lossy().to_lowercase();
    CODECS
        .iter()
        .copied()
        .find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
}

fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<&'static dyn CompressionCodec> {
    let head = reader.fill_buf().ok()?;
    if head.is_empty() {
        return None;
    }
    CODECS
        .iter()
        .copied()
        .find(|c| c.magic_bytes().is_some_and(|m| head.starts_with(m)))
}

/// Wrap `reader` with the decompressor matching `path_hint`, or its magic bytes.
///
/// # Errors
/// Returns an error if the codec fails to initialise on the stream.
pub fn auto_detect_reader<R: Read + Send + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read + Send>> {
    if let Some(codec) = detect_from_extension(path_hint.as_ref()) {
        return codec
            .wrap_reader(Box::new(reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    let mut buffered = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buffered) {
        return codec
            .wrap_reader(Box::new(buffered))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    Ok(Box::new(buffered))
}

/// Open a (possibly compressed) text file for line reading.
///
/// # Errors
/// Returns an error if the file cannot be opened or its codec fails.
pub fn open_lines(path: &Path) -> Result<BufReader<Box<dyn Read + Send>>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = auto_detect_reader(file, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    Ok(BufReader::new(reader))
}

/// Create (truncating) a gzip-compressed output file.
///
/// The caller must call [`GzEncoder::finish`] so the trailer is written and
/// errors surface.
///
/// # Errors
/// Returns an error if the file cannot be created.
pub fn create_gzip(path: &Path, level: u32) -> Result<GzEncoder<BufWriter<File>>> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    Ok(GzEncoder::new(BufWriter::new(file), Compression::new(level)))
}

struct GzipCodec;

impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>> {
        // Multi-member streams appear when station files are concatenated.
        Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read + Send>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x42, 0x5a, 0x68])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(xz2::read::XzDecoder::new(reader)))
    }
}
