//! File-level I/O: codec detection, input discovery, and column files.

pub mod columnar;
pub mod compression;
pub mod glob;
