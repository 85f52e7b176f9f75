//! Test helpers for building station files and checking columnar output.
//!
//! ```
//! use ghcn_columnar::testing::*;
//!
//! let line = LineBuilder::new("USC00123456", 2016, 6, "TMAX")
//!     .value(67)
//!     .value(71)
//!     .missing()
//!     .build();
//! assert_eq!(line.len(), 21 + 3 * 8);
//! ```
//!
//! - [`LineBuilder`] writes fixed-width GHCN lines day by day
//! - [`TempWorkspace`] owns temporary input and output directories
//! - [`assert_partition_invariants`] checks order and alignment of one year's columns

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
