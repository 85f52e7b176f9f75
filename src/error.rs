//! Typed error conditions.
//!
//! Most functions return [`anyhow::Result`] with file context attached; the
//! enums here cover the conditions callers may want to match on.

use thiserror::Error;

/// A structurally unusable input line.
///
/// Any of these aborts the run: the partition and ordering of every value on
/// the line depend on the fields that failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("line is {len} bytes, shorter than the {min}-byte record header")]
    TooShort { len: usize, min: usize },

    #[error("line header is not valid UTF-8")]
    NotUtf8,

    #[error("unparseable year field {0:?}")]
    BadYear(String),

    #[error("unparseable month field {0:?}")]
    BadMonth(String),

    #[error("month {0} outside 1..=12")]
    MonthOutOfRange(u8),
}

/// Staging data that cannot be turned back into observations.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("staging file {0} is missing")]
    Missing(String),

    #[error("staging data corrupt after {decoded} observations: {source}")]
    Corrupt {
        decoded: usize,
        #[source]
        source: postcard::Error,
    },
}
