//! Fixed-width GHCN-Daily line parser.
//!
//! Each input line carries one station-month of one element:
//!
//! ```text
//! 0         11   15 17   21      29      37
//! |station  |year|mo|elem|day 1  |day 2  |...
//! ```
//!
//! Every day field is 8 bytes: a 5-byte signed value in tenths of a degree,
//! then the measurement, quality, and source flag bytes. The quality flag sits
//! at offset 6 *within each day field*.

use crate::error::LineError;
use crate::observation::Observation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const STATION_RANGE: std::ops::Range<usize> = 0..11;
pub const YEAR_RANGE: std::ops::Range<usize> = 11..15;
pub const MONTH_RANGE: std::ops::Range<usize> = 15..17;
pub const ELEMENT_RANGE: std::ops::Range<usize> = 17..21;
/// Offset of the first day field; also the minimum line length.
pub const HEADER_LEN: usize = 21;
pub const DAY_FIELD_LEN: usize = 8;
pub const VALUE_LEN: usize = 5;
pub const QUALITY_FLAG_OFFSET: usize = 6;
/// Raw value denoting a missing reading.
pub const MISSING: i32 = -9999;

/// Which temperature reading to extract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ElementType {
    #[default]
    #[serde(rename = "TMAX")]
    Tmax,
    #[serde(rename = "TMIN")]
    Tmin,
}

impl ElementType {
    /// The four-character element code used in the files.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            ElementType::Tmax => "TMAX",
            ElementType::Tmin => "TMIN",
        }
    }

    fn matches(self, code: &[u8]) -> bool {
        code == self.code().as_bytes()
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ElementType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TMAX" => Ok(ElementType::Tmax),
            "TMIN" => Ok(ElementType::Tmin),
            other => anyhow::bail!("unknown element type {other:?} (expected TMAX or TMIN)"),
        }
    }
}

/// Values dropped from a line without failing it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// `-9999` sentinel.
    pub missing: u64,
    /// Non-blank quality flag.
    pub flagged: u64,
    /// Value bytes that are not an integer.
    pub malformed: u64,
}

impl SkipCounts {
    pub fn merge(&mut self, other: SkipCounts) {
        self.missing += other.missing;
        self.flagged += other.flagged;
        self.malformed += other.malformed;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.missing + self.flagged + self.malformed
    }
}

/// Result of parsing one line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedLine {
    /// The line carried the requested element.
    pub matched: bool,
    pub observations: Vec<Observation>,
    pub skipped: SkipCounts,
}

/// Station/year/month/element header shared by every day field on a line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineHeader<'a> {
    pub station: &'a str,
    pub year: i32,
    pub month: u8,
    pub element: &'a [u8],
}

/// Outcome of reading a single day field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayValue {
    /// Reading in tenths of a degree.
    Valid(i32),
    Missing,
    Flagged,
    Malformed,
}

impl DayValue {
    /// The reading in degrees, if valid.
    #[must_use]
    pub fn degrees(self) -> Option<f64> {
        match self {
            DayValue::Valid(tenths) => Some(f64::from(tenths) / 10.0),
            _ => None,
        }
    }
}

/// Parse the fixed header of a line.
///
/// Only the header bytes must be UTF-8; day fields are read as raw bytes.
///
/// # Errors
/// Returns a [`LineError`] when the line is too short or its year/month
/// fields are not all digits.
pub fn parse_header<L: AsRef<[u8]> + ?Sized>(line: &L) -> Result<LineHeader<'_>, LineError> {
    let bytes = line.as_ref();
    if bytes.len() < HEADER_LEN {
        return Err(LineError::TooShort { len: bytes.len(), min: HEADER_LEN });
    }
    let field = |r: std::ops::Range<usize>| {
        std::str::from_utf8(&bytes[r]).map_err(|_| LineError::NotUtf8)
    };

    let station = field(STATION_RANGE)?;
    let year_s = field(YEAR_RANGE)?;
    let year = parse_digits::<i32>(year_s).ok_or_else(|| LineError::BadYear(year_s.to_string()))?;
    let month_s = field(MONTH_RANGE)?;
    let month = parse_digits::<u8>(month_s).ok_or_else(|| LineError::BadMonth(month_s.to_string()))?;
    if !(1..=12).contains(&month) {
        return Err(LineError::MonthOutOfRange(month));
    }

    Ok(LineHeader { station, year, month, element: &bytes[ELEMENT_RANGE] })
}

/// Unsigned decimal field; signs and padding are rejected.
fn parse_digits<N: FromStr>(s: &str) -> Option<N> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Decode the day field starting at byte `pos`.
///
/// Returns `None` when the field is truncated before its value bytes end.
#[must_use]
pub fn parse_day_field(bytes: &[u8], pos: usize) -> Option<DayValue> {
    let raw = bytes.get(pos..pos + VALUE_LEN)?;
    let flag = bytes.get(pos + QUALITY_FLAG_OFFSET).copied().unwrap_or(b' ');
    if flag != b' ' {
        return Some(DayValue::Flagged);
    }
    let parsed = std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok());
    Some(match parsed {
        None => DayValue::Malformed,
        Some(MISSING) => DayValue::Missing,
        Some(tenths) => DayValue::Valid(tenths),
    })
}

/// Iterate the day fields of a line as `(day, value)` pairs.
pub fn day_fields<L: AsRef<[u8]> + ?Sized>(line: &L) -> impl Iterator<Item = (u8, DayValue)> + '_ {
    let bytes = line.as_ref();
    (HEADER_LEN..bytes.len())
        .step_by(DAY_FIELD_LEN)
        .map_while(move |pos| {
            let day = u8::try_from((pos - HEADER_LEN) / DAY_FIELD_LEN + 1).ok()?;
            parse_day_field(bytes, pos).map(|v| (day, v))
        })
}

/// Parse one line into the observations it carries for `element`.
///
/// Lines of any other element type produce an empty result.
///
/// # Errors
/// Fails only when the header is unusable; bad individual values are skipped
/// and counted in [`ParsedLine::skipped`].
pub fn parse_line<L: AsRef<[u8]> + ?Sized>(
    line: &L,
    element: ElementType,
) -> Result<ParsedLine, LineError> {
    let mut out = ParsedLine::default();
    let len = line.as_ref().len();
    if len < HEADER_LEN {
        return Err(LineError::TooShort { len, min: HEADER_LEN });
    }
    if !line_matches(line, element) {
        return Ok(out);
    }
    let header = parse_header(line)?;
    out.matched = true;

    for (day, value) in day_fields(line) {
        match value {
            DayValue::Valid(tenths) => out.observations.push(Observation {
                station: header.station.to_string(),
                year: header.year,
                month: header.month,
                day,
                value: f64::from(tenths) / 10.0,
            }),
            DayValue::Missing => out.skipped.missing += 1,
            DayValue::Flagged => out.skipped.flagged += 1,
            DayValue::Malformed => out.skipped.malformed += 1,
        }
    }
    Ok(out)
}

/// Cheap element check on raw bytes, used to skip lines before full parsing.
#[must_use]
pub fn line_matches<L: AsRef<[u8]> + ?Sized>(line: &L, element: ElementType) -> bool {
    line.as_ref()
        .get(ELEMENT_RANGE)
        .is_some_and(|code| element.matches(code))
}
