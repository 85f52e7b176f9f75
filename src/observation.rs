//! The single measured value that flows through the pipeline.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One daily reading for one station.
///
/// `year` is the partition: it is read from the source line once and never
/// recomputed. Observations are ordered by the composite key
/// `(station, year, month, day)`; see [`Observation::cmp_key`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub station: String,
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub value: f64,
}

impl Observation {
    /// Partition this observation belongs to.
    #[inline]
    #[must_use]
    pub fn partition(&self) -> i32 {
        self.year
    }

    /// Compare by composite key, then by value so equal keys still sort
    /// deterministically.
    #[must_use]
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.station
            .cmp(&other.station)
            .then(self.year.cmp(&other.year))
            .then(self.month.cmp(&other.month))
            .then(self.day.cmp(&other.day))
            .then(self.value.total_cmp(&other.value))
    }

    /// ISO `YYYY-MM-DD` date string.
    #[must_use]
    pub fn iso_date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Rough in-memory/encoded size used for flush accounting.
    #[inline]
    #[must_use]
    pub fn approx_size(&self) -> usize {
        // string + varint length, year varint, month, day, f64
        self.station.len() + 1 + 3 + 1 + 1 + 8
    }
}

/// Sort a partition's observations in place by composite key.
pub fn sort_observations(obs: &mut [Observation]) {
    obs.sort_unstable_by(Observation::cmp_key);
}

/// `true` when every adjacent pair is in composite-key order.
#[must_use]
pub fn is_sorted(obs: &[Observation]) -> bool {
    obs.windows(2).all(|w| w[0].cmp_key(&w[1]) != Ordering::Greater)
}
