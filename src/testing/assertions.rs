//! Assertions over written columnar output.

use crate::columns::ColumnTriple;
use crate::staging::StagingLayout;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

/// Read every partition's columns under `root`.
///
/// # Errors
/// Returns an error if a partition's columns cannot be read.
pub fn read_output(root: &Path) -> Result<BTreeMap<i32, ColumnTriple>> {
    let layout = StagingLayout::new(root);
    let mut out = BTreeMap::new();
    for p in layout.partitions()? {
        out.insert(p, ColumnTriple::read_from(&layout.partition_dir(p))?);
    }
    Ok(out)
}

/// Assert equal column lengths and ascending `(station, date)` order.
///
/// ISO dates sort lexicographically in date order, so comparing
/// `(id, date, value)` triples checks the composite key.
///
/// # Panics
/// Panics if the columns are misaligned or out of order.
pub fn assert_partition_invariants(partition: i32, triple: &ColumnTriple) {
    assert!(
        triple.is_aligned(),
        "partition {partition}: {} ids, {} dates, {} values",
        triple.ids.len(),
        triple.dates.len(),
        triple.values.len()
    );
    let year = format!("{partition:04}-");
    for (i, d) in triple.dates.iter().enumerate() {
        assert!(d.starts_with(&year), "partition {partition}: row {i} dated {d}");
    }
    for i in 1..triple.len() {
        let prev = (&triple.ids[i - 1], &triple.dates[i - 1]);
        let cur = (&triple.ids[i], &triple.dates[i]);
        assert!(
            prev < cur || (prev == cur && triple.values[i - 1] <= triple.values[i]),
            "partition {partition}: rows {} and {i} out of order: {prev:?} > {cur:?}",
            i - 1
        );
    }
}

/// Flatten all partitions into `(id, date, value)` rows, partition by partition.
#[must_use]
pub fn rows(output: &BTreeMap<i32, ColumnTriple>) -> Vec<(String, String, f64)> {
    output
        .values()
        .flat_map(|t| {
            t.ids
                .iter()
                .zip(&t.dates)
                .zip(&t.values)
                .map(|((i, d), v)| (i.clone(), d.clone(), *v))
        })
        .collect()
}
