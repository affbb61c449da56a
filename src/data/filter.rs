use std::collections::HashSet;

use super::model::{sensor_of, MetadataTable, ScanSet};

// ---------------------------------------------------------------------------
// Metadata filtering: keep rows that describe a loaded scan
// ---------------------------------------------------------------------------

/// Return indices of metadata rows whose filename is a key of `scans`.
///
/// A row passes when:
/// * it has a filename → and that filename is present in `scans`
/// * it has no filename → it never passes
pub fn available_indices(metadata: &MetadataTable, scans: &ScanSet) -> Vec<usize> {
    metadata
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            row.filename
                .as_deref()
                .is_some_and(|name| scans.contains_key(name))
        })
        .map(|(i, _)| i)
        .collect()
}

/// Sensor identifiers referenced by the available metadata rows, in order of
/// first appearance, without duplicates.
pub fn sensors_in(metadata: &MetadataTable, scans: &ScanSet) -> Vec<String> {
    let mut seen = HashSet::new();
    available_indices(metadata, scans)
        .into_iter()
        .filter_map(|i| metadata.rows[i].filename.as_deref())
        .map(sensor_of)
        .filter(|sensor| seen.insert(sensor.to_string()))
        .map(str::to_string)
        .collect()
}
