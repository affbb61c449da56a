//! Cross-correlation alignment of repeated scans.
//!
//! Scans are compared along the row axis. For a multi-column matrix the
//! per-column correlations are summed, which is the zero column-lag slice of
//! the full 2-D correlation. A single-column matrix reduces to plain 1-D
//! correlation.

use log::{debug, warn};

use super::normalize::NormalizedSet;
use super::Notice;
use crate::data::model::{scan_key, Matrix};

/// One sensor's repeated scans collapsed into a single matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSensor {
    pub sensor: String,
    /// Mean of the reference and every successfully aligned scan.
    pub matrix: Matrix,
    /// Number of scans that went into the mean, reference included.
    pub scans_used: usize,
    /// Alignment failures inside this group.
    pub notices: Vec<Notice>,
}

/// Full cross-correlation of `reference` and `candidate` along rows.
///
/// Entry `k` (for `k` in `0..M + N - 1`) is
/// `Σ_n Σ_j reference[n + k - (N - 1)][j] * candidate[n][j]`,
/// with out-of-range rows contributing nothing. `M` and `N` are the row
/// counts of `reference` and `candidate`; both must have the same column
/// count.
pub fn cross_correlate(reference: &Matrix, candidate: &Matrix) -> Vec<f64> {
    let m = reference.rows() as isize;
    let n = candidate.rows() as isize;
    if m == 0 || n == 0 {
        return Vec::new();
    }

    (0..m + n - 1)
        .map(|k| {
            let lag = k - (n - 1);
            // rows of the candidate that overlap the reference at this lag
            let first = (-lag).max(0);
            let last = (m - lag).min(n);
            (first..last)
                .map(|c| {
                    let r = (c + lag) as usize;
                    dot(reference.row(r), candidate.row(c as usize))
                })
                .sum()
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Index of the largest value; the first one wins a tie. A NaN anywhere
/// counts as the maximum, matching the usual array-library convention.
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            return Some(i);
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Row shift that best lines `candidate` up with `reference`:
/// `argmax(correlation) - (rows(reference) - 1)`.
pub fn estimate_shift(reference: &Matrix, candidate: &Matrix) -> Option<isize> {
    let correlation = cross_correlate(reference, candidate);
    let peak = argmax(&correlation)? as isize;
    Some(peak - (reference.rows() as isize - 1))
}

/// Align `candidate` to `reference` by circularly shifting its rows.
///
/// Returns `None` if either input is absent or empty, or if the two shapes
/// differ (aligned scans are averaged elementwise with the reference).
pub fn align(reference: Option<&Matrix>, candidate: Option<&Matrix>) -> Option<Matrix> {
    let (reference, candidate) = (reference?, candidate?);
    if reference.shape() != candidate.shape() || reference.is_empty() {
        return None;
    }
    let shift = estimate_shift(reference, candidate)?;
    debug!("estimated shift {shift} over {} rows", reference.rows());
    Some(candidate.roll_rows(shift))
}

/// Collapse the repeated scans of one sensor.
///
/// Scans `<sensor>_0` .. `<sensor>_{n-1}` must all be present and non-empty,
/// otherwise the sensor is skipped. Scan 0 is the fixed reference: every
/// other scan is aligned to it directly. Scans that fail to align are left
/// out of the mean and reported.
pub fn align_sensor(
    sensor: &str,
    normalized: &NormalizedSet,
    scans_per_sensor: usize,
) -> Result<AlignedSensor, Notice> {
    let keys: Vec<String> = (0..scans_per_sensor).map(|i| scan_key(sensor, i)).collect();
    let scans: Vec<Option<&Matrix>> = keys
        .iter()
        .map(|key| normalized.get(key).and_then(Option::as_ref))
        .collect();

    let missing: Vec<String> = keys
        .iter()
        .zip(&scans)
        .filter(|(_, scan)| scan.is_none())
        .map(|(key, _)| key.clone())
        .collect();
    if !missing.is_empty() {
        return Err(Notice::MissingScans {
            sensor: sensor.to_string(),
            missing,
        });
    }

    // scans_per_sensor == 0 leaves no reference to align against
    let Some(&reference) = scans.first() else {
        return Err(Notice::MissingScans {
            sensor: sensor.to_string(),
            missing: vec![scan_key(sensor, 0)],
        });
    };
    let mut aligned: Vec<Matrix> = reference.into_iter().cloned().collect();
    let mut notices = Vec::new();

    for (key, scan) in keys.iter().zip(&scans).skip(1) {
        match align(reference, *scan) {
            Some(matrix) => aligned.push(matrix),
            None => notices.push(Notice::AlignmentFailed {
                sensor: sensor.to_string(),
                scan: key.clone(),
            }),
        }
    }

    // every entry of `aligned` has the reference shape
    let matrix = Matrix::mean_of(&aligned).ok_or_else(|| Notice::MissingScans {
        sensor: sensor.to_string(),
        missing: keys[..1].to_vec(),
    })?;

    Ok(AlignedSensor {
        sensor: sensor.to_string(),
        matrix,
        scans_used: aligned.len(),
        notices,
    })
}

/// Align every sensor in order. Returns the aligned sensors and every
/// notice raised on the way; each notice is also logged.
pub fn align_sensors(
    sensors: &[String],
    normalized: &NormalizedSet,
    scans_per_sensor: usize,
) -> (Vec<AlignedSensor>, Vec<Notice>) {
    let mut aligned = Vec::with_capacity(sensors.len());
    let mut notices = Vec::new();

    for sensor in sensors {
        match align_sensor(sensor, normalized, scans_per_sensor) {
            Ok(group) => {
                for notice in &group.notices {
                    warn!("{notice}");
                }
                debug!(
                    "Aligned sensor {sensor} from {} scans: {:?}",
                    group.scans_used,
                    group.matrix.shape()
                );
                notices.extend(group.notices.iter().cloned());
                aligned.push(group);
            }
            Err(notice) => {
                warn!("{notice}");
                notices.push(notice);
            }
        }
    }

    (aligned, notices)
}
