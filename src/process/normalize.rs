//! Column-wise z-score standardization.

use std::collections::BTreeMap;

use crate::config::ZeroVariance;
use crate::data::model::{Matrix, ScanSet};

/// Normalized scans by key; `None` marks a scan that was empty.
pub type NormalizedSet = BTreeMap<String, Option<Matrix>>;

/// Standardize each column to zero mean and unit standard deviation.
///
/// Mean and standard deviation are computed per column across rows, with the
/// population divisor `n`. Returns `None` for an absent or empty matrix.
/// Columns with zero standard deviation follow `zero_variance`.
pub fn normalize(matrix: Option<&Matrix>, zero_variance: ZeroVariance) -> Option<Matrix> {
    let matrix = matrix.filter(|m| !m.is_empty())?;
    let (rows, cols) = matrix.shape();
    let n = rows as f64;

    let mut means = vec![0.0; cols];
    for row in matrix.iter_rows() {
        for (acc, &v) in means.iter_mut().zip(row) {
            *acc += v;
        }
    }
    for mean in &mut means {
        *mean /= n;
    }

    let mut stds = vec![0.0; cols];
    for row in matrix.iter_rows() {
        for ((acc, &v), &mean) in stds.iter_mut().zip(row).zip(&means) {
            *acc += (v - mean).powi(2);
        }
    }
    // a constant column can pick up a rounding-level std, so test the values
    if let Some(first) = matrix.iter_rows().next() {
        for (col, &v0) in first.iter().enumerate() {
            if matrix.iter_rows().all(|row| row[col] == v0) {
                means[col] = v0;
                stds[col] = 0.0;
            }
        }
    }
    for std in &mut stds {
        *std = (*std / n).sqrt();
        if *std == 0.0 && zero_variance == ZeroVariance::Center {
            *std = 1.0;
        }
    }

    let mut data = Vec::with_capacity(rows * cols);
    for row in matrix.iter_rows() {
        data.extend(
            row.iter()
                .zip(means.iter().zip(&stds))
                .map(|(&v, (&mean, &std))| (v - mean) / std),
        );
    }
    Matrix::new(rows, cols, data)
}

/// Normalize every scan of a collection independently.
pub fn normalize_set(scans: &ScanSet, zero_variance: ZeroVariance) -> NormalizedSet {
    scans
        .iter()
        .map(|(key, record)| (key.clone(), normalize(Some(&record.matrix), zero_variance)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ScanRecord;

    const EPS: f64 = 1e-12;

    fn column_stats(m: &Matrix, col: usize) -> (f64, f64) {
        let n = m.rows() as f64;
        let mean = (0..m.rows()).map(|r| m.get(r, col)).sum::<f64>() / n;
        let var = (0..m.rows())
            .map(|r| (m.get(r, col) - mean).powi(2))
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_columns_have_zero_mean_unit_std() {
        let m = Matrix::from_rows(vec![
            vec![1.0, 10.0, -3.0],
            vec![2.0, 30.0, 0.5],
            vec![4.0, 20.0, 7.0],
            vec![8.0, 60.0, 1.0],
        ])
        .unwrap();

        let z = normalize(Some(&m), ZeroVariance::Center).unwrap();
        assert_eq!(z.shape(), m.shape());
        for col in 0..3 {
            let (mean, std) = column_stats(&z, col);
            assert!(mean.abs() < EPS, "column {col} mean {mean}");
            assert!((std - 1.0).abs() < EPS, "column {col} std {std}");
        }
    }

    #[test]
    fn test_known_values() {
        // mean 2, population std 1
        let m = Matrix::column_vector(vec![1.0, 3.0]);
        let z = normalize(Some(&m), ZeroVariance::Center).unwrap();
        assert_eq!(z.as_slice(), &[-1.0, 1.0]);
    }

    #[test]
    fn test_absent_and_empty() {
        assert!(normalize(None, ZeroVariance::Center).is_none());
        assert!(normalize(Some(&Matrix::zeros(0, 0)), ZeroVariance::Center).is_none());
        assert!(normalize(Some(&Matrix::zeros(4, 0)), ZeroVariance::Propagate).is_none());
    }

    #[test]
    fn test_zero_variance_propagates_non_finite() {
        let m = Matrix::from_rows(vec![vec![5.0, 1.0], vec![5.0, 3.0]]).unwrap();
        let z = normalize(Some(&m), ZeroVariance::Propagate).unwrap();
        assert!(z.get(0, 0).is_nan());
        assert!(z.get(1, 0).is_nan());
        assert_eq!(z.get(0, 1), -1.0);
        assert_eq!(z.get(1, 1), 1.0);
    }

    #[test]
    fn test_zero_variance_center_gives_zeros() {
        let m = Matrix::from_rows(vec![vec![5.0, 1.0], vec![5.0, 3.0]]).unwrap();
        let z = normalize(Some(&m), ZeroVariance::Center).unwrap();
        assert_eq!(z.get(0, 0), 0.0);
        assert_eq!(z.get(1, 0), 0.0);
        assert_eq!(z.get(1, 1), 1.0);
    }

    #[test]
    fn test_constant_inexact_column_is_degenerate() {
        // 0.1 has no exact binary form, so its computed std is not exactly zero
        let m = Matrix::from_rows(vec![vec![0.1, 1.0], vec![0.1, 2.0], vec![0.1, 3.0]]).unwrap();

        let z = normalize(Some(&m), ZeroVariance::Center).unwrap();
        assert_eq!([z.get(0, 0), z.get(1, 0), z.get(2, 0)], [0.0, 0.0, 0.0]);

        let z = normalize(Some(&m), ZeroVariance::Propagate).unwrap();
        assert!((0..3).all(|r| z.get(r, 0).is_nan()));
        assert!(z.get(1, 1).abs() < EPS);
    }

    #[test]
    fn test_single_row_is_degenerate() {
        let m = Matrix::from_rows(vec![vec![2.0, -7.0]]).unwrap();
        let z = normalize(Some(&m), ZeroVariance::Center).unwrap();
        assert_eq!(z.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_normalize_set_marks_empty_scans() {
        let mut scans = ScanSet::new();
        scans.insert(
            "S1_0".to_string(),
            ScanRecord {
                matrix: Matrix::column_vector(vec![1.0, 3.0]),
            },
        );
        scans.insert(
            "S1_1".to_string(),
            ScanRecord {
                matrix: Matrix::zeros(0, 0),
            },
        );

        let normalized = normalize_set(&scans, ZeroVariance::Center);
        assert_eq!(normalized.len(), 2);
        assert!(normalized["S1_0"].is_some());
        assert!(normalized["S1_1"].is_none());
    }
}
