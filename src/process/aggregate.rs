//! Per-sensor aggregation.

use crate::data::model::Matrix;

/// Combine the readings of each sensor into its final matrix.
///
/// Each sensor currently contributes exactly one background-subtracted
/// matrix, so this is a pass-through that keeps order. Merging several
/// readings per sensor belongs here.
pub fn aggregate(scans: Vec<(String, Matrix)>) -> Vec<(String, Matrix)> {
    scans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_is_identity() {
        let scans = vec![
            ("B".to_string(), Matrix::column_vector(vec![1.0, 2.0])),
            ("A".to_string(), Matrix::zeros(1, 3)),
        ];
        assert_eq!(aggregate(scans.clone()), scans);
    }
}
