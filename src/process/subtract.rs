//! Background subtraction with zero clamping.

use log::warn;
use thiserror::Error;

use super::align::AlignedSensor;
use super::normalize::NormalizedSet;
use super::Notice;
use crate::data::model::Matrix;

/// The background cannot be subtracted from a scan of a different shape.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("shape mismatch: scan is {scan:?}, background is {background:?}")]
pub struct ShapeMismatch {
    pub scan: (usize, usize),
    pub background: (usize, usize),
}

/// `raw - background`, with every entry below zero set to exactly zero.
///
/// A missing background behaves as an all-zero matrix of `raw`'s shape, so
/// the result is just `raw` clamped. There is no upper clamp.
pub fn subtract(raw: &Matrix, background: Option<&Matrix>) -> Result<Matrix, ShapeMismatch> {
    let difference = match background {
        None => raw.clone(),
        Some(bg) => raw.zip_map(bg, |r, b| r - b).ok_or(ShapeMismatch {
            scan: raw.shape(),
            background: bg.shape(),
        })?,
    };
    Ok(difference.map(|v| if v < 0.0 { 0.0 } else { v }))
}

/// Subtract each sensor's normalized background. Sensors keep their order.
///
/// Backgrounds are keyed by sensor id. A missing or empty background is
/// reported and treated as zeros; a background of the wrong shape drops the
/// sensor.
pub fn subtract_backgrounds(
    aligned: &[AlignedSensor],
    backgrounds: &NormalizedSet,
) -> (Vec<(String, Matrix)>, Vec<Notice>) {
    let mut subtracted = Vec::with_capacity(aligned.len());
    let mut notices = Vec::new();

    for group in aligned {
        let sensor = &group.sensor;
        let background = backgrounds.get(sensor).and_then(Option::as_ref);
        if background.is_none() {
            let notice = Notice::MissingBackground {
                sensor: sensor.clone(),
            };
            warn!("{notice}");
            notices.push(notice);
        }

        match subtract(&group.matrix, background) {
            Ok(matrix) => subtracted.push((sensor.clone(), matrix)),
            Err(mismatch) => {
                let notice = Notice::BackgroundShapeMismatch {
                    sensor: sensor.clone(),
                    scan: mismatch.scan,
                    background: mismatch.background,
                };
                warn!("{notice}");
                notices.push(notice);
            }
        }
    }

    (subtracted, notices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    fn group(sensor: &str, matrix: Matrix) -> AlignedSensor {
        AlignedSensor {
            sensor: sensor.to_string(),
            matrix,
            scans_used: 1,
            notices: Vec::new(),
        }
    }

    #[test]
    fn test_subtract_without_background_clamps_raw() {
        let raw = m(vec![vec![-1.5, 2.0], vec![0.0, -0.25]]);
        let out = subtract(&raw, None).unwrap();
        assert_eq!(out.as_slice(), &[0.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_subtract_with_background() {
        let raw = m(vec![vec![3.0, 1.0], vec![2.0, 5.0]]);
        let bg = m(vec![vec![1.0, 2.0], vec![2.0, 1.5]]);
        let out = subtract(&raw, Some(&bg)).unwrap();
        assert_eq!(out.as_slice(), &[2.0, 0.0, 0.0, 3.5]);
    }

    #[test]
    fn test_subtract_never_negative() {
        // deterministic pseudo-random values in [-1, 1)
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 52) as f64 - 1.0
        };
        for _ in 0..20 {
            let raw = Matrix::new(4, 3, (0..12).map(|_| next() * 10.0).collect()).unwrap();
            let bg = Matrix::new(4, 3, (0..12).map(|_| next() * 10.0).collect()).unwrap();
            let out = subtract(&raw, Some(&bg)).unwrap();
            assert!(out.as_slice().iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_subtract_shape_mismatch() {
        let raw = Matrix::zeros(2, 2);
        let bg = Matrix::zeros(3, 2);
        assert_eq!(
            subtract(&raw, Some(&bg)).unwrap_err(),
            ShapeMismatch {
                scan: (2, 2),
                background: (3, 2),
            }
        );
    }

    #[test]
    fn test_subtract_backgrounds_reports_conditions() {
        let aligned = vec![
            group("A", m(vec![vec![1.0, -1.0]])),
            group("B", m(vec![vec![1.0, 1.0]])),
            group("C", m(vec![vec![4.0, 4.0]])),
            group("D", m(vec![vec![2.0, 2.0]])),
        ];
        let mut backgrounds = NormalizedSet::new();
        backgrounds.insert("B".to_string(), Some(m(vec![vec![0.5, 2.0]])));
        backgrounds.insert("C".to_string(), Some(Matrix::zeros(2, 2)));
        backgrounds.insert("D".to_string(), None);

        let (out, notices) = subtract_backgrounds(&aligned, &backgrounds);

        let sensors: Vec<&str> = out.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(sensors, vec!["A", "B", "D"]);
        assert_eq!(out[0].1.as_slice(), &[1.0, 0.0]);
        assert_eq!(out[1].1.as_slice(), &[0.5, 0.0]);
        assert_eq!(out[2].1.as_slice(), &[2.0, 2.0]);

        assert_eq!(notices.len(), 3);
        assert_eq!(
            notices[0],
            Notice::MissingBackground {
                sensor: "A".to_string()
            }
        );
        assert!(matches!(&notices[1], Notice::BackgroundShapeMismatch { sensor, .. } if sensor == "C"));
        assert_eq!(notices[2].sensor(), "D");
    }
}
