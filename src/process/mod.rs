//! Processing stages, applied in order:
//! normalize → align → subtract background → aggregate.
//!
//! Every stage takes its inputs by reference and returns new values.
//! Conditions that drop data without stopping the run are returned as
//! [`Notice`]s next to the stage output.

use std::fmt;

pub mod aggregate;
pub mod align;
pub mod normalize;
pub mod subtract;

pub use aggregate::aggregate;
pub use align::{align, align_sensor, align_sensors, AlignedSensor};
pub use normalize::{normalize, normalize_set, NormalizedSet};
pub use subtract::{subtract, subtract_backgrounds};

/// A recoverable condition met while processing one sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Sensor skipped: some repeated scans are absent or empty.
    MissingScans { sensor: String, missing: Vec<String> },
    /// One scan could not be aligned and was left out of the mean.
    AlignmentFailed { sensor: String, scan: String },
    /// No usable background; a zero background was used.
    MissingBackground { sensor: String },
    /// Sensor skipped: background and aligned scan differ in shape.
    BackgroundShapeMismatch {
        sensor: String,
        scan: (usize, usize),
        background: (usize, usize),
    },
}

impl Notice {
    pub fn sensor(&self) -> &str {
        match self {
            Notice::MissingScans { sensor, .. }
            | Notice::AlignmentFailed { sensor, .. }
            | Notice::MissingBackground { sensor }
            | Notice::BackgroundShapeMismatch { sensor, .. } => sensor,
        }
    }

    /// True when the sensor produced no output because of this notice.
    pub fn drops_sensor(&self) -> bool {
        matches!(
            self,
            Notice::MissingScans { .. } | Notice::BackgroundShapeMismatch { .. }
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MissingScans { sensor, missing } => write!(
                f,
                "skipping sensor {sensor} due to missing scan data: {}",
                missing.join(", ")
            ),
            Notice::AlignmentFailed { sensor, scan } => {
                write!(f, "failed to align scan {scan} for sensor {sensor}")
            }
            Notice::MissingBackground { sensor } => {
                write!(f, "no background for sensor {sensor}, using zeros")
            }
            Notice::BackgroundShapeMismatch {
                sensor,
                scan,
                background,
            } => write!(
                f,
                "skipping sensor {sensor}: scan shape {scan:?} does not match background shape {background:?}"
            ),
        }
    }
}
