//! Batch cleaning of repeated sensor scans.
//!
//! Loads a metadata table plus raw and background scan collections,
//! normalizes every scan column-wise, aligns the repeated scans of each
//! sensor by cross-correlation, subtracts the background, clamps negatives
//! to zero and writes one flattened CSV row per sensor.
//!
//! # Example
//!
//! ```no_run
//! use scan_cleaner::{pipeline, PipelineConfig};
//!
//! let report = pipeline::run(&PipelineConfig::default()).unwrap();
//! println!("{} sensors written", report.output.rows);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod process;

pub use config::{PipelineConfig, ProcessingConfig, ZeroVariance};
pub use data::model::{Matrix, MetadataTable, ScanRecord, ScanSet};
pub use error::{LoadError, PipelineError, WriteError};
pub use process::Notice;
