//! Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// What the normalizer does with a column whose standard deviation is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ZeroVariance {
    /// Subtract the mean only; the column becomes all zeros.
    #[default]
    Center,
    /// Divide by zero anyway, leaving NaN/inf in the column.
    Propagate,
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Metadata table (CSV, JSON records or Parquet export)
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    /// Raw scans (JSON or Parquet)
    #[serde(default = "default_raw_path")]
    pub raw_path: PathBuf,

    /// Background scans (JSON or Parquet)
    #[serde(default = "default_background_path")]
    pub background_path: PathBuf,

    /// Flattened CSV output
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Metadata column holding the scan key
    #[serde(default = "default_filename_column")]
    pub filename_column: String,

    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Numeric options for the processing stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingConfig {
    /// Repeated scans expected per sensor (indices `0..n`)
    #[serde(default = "default_scans_per_sensor")]
    pub scans_per_sensor: usize,

    #[serde(default)]
    pub zero_variance: ZeroVariance,
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("X_Metadata.csv")
}

fn default_raw_path() -> PathBuf {
    PathBuf::from("x_raw.json")
}

fn default_background_path() -> PathBuf {
    PathBuf::from("X_background.json")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("processed_biomarker_x_data_cleaned.csv")
}

fn default_filename_column() -> String {
    "filename".to_string()
}

fn default_scans_per_sensor() -> usize {
    3
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            scans_per_sensor: default_scans_per_sensor(),
            zero_variance: ZeroVariance::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            metadata_path: default_metadata_path(),
            raw_path: default_raw_path(),
            background_path: default_background_path(),
            output_path: default_output_path(),
            filename_column: default_filename_column(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let config_err = |reason: String| PipelineError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| config_err(e.to_string()))?;
        config.validate().map_err(config_err)?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), String> {
        if self.processing.scans_per_sensor == 0 {
            return Err("scans_per_sensor must be at least 1".to_string());
        }
        if self.filename_column.is_empty() {
            return Err("filename_column must not be empty".to_string());
        }
        Ok(())
    }
}
