//! End-to-end run: load → normalize → align → subtract → aggregate → write.

use log::{debug, error, info};

use crate::config::{PipelineConfig, ProcessingConfig};
use crate::data::filter::{available_indices, sensors_in};
use crate::data::loader::{load_metadata, load_scans};
use crate::data::model::{Matrix, MetadataTable, ScanSet};
use crate::data::writer::{write_flattened_csv, WriteSummary};
use crate::error::PipelineError;
use crate::process::{
    aggregate, align_sensors, normalize_set, subtract_backgrounds, Notice,
};

/// Everything the pipeline reads.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub metadata: MetadataTable,
    pub raw: ScanSet,
    pub background: ScanSet,
}

/// Result of the processing stages, before anything is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Processed {
    /// Final matrix per sensor, in metadata order.
    pub sensors: Vec<(String, Matrix)>,
    /// Recoverable conditions, in the order they were met.
    pub notices: Vec<Notice>,
}

impl Processed {
    /// Sensors that produced no output.
    pub fn dropped_sensors(&self) -> Vec<&str> {
        self.notices
            .iter()
            .filter(|n| n.drops_sensor())
            .map(Notice::sensor)
            .collect()
    }
}

/// Summary of a complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub processed: Processed,
    pub output: WriteSummary,
}

/// Load metadata, raw scans and background scans.
///
/// Metadata problems and failure to load either scan collection stop the run.
pub fn load_inputs(config: &PipelineConfig) -> Result<PipelineInputs, PipelineError> {
    let metadata = load_metadata(&config.metadata_path, &config.filename_column).map_err(
        |source| PipelineError::Metadata {
            path: config.metadata_path.clone(),
            source,
        },
    )?;
    info!("Metadata loaded: {} rows", metadata.len());

    let raw = load_scans(&config.raw_path).map_err(|source| {
        error!("Failed to load raw data: {source}");
        PipelineError::RawLoad {
            path: config.raw_path.clone(),
            source,
        }
    })?;
    info!("Raw data keys: {:?}", raw.keys().collect::<Vec<_>>());

    let background = load_scans(&config.background_path).map_err(|source| {
        error!("Failed to load background data: {source}");
        PipelineError::BackgroundLoad {
            path: config.background_path.clone(),
            source,
        }
    })?;
    info!("Background data keys: {:?}", background.keys().collect::<Vec<_>>());

    Ok(PipelineInputs {
        metadata,
        raw,
        background,
    })
}

/// Run the processing stages on loaded inputs. Never fails: every problem at
/// this point is per sensor and ends up in [`Processed::notices`].
pub fn process(inputs: &PipelineInputs, config: &ProcessingConfig) -> Processed {
    let normalized_raw = normalize_set(&inputs.raw, config.zero_variance);
    let normalized_background = normalize_set(&inputs.background, config.zero_variance);
    if let Some((key, Some(sample))) = normalized_raw.iter().next() {
        debug!("Normalized raw data sample {key}: {sample:?}");
    }
    if let Some((key, Some(sample))) = normalized_background.iter().next() {
        debug!("Normalized background data sample {key}: {sample:?}");
    }

    let available = available_indices(&inputs.metadata, &inputs.raw);
    let sensors = sensors_in(&inputs.metadata, &inputs.raw);
    info!(
        "Filtered metadata: {} of {} rows describe loaded scans ({} sensors)",
        available.len(),
        inputs.metadata.len(),
        sensors.len()
    );

    let (aligned, mut notices) =
        align_sensors(&sensors, &normalized_raw, config.scans_per_sensor);
    info!(
        "Aligned raw data keys: {:?}",
        aligned.iter().map(|a| a.sensor.as_str()).collect::<Vec<_>>()
    );

    let (subtracted, subtract_notices) = subtract_backgrounds(&aligned, &normalized_background);
    notices.extend(subtract_notices);
    info!(
        "Background subtracted data keys: {:?}",
        subtracted.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>()
    );

    let sensors = aggregate(subtracted);
    info!("Aggregated {} sensors", sensors.len());

    Processed { sensors, notices }
}

/// Load, process and write according to `config`.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    let inputs = load_inputs(config)?;
    let processed = process(&inputs, &config.processing);
    let output = write_flattened_csv(&config.output_path, &processed.sensors)?;
    Ok(PipelineReport { processed, output })
}
