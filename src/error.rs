//! Error types for loading, writing and running the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading metadata or scan files.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid scan '{key}': {reason}")]
    InvalidScan { key: String, reason: String },

    #[error("Malformed file: {0}")]
    Malformed(String),
}

/// Errors that can occur while writing output files.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write error for '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("IO error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON write error for '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Parquet write error for '{path}': {source}")]
    Parquet {
        path: String,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("Arrow error for '{path}': {source}")]
    Arrow {
        path: String,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("Unsupported file extension: .{0}")]
    UnsupportedExtension(String),
}

/// Conditions that stop a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to load config '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("failed to load metadata from '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("failed to load raw data from '{path}': {source}")]
    RawLoad {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("failed to load background data from '{path}': {source}")]
    BackgroundLoad {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}
