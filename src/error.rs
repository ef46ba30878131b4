//! Error handling for station code generation.
//!
//! Two layers: `CoderError` aborts a whole run (registry unreachable,
//! unreadable import file, failed export), while `RecordError` is scoped
//! to a single station record and is reported alongside it.

use crate::models::GridCell;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Station file not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Station registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    #[error("Invalid station file: {path} - {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("No station records to export")]
    EmptyBatch,

    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },
}

impl CoderError {
    pub fn registry_unavailable(reason: impl Into<String>) -> Self {
        Self::RegistryUnavailable {
            reason: reason.into(),
        }
    }

    pub fn invalid_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }
}

/// Failures that reject a single station record without stopping the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("Invalid coordinate in field {field}: '{value}'")]
    InvalidCoordinate { field: String, value: String },

    #[error("Coordinate out of range: latitude {latitude}, longitude {longitude}")]
    OutOfRangeCoordinate { latitude: f64, longitude: f64 },

    #[error("Grid cell {cell} has no free sequential number left")]
    GridCellExhausted { cell: GridCell },
}

impl RecordError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
        }
    }

    pub fn invalid_coordinate(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            field: field.into(),
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoderError>;
