//! Error types for the ingestion crate.

use grid_processor::GridProcessorError;
use netcdf_parser::error::NetCdfError;
use thiserror::Error;

/// Errors that can occur during snapshot reading, assembly or conversion.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// A snapshot is malformed or lacks a requested variable.
    #[error("malformed snapshot {snapshot}: {reason}")]
    SourceFormat { snapshot: String, reason: String },

    /// No valid nodes, or the spatial window misses them all.
    #[error("empty domain: {0}")]
    EmptyDomain(String),

    /// Source times that would make the assembled axis non-monotonic.
    #[error("time index conflict in {snapshot}: {reason}")]
    TimeIndexConflict { snapshot: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Grid(#[from] GridProcessorError),

    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IngestionError {
    pub fn source_format(snapshot: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceFormat {
            snapshot: snapshot.into(),
            reason: reason.to_string(),
        }
    }

    pub fn time_conflict(snapshot: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TimeIndexConflict {
            snapshot: snapshot.into(),
            reason: reason.into(),
        }
    }

    /// Attribute a NetCDF failure to the snapshot it came from.
    pub fn netcdf(snapshot: impl Into<String>, err: NetCdfError) -> Self {
        Self::source_format(snapshot, err)
    }

    /// Lift grid-level empty-domain failures to the run-level variant.
    pub fn from_grid(err: GridProcessorError) -> Self {
        match err {
            GridProcessorError::EmptyDomain(msg) => Self::EmptyDomain(msg),
            other => Self::Grid(other),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
