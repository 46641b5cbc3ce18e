//! Error types for grid processing.

use mesh_common::MeshError;
use thiserror::Error;

/// Errors that can occur while building grids, regridding or writing datasets.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Malformed spatial window or resolution.
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    /// No usable nodes, or the window misses the node cloud entirely.
    #[error("empty domain: {0}")]
    EmptyDomain(String),

    /// A requested index or time lies outside what the dataset holds.
    #[error("requested {requested} is outside {available}")]
    OutOfRange {
        requested: String,
        available: String,
    },

    /// Invalid metadata in a dataset file or descriptor.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    ZarrError(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid shared model value.
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

impl GridProcessorError {
    pub fn invalid_bounds(msg: impl Into<String>) -> Self {
        Self::InvalidBounds(msg.into())
    }

    pub fn empty_domain(msg: impl Into<String>) -> Self {
        Self::EmptyDomain(msg.into())
    }

    pub fn out_of_range(requested: impl Into<String>, available: impl Into<String>) -> Self {
        Self::OutOfRange {
            requested: requested.into(),
            available: available.into(),
        }
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn zarr_error(msg: impl Into<String>) -> Self {
        Self::ZarrError(msg.into())
    }

    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for GridProcessorError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
