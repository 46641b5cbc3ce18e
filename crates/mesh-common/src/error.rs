//! Error types for the shared data model.

use thiserror::Error;

/// Result type alias using MeshError.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors raised while constructing or validating shared model values.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("{field} has {actual} values, expected {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Time coordinate not strictly increasing at index {index}: {previous} -> {value}")]
    NonMonotonicTime { index: usize, previous: f64, value: f64 },

    #[error("Invalid time units: {0}")]
    InvalidTimeUnits(String),

    #[error("Time index {index} out of range for {len} steps")]
    TimeIndexOutOfRange { index: usize, len: usize },
}

impl MeshError {
    pub fn length_mismatch(field: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }
}
