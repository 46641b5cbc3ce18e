//! SCHISM snapshot ingestion and time-series assembly.
//!
//! Provides the conversion of unstructured SCHISM output into a regularly
//! gridded structured dataset.
//!
//! # Architecture
//!
//! - [`SnapshotSource`]: one `out2d_*.nc` file or an in-memory snapshot
//! - [`TimeSeriesAssembler`]: regrids every snapshot onto one grid and
//!   stacks the slices in input order
//! - [`ConversionPipeline`]: grid, bathymetry, assembly and output for one
//!   set of [`PipelineOptions`]

pub mod assembler;
pub mod config;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod snapshot;

// Re-exports
pub use assembler::{Assembly, SkippedSnapshot, Strictness, TimeSeriesAssembler};
pub use config::{default_variables, validate_variables, VariableSource, VariableSpec};
pub use error::{IngestionError, Result};
pub use metadata::{detect_file_type, natural_cmp, sort_snapshots, stack_number, FileType};
pub use pipeline::{ConversionPipeline, ConversionReport, PipelineOptions};
pub use snapshot::{MemorySnapshot, NetCdfSnapshot, Snapshot, SnapshotInstant, SnapshotSource};
