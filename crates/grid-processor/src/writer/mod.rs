//! Zarr output for assembled datasets.
//!
//! [`ZarrWriter`] handles single groups and arrays; [`StructuredDatasetWriter`]
//! lays out the variable, mesh and bathymetry files and the descriptor.

mod dataset;
mod zarr_writer;

pub use dataset::{
    Dataset, DatasetVariable, StructuredDatasetWriter, VariableLayout, WriteReport, WriterOptions,
};
pub use zarr_writer::{ArraySpec, GridElement, ZarrWriter, DIMENSIONS_ATTR};
