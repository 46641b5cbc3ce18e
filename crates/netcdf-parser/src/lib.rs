//! NetCDF reader for unstructured SCHISM model output.
//!
//! SCHISM writes one `out2d_<n>.nc` file per output stack. Each holds the
//! horizontal grid as node coordinate arrays along `nSCHISM_hgrid_node`,
//! the node depth, and per-node fields shaped `[node]` or `[time, node]`.
//!
//! # Implementation Notes
//!
//! Files are read through the native `netcdf` crate (libnetcdf + HDF5).
//! A [`SchismFile`] owns its handle and closes it on drop, so every exit
//! path releases the descriptor.

pub mod error;
pub mod native;
pub mod schism;

pub use error::{NetCdfError, NetCdfResult};
pub use native::silence_hdf5_errors;
pub use schism::{NodeVariable, SchismFile, SchismLayout, SchismMesh, TimeValues};
