//! Regular-grid construction, scattered-node regridding and structured
//! dataset output.
//!
//! # Architecture
//!
//! ```text
//! NodeCloud ──► GridBuilder::build ──► GridPlan { TargetGrid, NodeSelection }
//!                                          │
//!      FieldSample ──► FieldRegridder ─────┤   (per variable, per time step)
//!                                          │
//!      node depth ──► BathymetryRasterizer ┤   (once)
//!                                          ▼
//!                              StructuredDatasetWriter
//!                                          │
//!                       Zarr groups + settings.json descriptor
//!                                          │
//!                                          ▼
//!                              Fieldset::open (read-back)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{FieldRegridder, FillPolicy, GridBuilder};
//!
//! let plan = GridBuilder::new(0.01).build(&cloud)?;
//! let cloud = cloud.subset(&plan.selection)?;
//! let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
//! let outcome = regridder.regrid(&sample.subset(&plan.selection)?)?;
//! ```

pub mod bathymetry;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fieldset;
pub mod grid;
pub mod regrid;
pub mod triangulation;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use bathymetry::{BathymetryMask, BathymetryRasterizer, MaskRule};
pub use config::{GridProcessorConfig, ZarrCompression};
pub use descriptor::{Descriptor, FileGranularity};
pub use error::{GridProcessorError, Result};
pub use fieldset::Fieldset;
pub use grid::{AxisRange, GridBuilder, GridPlan, TargetGrid};
pub use regrid::{regrid, FieldRegridder, FillPolicy, RegridOutcome};
pub use triangulation::InterpolationWeights;
pub use types::{NoValidDataWarning, RegriddedField};
pub use writer::{
    Dataset, DatasetVariable, StructuredDatasetWriter, VariableLayout, WriteReport, WriterOptions,
    ZarrWriter,
};
