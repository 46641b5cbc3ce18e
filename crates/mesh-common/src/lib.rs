//! Common types shared by the mesh readers, the regridder and the dataset writer.

pub mod bbox;
pub mod error;
pub mod node;
pub mod time;

pub use bbox::{AxisBounds, BoundingBox};
pub use error::{MeshError, MeshResult};
pub use node::{FieldSample, NodeCloud, NodeSelection};
pub use time::{TimeAxis, TimeCoordinate, TimeEncoding, DEFAULT_CALENDAR};
