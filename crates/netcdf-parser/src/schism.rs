//! SCHISM `out2d` file access.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{get_str_attr, read_f64_values, Packing};

/// Variable and dimension names of a SCHISM horizontal-grid file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchismLayout {
    pub node_dim: String,
    pub lon_var: String,
    pub lat_var: String,
    pub depth_var: String,
    pub time_var: String,
}

impl Default for SchismLayout {
    fn default() -> Self {
        Self {
            node_dim: "nSCHISM_hgrid_node".to_string(),
            lon_var: "SCHISM_hgrid_node_x".to_string(),
            lat_var: "SCHISM_hgrid_node_y".to_string(),
            depth_var: "depth".to_string(),
            time_var: "time".to_string(),
        }
    }
}

/// Node coordinates and depth as stored in the file.
#[derive(Debug, Clone)]
pub struct SchismMesh {
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    pub depths: Vec<f64>,
}

/// One per-node variable split into time instants.
#[derive(Debug, Clone)]
pub struct NodeVariable {
    pub name: String,
    /// One vector of node values per instant, in file order.
    pub instants: Vec<Vec<f64>>,
}

/// Source time values of a file with their declared units.
#[derive(Debug, Clone)]
pub struct TimeValues {
    pub values: Vec<f64>,
    pub units: Option<String>,
}

/// An open SCHISM output file.
///
/// The underlying handle is released when this value is dropped.
pub struct SchismFile {
    path: PathBuf,
    file: netcdf::File,
    layout: SchismLayout,
    node_count: usize,
}

impl SchismFile {
    /// Open a file with the default SCHISM layout.
    pub fn open(path: impl AsRef<Path>) -> NetCdfResult<Self> {
        Self::open_with_layout(path, SchismLayout::default())
    }

    pub fn open_with_layout(path: impl AsRef<Path>, layout: SchismLayout) -> NetCdfResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path).map_err(|e| NetCdfError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let node_count = file
            .dimension(&layout.node_dim)
            .ok_or_else(|| NetCdfError::MissingData(format!("dimension {}", layout.node_dim)))?
            .len();

        debug!(path = %path.display(), nodes = node_count, "Opened SCHISM file");

        Ok(Self {
            path,
            file,
            layout,
            node_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }

    /// Read node longitude, latitude and depth.
    pub fn read_mesh(&self) -> NetCdfResult<SchismMesh> {
        let lons = self.read_node_array(&self.layout.lon_var)?;
        let lats = self.read_node_array(&self.layout.lat_var)?;
        let depths = self.read_node_array(&self.layout.depth_var)?;
        Ok(SchismMesh { lons, lats, depths })
    }

    /// Read a per-node variable.
    ///
    /// `[node]` gives one instant; `[time, node]` gives one instant per
    /// time entry, so a leading axis of length 1 is squeezed away.
    pub fn read_variable(&self, name: &str) -> NetCdfResult<NodeVariable> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| NetCdfError::MissingData(format!("variable {}", name)))?;

        let dims: Vec<(String, usize)> = var
            .dimensions()
            .iter()
            .map(|d| (d.name(), d.len()))
            .collect();

        let instants = match dims.as_slice() {
            [(node, _)] if *node == self.layout.node_dim => 1,
            [(_, nt), (node, _)] if *node == self.layout.node_dim => *nt,
            _ => {
                return Err(NetCdfError::InvalidFormat(format!(
                    "variable {} has dimensions {:?}, expected [{}] or [time, {}]",
                    name, dims, self.layout.node_dim, self.layout.node_dim
                )))
            }
        };

        let mut values = read_f64_values(&var)?;
        Packing::of(&var).decode(&mut values);

        let expected = instants * self.node_count;
        if values.len() != expected {
            return Err(NetCdfError::InvalidFormat(format!(
                "variable {} holds {} values, expected {}",
                name,
                values.len(),
                expected
            )));
        }

        let instants = if self.node_count == 0 {
            vec![Vec::new(); instants]
        } else {
            values
                .chunks(self.node_count)
                .map(|chunk| chunk.to_vec())
                .collect()
        };

        Ok(NodeVariable {
            name: name.to_string(),
            instants,
        })
    }

    /// Read the time variable, if the file has one.
    pub fn read_time(&self) -> NetCdfResult<Option<TimeValues>> {
        let Some(var) = self.file.variable(&self.layout.time_var) else {
            return Ok(None);
        };

        let mut values = read_f64_values(&var)?;
        Packing::of(&var).decode(&mut values);

        Ok(Some(TimeValues {
            values,
            units: get_str_attr(&var, "units"),
        }))
    }

    fn read_node_array(&self, name: &str) -> NetCdfResult<Vec<f64>> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| NetCdfError::MissingData(format!("variable {}", name)))?;

        let mut values = read_f64_values(&var)?;
        if values.len() != self.node_count {
            return Err(NetCdfError::InvalidFormat(format!(
                "{} holds {} values for {} nodes",
                name,
                values.len(),
                self.node_count
            )));
        }
        Packing::of(&var).decode(&mut values);
        Ok(values)
    }
}
