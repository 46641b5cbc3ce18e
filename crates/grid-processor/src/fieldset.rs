//! Read-back view of a written dataset, shaped like the transport engine's
//! fieldset: grid extents, the time coordinate, and point sampling
//! `field[time, depth, lat, lon]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mesh_common::{BoundingBox, TimeCoordinate};
use tracing::info;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::descriptor::{Descriptor, LAT_VAR, LON_VAR, MBATHY_VAR, TIME_VAR};
use crate::error::{GridProcessorError, Result};
use crate::grid::TargetGrid;
use crate::types::RegriddedField;
use crate::writer::GridElement;

/// Array contents with shape and attributes.
pub struct StoredArray<T> {
    pub data: Vec<T>,
    pub shape: Vec<u64>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

fn open_store(path: &Path) -> Result<Arc<FilesystemStore>> {
    if !path.is_dir() {
        return Err(GridProcessorError::storage_error(format!(
            "missing dataset file {}",
            path.display()
        )));
    }
    let store =
        FilesystemStore::new(path).map_err(|e| GridProcessorError::storage_error(e.to_string()))?;
    Ok(Arc::new(store))
}

/// Read a whole array from a group store.
pub fn read_array<T: GridElement>(store: &Arc<FilesystemStore>, name: &str) -> Result<StoredArray<T>> {
    let array = Array::open(store.clone(), &format!("/{}", name))
        .map_err(|e| GridProcessorError::zarr_error(format!("{}: {}", name, e)))?;

    let shape = array.shape().to_vec();
    let subset = ArraySubset::new_with_shape(shape.clone());
    let data: Vec<T> = array
        .retrieve_array_subset_elements(&subset)
        .map_err(|e| GridProcessorError::zarr_error(format!("{}: {}", name, e)))?;

    Ok(StoredArray {
        data,
        shape,
        attributes: array.attributes().clone(),
    })
}

fn attr_str<'a>(attrs: &'a serde_json::Map<String, serde_json::Value>, key: &str) -> Result<&'a str> {
    attrs
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GridProcessorError::invalid_metadata(format!("missing attribute {}", key)))
}

/// A structured dataset loaded from its descriptor and files.
#[derive(Debug)]
pub struct Fieldset {
    dir: PathBuf,
    descriptor: Descriptor,
    grid: TargetGrid,
    time: TimeCoordinate,
    fields: BTreeMap<String, RegriddedField>,
    mbathy: Vec<i32>,
}

impl Fieldset {
    /// Load every variable listed in the descriptor of `dir`.
    ///
    /// Files are resolved relative to `dir`, not to the descriptor's
    /// `directory` entry, so datasets can be moved.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let descriptor = Descriptor::load(&dir)?;
        descriptor.validate()?;
        let ocean = &descriptor.ocean;

        let mesh = open_store(&dir.join(&ocean.ocean_mesh))?;
        let grid = read_grid(&mesh, ocean.grid.resolution)?;
        let (ny, nx) = (grid.ny(), grid.nx());

        let bathy = open_store(&dir.join(&ocean.bathymetry_mesh))?;
        let mbathy_name = ocean
            .bathymetry_variables
            .get("bathymetry")
            .map(String::as_str)
            .unwrap_or(MBATHY_VAR);
        let mbathy = read_array::<i32>(&bathy, mbathy_name)?;
        if mbathy.shape != [ny as u64, nx as u64] {
            return Err(GridProcessorError::invalid_metadata(format!(
                "{} has shape {:?}, grid is {}x{}",
                mbathy_name, mbathy.shape, ny, nx
            )));
        }

        let mut time: Option<TimeCoordinate> = None;
        let mut fields = BTreeMap::new();

        for (key, name) in &ocean.variables {
            let mut data = Vec::new();
            let mut values = Vec::new();
            let mut units = None;
            let mut calendar = None;

            for file in &ocean.files[key] {
                let store = open_store(&dir.join(file))?;
                let var = read_array::<f32>(&store, name)?;
                let t = read_array::<f64>(&store, TIME_VAR)?;

                if var.shape.len() != 3
                    || var.shape[1..] != [ny as u64, nx as u64]
                    || var.shape[0] != t.shape[0]
                {
                    return Err(GridProcessorError::invalid_metadata(format!(
                        "{} in {} has shape {:?}, time has {:?}",
                        name, file, var.shape, t.shape
                    )));
                }

                units.get_or_insert(attr_str(&t.attributes, "units")?.to_string());
                calendar.get_or_insert(attr_str(&t.attributes, "calendar")?.to_string());
                data.extend(var.data);
                values.extend(t.data);
            }

            let coord = TimeCoordinate::new(
                values,
                units.unwrap_or_default(),
                calendar.unwrap_or_default(),
            )?;
            match &time {
                None => time = Some(coord),
                Some(existing) if *existing == coord => {}
                Some(_) => {
                    return Err(GridProcessorError::invalid_metadata(format!(
                        "time axis of {} differs from the other variables",
                        key
                    )))
                }
            }

            fields.insert(key.clone(), RegriddedField::from_data(key.clone(), ny, nx, data)?);
        }

        let time = time.ok_or_else(|| GridProcessorError::invalid_metadata("no variables"))?;
        if time.is_empty() {
            return Err(GridProcessorError::invalid_metadata("dataset has no time steps"));
        }

        info!(
            dir = %dir.display(),
            variables = fields.len(),
            steps = time.len(),
            nx = nx,
            ny = ny,
            "Opened fieldset"
        );

        Ok(Self {
            dir,
            descriptor,
            grid,
            time,
            fields,
            mbathy: mbathy.data,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn grid(&self) -> &TargetGrid {
        &self.grid
    }

    /// Bounds of the grid points.
    pub fn extent(&self) -> BoundingBox {
        self.grid.extent()
    }

    pub fn lons(&self) -> &[f64] {
        self.grid.lons()
    }

    pub fn lats(&self) -> &[f64] {
        self.grid.lats()
    }

    pub fn time(&self) -> &TimeCoordinate {
        &self.time
    }

    pub fn time_units(&self) -> &str {
        self.time.units()
    }

    /// `(time, y, x)` shape shared by every variable.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.time.len(), self.grid.ny(), self.grid.nx())
    }

    /// Variable keys, sorted.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn mbathy(&self) -> &[i32] {
        &self.mbathy
    }

    pub fn allow_time_extrapolation(&self) -> bool {
        self.descriptor.allow_time_extrapolation
    }

    /// Resolve a time index, clamping past the ends only when extrapolation
    /// is allowed.
    pub fn time_index(&self, t: usize) -> Result<usize> {
        let last = self.time.len() - 1;
        if t <= last {
            Ok(t)
        } else if self.allow_time_extrapolation() {
            Ok(last)
        } else {
            Err(GridProcessorError::out_of_range(
                format!("time index {}", t),
                format!("0..={}", last),
            ))
        }
    }

    /// Point sample `field[t, depth, y, x]`. Only depth index 0 exists.
    pub fn sample(&self, key: &str, t: usize, depth: usize, y: usize, x: usize) -> Result<f32> {
        let field = self.field(key)?;
        if depth != 0 {
            return Err(GridProcessorError::out_of_range(
                format!("depth index {}", depth),
                "surface layer 0",
            ));
        }
        let t = self.time_index(t)?;
        field.get(t, y, x).ok_or_else(|| {
            GridProcessorError::out_of_range(
                format!("cell ({}, {})", y, x),
                format!("{}x{} grid", self.grid.ny(), self.grid.nx()),
            )
        })
    }

    /// Linear-in-time sample at an encoded time value.
    pub fn sample_at(&self, key: &str, time: f64, y: usize, x: usize) -> Result<f32> {
        let values = self.time.values();
        let (first, last) = (values[0], values[values.len() - 1]);

        if !time.is_finite() {
            return Err(GridProcessorError::out_of_range(
                format!("time {}", time),
                format!("[{}, {}] {}", first, last, self.time.units()),
            ));
        }
        if time < first || time > last {
            if !self.allow_time_extrapolation() {
                return Err(GridProcessorError::out_of_range(
                    format!("time {}", time),
                    format!("[{}, {}] {}", first, last, self.time.units()),
                ));
            }
            let t = if time < first { 0 } else { values.len() - 1 };
            return self.sample(key, t, 0, y, x);
        }

        let upper = values.partition_point(|&v| v < time);
        if values[upper] == time {
            return self.sample(key, upper, 0, y, x);
        }
        let lower = upper - 1;
        let w = (time - values[lower]) / (values[upper] - values[lower]);
        let a = self.sample(key, lower, 0, y, x)? as f64;
        let b = self.sample(key, upper, 0, y, x)? as f64;
        Ok((a + (b - a) * w) as f32)
    }

    fn field(&self, key: &str) -> Result<&RegriddedField> {
        self.fields.get(key).ok_or_else(|| {
            GridProcessorError::invalid_metadata(format!("unknown variable {}", key))
        })
    }
}

fn read_grid(mesh: &Arc<FilesystemStore>, resolution: f64) -> Result<TargetGrid> {
    let lon = read_array::<f64>(mesh, LON_VAR)?;
    let lat = read_array::<f64>(mesh, LAT_VAR)?;
    let [ny, nx] = <[u64; 2]>::try_from(lon.shape.as_slice())
        .map_err(|_| GridProcessorError::invalid_metadata("nav_lon must be 2-D"))?;
    if lat.shape != lon.shape {
        return Err(GridProcessorError::invalid_metadata(
            "nav_lon and nav_lat shapes differ",
        ));
    }
    let (ny, nx) = (ny as usize, nx as usize);

    let lons = lon.data[..nx].to_vec();
    let lats = (0..ny).map(|y| lat.data[y * nx]).collect();
    TargetGrid::from_coords(lons, lats, resolution)
}
