//! Structured dataset output: variable files, mesh and bathymetry files,
//! and the descriptor.
//!
//! The descriptor is removed before anything else is written and stored
//! last, so an interrupted run leaves a tree without `settings.json`, which
//! readers reject.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mesh_common::TimeCoordinate;
use tracing::{debug, info};
use zarrs_filesystem::FilesystemStore;

use crate::bathymetry::BathymetryMask;
use crate::descriptor::{
    variable_file_name, Descriptor, DimensionMap, FileGranularity, GridSettings, OceanSettings,
    TimeSettings, BATHYMETRY_MESH_FILE, DEPTH_VAR, DESCRIPTOR_FILE, LAT_VAR, LON_VAR, MBATHY_VAR,
    MODEL_NAME, OCEAN_MESH_FILE, TIME_VAR,
};
use crate::error::{GridProcessorError, Result};
use crate::grid::TargetGrid;
use crate::types::RegriddedField;
use crate::writer::zarr_writer::{ArraySpec, ZarrWriter};

/// Naming of one output variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableLayout {
    /// Descriptor key, e.g. `U`.
    pub key: String,
    /// On-disk array name, e.g. `vozocrtx`.
    pub name: String,
    /// File-name prefix, e.g. `U`.
    pub prefix: String,
}

impl VariableLayout {
    pub fn new(key: impl Into<String>, name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            prefix: prefix.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetVariable {
    pub layout: VariableLayout,
    pub field: RegriddedField,
}

/// Everything written for one run.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub grid: TargetGrid,
    pub bathymetry: BathymetryMask,
    pub time: TimeCoordinate,
    pub variables: Vec<DatasetVariable>,
}

impl Dataset {
    /// Check shapes and names before anything touches the disk.
    pub fn validate(&self) -> Result<()> {
        let (ny, nx) = (self.grid.ny(), self.grid.nx());
        if self.time.is_empty() {
            return Err(GridProcessorError::empty_domain("dataset has no time steps"));
        }
        if self.variables.is_empty() {
            return Err(GridProcessorError::ConfigError(
                "dataset has no variables".to_string(),
            ));
        }
        if (self.bathymetry.ny, self.bathymetry.nx) != (ny, nx) {
            return Err(GridProcessorError::invalid_metadata(format!(
                "bathymetry is {}x{}, grid is {}x{}",
                self.bathymetry.ny, self.bathymetry.nx, ny, nx
            )));
        }

        let mut keys = BTreeMap::new();
        let mut names = BTreeMap::new();
        for var in &self.variables {
            let shape = var.field.shape();
            if shape != (self.time.len(), ny, nx) {
                return Err(GridProcessorError::invalid_metadata(format!(
                    "{} has shape {:?}, expected {:?}",
                    var.layout.key,
                    shape,
                    (self.time.len(), ny, nx)
                )));
            }
            if keys.insert(var.layout.key.as_str(), ()).is_some() {
                return Err(GridProcessorError::ConfigError(format!(
                    "duplicate variable key {}",
                    var.layout.key
                )));
            }
            if names.insert(var.layout.name.as_str(), ()).is_some() {
                return Err(GridProcessorError::ConfigError(format!(
                    "duplicate on-disk name {}",
                    var.layout.name
                )));
            }
        }
        Ok(())
    }
}

/// Writer options that end up in the descriptor.
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    pub granularity: FileGranularity,
    pub allow_time_extrapolation: bool,
    pub fill_value: f32,
}

/// Summary of a completed write.
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub descriptor: PathBuf,
    pub files: Vec<PathBuf>,
    pub bytes_written: u64,
}

/// Persists a [`Dataset`] as Zarr groups plus `settings.json`.
pub struct StructuredDatasetWriter {
    zarr: ZarrWriter,
    options: WriterOptions,
}

impl StructuredDatasetWriter {
    pub fn new(zarr: ZarrWriter, options: WriterOptions) -> Self {
        Self { zarr, options }
    }

    pub fn write(&self, dataset: &Dataset, output_dir: &Path) -> Result<WriteReport> {
        dataset.validate()?;
        std::fs::create_dir_all(output_dir)?;

        let descriptor_path = output_dir.join(DESCRIPTOR_FILE);
        if descriptor_path.exists() {
            debug!(path = %descriptor_path.display(), "Removing previous descriptor");
            std::fs::remove_file(&descriptor_path)?;
        }

        let mut files = Vec::new();
        let mut bytes_written = 0;

        let mesh_path = output_dir.join(OCEAN_MESH_FILE);
        bytes_written += self.write_mesh(&dataset.grid, &mesh_path)?;
        files.push(mesh_path);

        let bathy_path = output_dir.join(BATHYMETRY_MESH_FILE);
        bytes_written += self.write_bathymetry(&dataset.grid, &dataset.bathymetry, &bathy_path)?;
        files.push(bathy_path);

        let groups = self.time_groups(&dataset.time)?;
        let mut var_files: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for var in &dataset.variables {
            let mut names = Vec::with_capacity(groups.len());
            for (suffix, range) in &groups {
                let file_name = variable_file_name(&var.layout.prefix, suffix);
                let path = output_dir.join(&file_name);
                bytes_written += self.write_variable(dataset, var, range.clone(), &path)?;
                files.push(path);
                names.push(file_name);
            }
            var_files.insert(var.layout.key.clone(), names);
        }

        let descriptor = self.descriptor(dataset, output_dir, var_files);
        descriptor.save(output_dir)?;

        info!(
            dir = %output_dir.display(),
            variables = dataset.variables.len(),
            steps = dataset.time.len(),
            files = files.len(),
            bytes = bytes_written,
            "Wrote structured dataset"
        );

        Ok(WriteReport {
            descriptor: descriptor_path,
            files,
            bytes_written,
        })
    }

    /// Split time indices into contiguous per-file ranges.
    fn time_groups(&self, time: &TimeCoordinate) -> Result<Vec<(String, Range<usize>)>> {
        let mut groups: Vec<(String, Range<usize>)> = Vec::new();
        for i in 0..time.len() {
            let suffix = self.options.granularity.suffix(time.datetime(i)?);
            match groups.last_mut() {
                Some((last, range)) if *last == suffix => range.end = i + 1,
                _ => groups.push((suffix, i..i + 1)),
            }
        }
        Ok(groups)
    }

    fn write_coords(
        &self,
        store: &Arc<FilesystemStore>,
        grid: &TargetGrid,
        names: [&str; 2],
    ) -> Result<u64> {
        let (lon2d, lat2d) = grid.meshgrid();
        let shape = [grid.ny(), grid.nx()];
        let dims = ["y", "x"];

        let mut bytes = self.zarr.write_array(
            store,
            ArraySpec::new(names[0], &dims, &shape)
                .attr("standard_name", "longitude")
                .attr("units", "degrees_east"),
            &lon2d,
        )?;
        bytes += self.zarr.write_array(
            store,
            ArraySpec::new(names[1], &dims, &shape)
                .attr("standard_name", "latitude")
                .attr("units", "degrees_north"),
            &lat2d,
        )?;
        Ok(bytes)
    }

    fn write_mesh(&self, grid: &TargetGrid, path: &Path) -> Result<u64> {
        let store = self.zarr.create_store(path)?;
        let mut attrs = serde_json::Map::new();
        attrs.insert("resolution".to_string(), serde_json::json!(grid.resolution()));
        self.zarr.write_group(&store, attrs)?;

        let mut bytes = self.write_coords(&store, grid, [LON_VAR, LAT_VAR])?;
        // Corner-point names expected by NEMO-style readers; same lattice.
        bytes += self.write_coords(&store, grid, ["glamf", "gphif"])?;
        Ok(bytes)
    }

    fn write_bathymetry(&self, grid: &TargetGrid, mask: &BathymetryMask, path: &Path) -> Result<u64> {
        let store = self.zarr.create_store(path)?;
        self.zarr.write_group(&store, serde_json::Map::new())?;

        let shape = [grid.ny(), grid.nx()];
        let dims = ["y", "x"];
        let mut bytes = self.zarr.write_array(
            &store,
            ArraySpec::new(MBATHY_VAR, &dims, &shape)
                .attr("long_name", "number of wet levels"),
            &mask.mbathy,
        )?;
        bytes += self.zarr.write_array(
            &store,
            ArraySpec::new(DEPTH_VAR, &dims, &shape)
                .attr("long_name", "interpolated depth")
                .attr("units", "m"),
            &mask.depth,
        )?;
        bytes += self.write_coords(&store, grid, [LON_VAR, LAT_VAR])?;
        Ok(bytes)
    }

    fn write_variable(
        &self,
        dataset: &Dataset,
        var: &DatasetVariable,
        range: Range<usize>,
        path: &Path,
    ) -> Result<u64> {
        let store = self.zarr.create_store(path)?;
        let mut attrs = serde_json::Map::new();
        attrs.insert("variable".to_string(), serde_json::json!(var.layout.key));
        self.zarr.write_group(&store, attrs)?;

        let (ny, nx) = (dataset.grid.ny(), dataset.grid.nx());
        let slice = ny * nx;
        let data = &var.field.data()[range.start * slice..range.end * slice];
        let shape = [range.len(), ny, nx];

        let mut spec = ArraySpec::new(&var.layout.name, &[TIME_VAR, "y", "x"], &shape);
        if self.options.fill_value.is_finite() {
            spec = spec.attr("missing_value", self.options.fill_value);
        }
        let mut bytes = self.zarr.write_array(&store, spec, data)?;

        let time_shape = [range.len()];
        bytes += self.zarr.write_array(
            &store,
            ArraySpec::new(TIME_VAR, &[TIME_VAR], &time_shape)
                .attr("units", dataset.time.units())
                .attr("calendar", dataset.time.calendar())
                .attr("long_name", "time")
                .attr("standard_name", "time")
                .attr("axis", "T"),
            &dataset.time.values()[range.clone()],
        )?;
        bytes += self.write_coords(&store, &dataset.grid, [LON_VAR, LAT_VAR])?;

        debug!(
            variable = %var.layout.key,
            file = %path.display(),
            steps = range.len(),
            "Wrote variable file"
        );
        Ok(bytes)
    }

    fn descriptor(
        &self,
        dataset: &Dataset,
        output_dir: &Path,
        files: BTreeMap<String, Vec<String>>,
    ) -> Descriptor {
        let directory = output_dir
            .canonicalize()
            .unwrap_or_else(|_| output_dir.to_path_buf());
        let mut directory = directory.display().to_string();
        if !directory.ends_with('/') {
            directory.push('/');
        }

        let variables = dataset
            .variables
            .iter()
            .map(|v| (v.layout.key.clone(), v.layout.name.clone()))
            .collect();
        let dimensions = dataset
            .variables
            .iter()
            .map(|v| (v.layout.key.clone(), DimensionMap::gridded()))
            .collect();

        let extent = dataset.grid.extent();
        let fill = self.options.fill_value;

        Descriptor {
            use_3d: false,
            allow_time_extrapolation: self.options.allow_time_extrapolation,
            verbose_delete: false,
            use_mixing: false,
            use_biofouling: false,
            use_stokes: false,
            use_wind: false,
            ocean: OceanSettings {
                modelname: MODEL_NAME.to_string(),
                directory,
                filename_style: self.options.granularity.filename_style().to_string(),
                ocean_mesh: OCEAN_MESH_FILE.to_string(),
                bathymetry_mesh: BATHYMETRY_MESH_FILE.to_string(),
                variables,
                dimensions,
                indices: BTreeMap::new(),
                bathymetry_variables: BTreeMap::from([(
                    "bathymetry".to_string(),
                    MBATHY_VAR.to_string(),
                )]),
                bathymetry_dimensions: DimensionMap::static_2d(),
                format: "zarr".to_string(),
                granularity: self.options.granularity,
                files,
                time: TimeSettings {
                    variable: TIME_VAR.to_string(),
                    units: dataset.time.units().to_string(),
                    calendar: dataset.time.calendar().to_string(),
                    steps: dataset.time.len(),
                },
                grid: GridSettings {
                    nx: dataset.grid.nx(),
                    ny: dataset.grid.ny(),
                    resolution: dataset.grid.resolution(),
                    lon_min: extent.min_lon,
                    lon_max: extent.max_lon,
                    lat_min: extent.min_lat,
                    lat_max: extent.max_lat,
                },
                fill_value: fill.is_finite().then_some(fill),
            },
        }
    }
}
