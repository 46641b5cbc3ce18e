//! The SCHISM-to-structured-grid conversion pipeline.
//!
//! One configurable pipeline covers every conversion variant: the options
//! choose resolution, window, file granularity, fill policy, strictness and
//! time encoding.

use std::path::{Path, PathBuf};

use grid_processor::{
    BathymetryRasterizer, Dataset, DatasetVariable, FieldRegridder, FileGranularity, FillPolicy,
    GridBuilder, GridProcessorConfig, MaskRule, NoValidDataWarning, StructuredDatasetWriter,
    WriterOptions, ZarrWriter,
};
use mesh_common::{AxisBounds, NodeCloud, TimeAxis};
use netcdf_parser::SchismLayout;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assembler::{SkippedSnapshot, Strictness, TimeSeriesAssembler};
use crate::config::{default_variables, validate_variables, VariableSpec};
use crate::error::{IngestionError, Result};
use crate::snapshot::{NetCdfSnapshot, SnapshotSource};

/// Options of one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Grid step in degrees.
    pub resolution: f64,
    pub lon_bounds: Option<AxisBounds>,
    pub lat_bounds: Option<AxisBounds>,
    pub fill_policy: FillPolicy,
    pub strictness: Strictness,
    pub granularity: FileGranularity,
    pub time_axis: TimeAxis,
    pub variables: Vec<VariableSpec>,
    pub mask_rule: MaskRule,
    pub allow_time_extrapolation: bool,
    /// Regrid the jobs of each snapshot in parallel.
    pub parallel: bool,
    /// Refuse grids with more points than this. Point count grows with the
    /// inverse square of the resolution; halving it quadruples the grid.
    pub max_grid_points: Option<usize>,
    pub zarr: GridProcessorConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            resolution: 0.01,
            lon_bounds: None,
            lat_bounds: None,
            fill_policy: FillPolicy::default(),
            strictness: Strictness::default(),
            granularity: FileGranularity::default(),
            time_axis: TimeAxis::default(),
            variables: default_variables(),
            mask_rule: MaskRule::default(),
            allow_time_extrapolation: false,
            parallel: false,
            max_grid_points: None,
            zarr: GridProcessorConfig::default(),
        }
    }
}

impl PipelineOptions {
    fn grid_builder(&self) -> GridBuilder {
        GridBuilder::new(self.resolution)
            .lon_bounds(self.lon_bounds)
            .lat_bounds(self.lat_bounds)
            .max_points(self.max_grid_points.or(self.zarr.max_grid_points))
            .warn_points(self.zarr.large_grid_warning)
    }

    /// Check everything that does not need input data.
    pub fn validate(&self) -> Result<()> {
        self.grid_builder().validate()?;
        validate_variables(&self.variables)?;
        self.mask_rule.validate()?;
        self.time_axis
            .validate()
            .map_err(|e| IngestionError::InvalidConfig(e.to_string()))?;
        self.zarr.validate().map_err(IngestionError::InvalidConfig)?;
        if let FillPolicy::Constant(v) = self.fill_policy {
            if !v.is_finite() {
                return Err(IngestionError::InvalidConfig(
                    "constant fill value must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub output_dir: PathBuf,
    pub descriptor: PathBuf,
    pub nx: usize,
    pub ny: usize,
    /// Mesh nodes inside the window.
    pub nodes_used: usize,
    pub wet_cells: usize,
    pub time_steps: usize,
    pub time_units: String,
    pub warnings: Vec<NoValidDataWarning>,
    pub skipped: Vec<SkippedSnapshot>,
    pub files_written: usize,
    pub bytes_written: u64,
}

pub struct ConversionPipeline {
    options: PipelineOptions,
}

impl ConversionPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Convert SCHISM files, in the given order.
    pub fn run_files(
        &self,
        paths: &[PathBuf],
        layout: &SchismLayout,
        output_dir: &Path,
    ) -> Result<ConversionReport> {
        let sources: Vec<Box<dyn SnapshotSource>> = paths
            .iter()
            .map(|p| Box::new(NetCdfSnapshot::with_layout(p, layout.clone())) as Box<dyn SnapshotSource>)
            .collect();
        self.run(&sources, output_dir)
    }

    pub fn run(
        &self,
        sources: &[Box<dyn SnapshotSource>],
        output_dir: &Path,
    ) -> Result<ConversionReport> {
        let options = &self.options;
        options.validate()?;
        if sources.is_empty() {
            return Err(IngestionError::InvalidConfig(
                "no input snapshots".to_string(),
            ));
        }

        info!(
            snapshots = sources.len(),
            resolution = options.resolution,
            granularity = ?options.granularity,
            encoding = %options.time_axis.encoding,
            "Starting conversion"
        );

        let mesh = self.read_mesh(sources)?;
        let plan = options
            .grid_builder()
            .build(&mesh)
            .map_err(IngestionError::from_grid)?;
        let cloud = mesh.subset(&plan.selection).map_err(|e| {
            IngestionError::InvalidConfig(format!("node selection does not fit the mesh: {}", e))
        })?;

        info!(
            nodes = mesh.len(),
            nodes_used = cloud.len(),
            nx = plan.grid.nx(),
            ny = plan.grid.ny(),
            "Built target grid"
        );

        let (bathymetry, depth_warning) = BathymetryRasterizer::new(options.mask_rule.clone())
            .rasterize(&cloud, cloud.depths(), &plan.grid)
            .map_err(IngestionError::from_grid)?;
        if let Some(w) = &depth_warning {
            warn!(warning = %w, "Bathymetry has no valid depths; every cell is dry");
        }

        let regridder = FieldRegridder::new(&cloud, &plan.grid, options.fill_policy);
        let assembly = TimeSeriesAssembler::new(&regridder, &plan.selection, &options.variables)
            .strictness(options.strictness)
            .parallel(options.parallel)
            .assemble(sources)?;

        if assembly.steps() == 0 {
            return Err(IngestionError::EmptyDomain(
                "no snapshot contributed a time step".to_string(),
            ));
        }

        let time = options
            .time_axis
            .encode(&assembly.indices)
            .map_err(|e| IngestionError::InvalidConfig(e.to_string()))?;

        let wet_cells = bathymetry.wet_cells();
        let time_units = time.units().to_string();
        let dataset = Dataset {
            grid: plan.grid,
            bathymetry,
            time,
            variables: options
                .variables
                .iter()
                .zip(assembly.fields)
                .map(|(spec, field)| DatasetVariable {
                    layout: spec.layout(),
                    field,
                })
                .collect(),
        };

        let writer = StructuredDatasetWriter::new(
            ZarrWriter::new(options.zarr.clone()),
            WriterOptions {
                granularity: options.granularity,
                allow_time_extrapolation: options.allow_time_extrapolation,
                fill_value: options.fill_policy.value(),
            },
        );
        let written = writer.write(&dataset, output_dir)?;

        let mut warnings = assembly.warnings;
        warnings.extend(depth_warning);

        let report = ConversionReport {
            output_dir: output_dir.to_path_buf(),
            descriptor: written.descriptor,
            nx: dataset.grid.nx(),
            ny: dataset.grid.ny(),
            nodes_used: cloud.len(),
            wet_cells,
            time_steps: dataset.time.len(),
            time_units,
            warnings,
            skipped: assembly.skipped,
            files_written: written.files.len(),
            bytes_written: written.bytes_written,
        };

        info!(
            output = %output_dir.display(),
            steps = report.time_steps,
            warnings = report.warnings.len(),
            skipped = report.skipped.len(),
            bytes = report.bytes_written,
            "Conversion complete"
        );

        Ok(report)
    }

    /// Mesh of the first snapshot that can be read. Under `Abort` the first
    /// snapshot must be readable.
    fn read_mesh(&self, sources: &[Box<dyn SnapshotSource>]) -> Result<NodeCloud> {
        let mut last_err = None;
        for source in sources {
            match source.read_mesh() {
                Ok(mesh) => return Ok(mesh),
                Err(err) if self.options.strictness == Strictness::Skip => {
                    warn!(snapshot = %source.describe(), error = %err, "Cannot read mesh, trying next snapshot");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| IngestionError::InvalidConfig("no input snapshots".to_string())))
    }
}
