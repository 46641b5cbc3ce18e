//! Engine-facing dataset descriptor (`settings.json`).
//!
//! The layout follows the settings document the particle-transport engine
//! reads for a NEMO-style structured dataset: per-variable on-disk names,
//! dimension-role mapping, mesh/bathymetry file names and engine flags. A few
//! extra keys (`format`, `granularity`, `files`, `time`, `grid`, `fill_value`)
//! make the directory self-describing for readers that do not rely on
//! filename patterns.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

pub const DESCRIPTOR_FILE: &str = "settings.json";
pub const OCEAN_MESH_FILE: &str = "ocean_mesh_hgr.zarr";
pub const BATHYMETRY_MESH_FILE: &str = "bathymetry_mesh_zgr.zarr";
pub const MODEL_NAME: &str = "NEMO0083";

pub const TIME_VAR: &str = "time_counter";
pub const LON_VAR: &str = "nav_lon";
pub const LAT_VAR: &str = "nav_lat";
pub const MBATHY_VAR: &str = "mbathy";
pub const DEPTH_VAR: &str = "bathymetry";

/// How assembled time steps are split across files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileGranularity {
    /// One `<prefix>_timeseries.zarr` per variable.
    #[default]
    Aggregate,
    /// One `<prefix>_<YYYY-MM-DD>.zarr` per calendar day.
    Daily,
    /// One `<prefix>_<YYYY-MM-DD>T<HH>.zarr` per hour.
    Hourly,
}

impl FileGranularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "aggregate" | "timeseries" | "single" => Some(Self::Aggregate),
            "daily" | "day" => Some(Self::Daily),
            "hourly" | "hour" => Some(Self::Hourly),
            _ => None,
        }
    }

    /// File-name suffix for an instant.
    pub fn suffix(&self, instant: DateTime<Utc>) -> String {
        match self {
            Self::Aggregate => "timeseries".to_string(),
            Self::Daily => instant.format("%Y-%m-%d").to_string(),
            Self::Hourly => instant.format("%Y-%m-%dT%H").to_string(),
        }
    }

    /// Value of the engine's `filename_style` key. Daily files use the
    /// engine's default date-based selection, signalled by an empty style.
    pub fn filename_style(&self) -> &'static str {
        match self {
            Self::Aggregate => "timeseries",
            Self::Daily => "",
            Self::Hourly => "hourly",
        }
    }
}

/// Store name for one variable file.
pub fn variable_file_name(prefix: &str, suffix: &str) -> String {
    format!("{}_{}.zarr", prefix, suffix)
}

/// Axis-role mapping of one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMap {
    pub lon: String,
    pub lat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl DimensionMap {
    pub fn gridded() -> Self {
        Self {
            lon: LON_VAR.to_string(),
            lat: LAT_VAR.to_string(),
            time: Some(TIME_VAR.to_string()),
        }
    }

    pub fn static_2d() -> Self {
        Self {
            lon: LON_VAR.to_string(),
            lat: LAT_VAR.to_string(),
            time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSettings {
    pub variable: String,
    pub units: String,
    pub calendar: String,
    pub steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    pub nx: usize,
    pub ny: usize,
    pub resolution: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OceanSettings {
    pub modelname: String,
    pub directory: String,
    pub filename_style: String,
    pub ocean_mesh: String,
    pub bathymetry_mesh: String,
    pub variables: BTreeMap<String, String>,
    pub dimensions: BTreeMap<String, DimensionMap>,
    pub indices: BTreeMap<String, serde_json::Value>,
    pub bathymetry_variables: BTreeMap<String, String>,
    pub bathymetry_dimensions: DimensionMap,
    pub format: String,
    pub granularity: FileGranularity,
    /// Files of each variable key, in time order.
    pub files: BTreeMap<String, Vec<String>>,
    pub time: TimeSettings,
    pub grid: GridSettings,
    /// Out-of-hull value; absent when it is NaN.
    #[serde(default)]
    pub fill_value: Option<f32>,
}

/// Top-level descriptor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "use_3D")]
    pub use_3d: bool,
    pub allow_time_extrapolation: bool,
    pub verbose_delete: bool,
    pub use_mixing: bool,
    pub use_biofouling: bool,
    pub use_stokes: bool,
    pub use_wind: bool,
    pub ocean: OceanSettings,
}

impl Descriptor {
    /// Read `settings.json` from a dataset directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(DESCRIPTOR_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            GridProcessorError::storage_error(format!("{}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write `settings.json` through a temporary file and a rename, so a
    /// reader never sees a half-written descriptor.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let tmp = dir.join(format!(".{}.tmp", DESCRIPTOR_FILE));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, dir.join(DESCRIPTOR_FILE))?;
        Ok(())
    }

    /// Check that every variable has its name, dimensions and files declared.
    pub fn validate(&self) -> Result<()> {
        for key in self.ocean.variables.keys() {
            if !self.ocean.dimensions.contains_key(key) {
                return Err(GridProcessorError::invalid_metadata(format!(
                    "variable {} has no dimension mapping",
                    key
                )));
            }
            match self.ocean.files.get(key) {
                Some(files) if !files.is_empty() => {}
                _ => {
                    return Err(GridProcessorError::invalid_metadata(format!(
                        "variable {} has no files",
                        key
                    )))
                }
            }
        }
        Ok(())
    }
}
