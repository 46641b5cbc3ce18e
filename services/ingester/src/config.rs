//! Configuration file for the ingester.
//!
//! The YAML file is optional. Every value may reference the environment with
//! `${VAR}` or `${VAR:-default}`; command-line arguments override the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use grid_processor::{FileGranularity, GridProcessorConfig};
use ingestion::{PipelineOptions, Strictness};
use mesh_common::{AxisBounds, TimeEncoding};
use netcdf_parser::SchismLayout;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngesterConfig {
    /// Input specification, see [`crate::sources::discover_inputs`].
    pub input: Option<String>,
    pub output: Option<PathBuf>,
    /// Walk input directories recursively.
    pub recursive: bool,
    pub layout: LayoutConfig,
    pub logging: LoggingConfig,
    pub conversion: PipelineOptions,
}

/// NetCDF names of the SCHISM horizontal grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_dim: String,
    pub lon_var: String,
    pub lat_var: String,
    pub depth_var: String,
    pub time_var: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let layout = SchismLayout::default();
        Self {
            node_dim: layout.node_dim,
            lon_var: layout.lon_var,
            lat_var: layout.lat_var,
            depth_var: layout.depth_var,
            time_var: layout.time_var,
        }
    }
}

impl From<LayoutConfig> for SchismLayout {
    fn from(c: LayoutConfig) -> Self {
        SchismLayout {
            node_dim: c.node_dim,
            lon_var: c.lon_var,
            lat_var: c.lat_var,
            depth_var: c.depth_var,
            time_var: c.time_var,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<String>,
    pub output: Option<PathBuf>,
    pub resolution: Option<f64>,
    pub lon_bounds: Option<AxisBounds>,
    pub lat_bounds: Option<AxisBounds>,
    pub granularity: Option<String>,
    pub encoding: Option<String>,
    pub strictness: Option<String>,
    pub parallel: bool,
    pub recursive: bool,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl IngesterConfig {
    /// Load a config file, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_config_file(path)?,
            None => Self::default(),
        };
        // ZARR_* variables apply when the file leaves the Zarr settings alone
        if config.conversion.zarr == GridProcessorConfig::default() {
            config.conversion.zarr = GridProcessorConfig::from_env();
        }
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(input) = overrides.input {
            self.input = Some(input);
        }
        if let Some(output) = overrides.output {
            self.output = Some(output);
        }
        if let Some(resolution) = overrides.resolution {
            self.conversion.resolution = resolution;
        }
        if overrides.lon_bounds.is_some() {
            self.conversion.lon_bounds = overrides.lon_bounds;
        }
        if overrides.lat_bounds.is_some() {
            self.conversion.lat_bounds = overrides.lat_bounds;
        }
        if let Some(s) = overrides.granularity {
            self.conversion.granularity = FileGranularity::parse(&s)
                .with_context(|| format!("Unknown granularity: {}", s))?;
        }
        if let Some(s) = overrides.encoding {
            self.conversion.time_axis.encoding = TimeEncoding::from_str(&s)
                .with_context(|| format!("Unknown time encoding: {}", s))?;
        }
        if let Some(s) = overrides.strictness {
            self.conversion.strictness =
                Strictness::parse(&s).with_context(|| format!("Unknown strictness: {}", s))?;
        }
        if overrides.parallel {
            self.conversion.parallel = true;
        }
        if overrides.recursive {
            self.recursive = true;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if overrides.json_logs {
            self.logging.format = "json".to_string();
        }
        Ok(())
    }
}

fn load_config_file(path: &Path) -> Result<IngesterConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ingester config from {:?}", path))?;
    parse_config(&content).with_context(|| format!("Failed to parse ingester config {:?}", path))
}

pub fn parse_config(content: &str) -> Result<IngesterConfig> {
    let expanded = expand_env_vars(content)?;
    let config: IngesterConfig = serde_yaml::from_str(&expanded)?;
    Ok(config)
}

/// Substitute `${VAR}` and `${VAR:-default}` references. A default may
/// itself contain balanced braces.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let end = closing_brace(body)
            .with_context(|| format!("Unclosed variable substitution: ${{{}", body))?;
        out.push_str(&lookup(&body[..end])?);
        rest = &body[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Byte offset of the `}` closing a reference body.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn lookup(reference: &str) -> Result<String> {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name.trim(), Some(default)),
        None => (reference.trim(), None),
    };
    match (std::env::var(name), default) {
        (Ok(value), Some(_)) if !value.is_empty() => Ok(value),
        (_, Some(default)) => Ok(default.to_string()),
        (Ok(value), None) => Ok(value),
        (Err(_), None) => anyhow::bail!("Environment variable {} not set", name),
    }
}
