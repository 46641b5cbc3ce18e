//! Output variable table.
//!
//! Defines which gridded variables are produced, where their values come
//! from, and how they are named on disk.

use std::collections::HashSet;

use grid_processor::VariableLayout;
use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, Result};

/// Where the values of an output variable come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableSource {
    /// A per-node variable of each snapshot, regridded.
    Node(String),
    /// The same value in every cell at every time index.
    Constant(f64),
}

/// Specification for one output variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Descriptor key, e.g. "U"
    pub key: String,
    /// On-disk array name, e.g. "vozocrtx"
    pub name: String,
    /// File-name prefix, e.g. "U"
    pub prefix: String,
    pub source: VariableSource,
}

impl VariableSpec {
    pub fn node(key: &str, name: &str, prefix: &str, variable: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            prefix: prefix.to_string(),
            source: VariableSource::Node(variable.to_string()),
        }
    }

    pub fn constant(key: &str, name: &str, prefix: &str, value: f64) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            prefix: prefix.to_string(),
            source: VariableSource::Constant(value),
        }
    }

    pub fn layout(&self) -> VariableLayout {
        VariableLayout::new(self.key.clone(), self.name.clone(), self.prefix.clone())
    }

    /// Snapshot variable this spec reads, if any.
    pub fn node_variable(&self) -> Option<&str> {
        match &self.source {
            VariableSource::Node(name) => Some(name),
            VariableSource::Constant(_) => None,
        }
    }
}

/// Get the default NEMO-style variable table.
///
/// Velocities come from the depth-averaged SCHISM fields. Vertical velocity
/// and salinity are constants because the 2-D output has neither. Surface
/// elevation is carried in the temperature slot, which is what the
/// transport engine's NEMO reader expects to find there.
pub fn default_variables() -> Vec<VariableSpec> {
    vec![
        VariableSpec::node("U", "vozocrtx", "U", "depthAverageVelX"),
        VariableSpec::node("V", "vomecrty", "V", "depthAverageVelY"),
        VariableSpec::constant("W", "vovecrtz", "W", 0.0),
        VariableSpec::node("conservative_temperature", "votemper", "T", "elevation"),
        VariableSpec::constant("absolute_salinity", "vosaline", "S", 35.0),
    ]
}

/// Check that the table is non-empty and keys, names and prefixes are unique.
pub fn validate_variables(specs: &[VariableSpec]) -> Result<()> {
    if specs.is_empty() {
        return Err(IngestionError::InvalidConfig(
            "at least one output variable is required".to_string(),
        ));
    }

    let mut keys = HashSet::new();
    let mut names = HashSet::new();
    let mut prefixes = HashSet::new();
    for spec in specs {
        if spec.key.is_empty() || spec.name.is_empty() || spec.prefix.is_empty() {
            return Err(IngestionError::InvalidConfig(format!(
                "variable {:?} has an empty key, name or prefix",
                spec.key
            )));
        }
        if !keys.insert(spec.key.as_str()) {
            return Err(IngestionError::InvalidConfig(format!(
                "duplicate variable key {}",
                spec.key
            )));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(IngestionError::InvalidConfig(format!(
                "duplicate on-disk name {}",
                spec.name
            )));
        }
        if !prefixes.insert(spec.prefix.as_str()) {
            return Err(IngestionError::InvalidConfig(format!(
                "duplicate file prefix {}",
                spec.prefix
            )));
        }
        if let VariableSource::Constant(v) = spec.source {
            if !v.is_finite() {
                return Err(IngestionError::InvalidConfig(format!(
                    "constant for {} must be finite",
                    spec.key
                )));
            }
        }
    }
    Ok(())
}

/// Distinct snapshot variables needed by `specs`, in first-use order.
pub fn node_variables(specs: &[VariableSpec]) -> Vec<String> {
    let mut seen = HashSet::new();
    specs
        .iter()
        .filter_map(|s| s.node_variable())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
