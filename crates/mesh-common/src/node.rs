//! Unstructured node clouds and the per-instant field values attached to them.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{MeshError, MeshResult};

/// Ordered set of mesh nodes with their coordinates and depth.
///
/// Coordinates and depth may contain NaN for invalid nodes; they are
/// excluded from interpolation rather than rejected at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCloud {
    lons: Vec<f64>,
    lats: Vec<f64>,
    depths: Vec<f64>,
}

impl NodeCloud {
    pub fn new(lons: Vec<f64>, lats: Vec<f64>, depths: Vec<f64>) -> MeshResult<Self> {
        if lats.len() != lons.len() {
            return Err(MeshError::length_mismatch("latitude", lons.len(), lats.len()));
        }
        if depths.len() != lons.len() {
            return Err(MeshError::length_mismatch("depth", lons.len(), depths.len()));
        }
        Ok(Self { lons, lats, depths })
    }

    pub fn len(&self) -> usize {
        self.lons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lons.is_empty()
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn depths(&self) -> &[f64] {
        &self.depths
    }

    /// True when both coordinates of node `i` are finite.
    pub fn has_valid_position(&self, i: usize) -> bool {
        self.lons[i].is_finite() && self.lats[i].is_finite()
    }

    /// Number of nodes with finite coordinates.
    pub fn valid_position_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.has_valid_position(i)).count()
    }

    /// Bounding box of the nodes with finite coordinates.
    pub fn extent(&self) -> Option<BoundingBox> {
        BoundingBox::of_points(&self.lons, &self.lats)
    }

    /// Keep only the selected nodes, preserving order.
    pub fn subset(&self, selection: &NodeSelection) -> MeshResult<NodeCloud> {
        Ok(NodeCloud {
            lons: selection.apply(&self.lons)?,
            lats: selection.apply(&self.lats)?,
            depths: selection.apply(&self.depths)?,
        })
    }
}

/// Values of one variable at every node for a single time instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSample {
    pub variable: String,
    pub values: Vec<f64>,
}

impl FieldSample {
    pub fn new(variable: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            variable: variable.into(),
            values,
        }
    }

    /// Check that the sample is aligned with a cloud of `nodes` nodes.
    pub fn check_len(&self, nodes: usize) -> MeshResult<()> {
        if self.values.len() != nodes {
            return Err(MeshError::length_mismatch(
                self.variable.clone(),
                nodes,
                self.values.len(),
            ));
        }
        Ok(())
    }

    pub fn finite_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    pub fn subset(&self, selection: &NodeSelection) -> MeshResult<FieldSample> {
        Ok(FieldSample {
            variable: self.variable.clone(),
            values: selection.apply(&self.values)?,
        })
    }
}

/// Spatial subsetting mask over the nodes of a cloud.
///
/// Derived once from the configured window and applied to every sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSelection {
    mask: Vec<bool>,
}

impl NodeSelection {
    /// Select every node.
    pub fn all(len: usize) -> Self {
        Self {
            mask: vec![true; len],
        }
    }

    /// Select nodes whose position lies inside `bbox` (inclusive).
    pub fn within(cloud: &NodeCloud, bbox: &BoundingBox) -> Self {
        let mask = cloud
            .lons()
            .iter()
            .zip(cloud.lats())
            .map(|(&lon, &lat)| bbox.contains(lon, lat))
            .collect();
        Self { mask }
    }

    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    pub fn selected(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn is_all(&self) -> bool {
        self.mask.iter().all(|&m| m)
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn apply<T: Copy>(&self, values: &[T]) -> MeshResult<Vec<T>> {
        if values.len() != self.mask.len() {
            return Err(MeshError::length_mismatch(
                "selection input",
                self.mask.len(),
                values.len(),
            ));
        }
        Ok(values
            .iter()
            .zip(&self.mask)
            .filter(|(_, &keep)| keep)
            .map(|(&v, _)| v)
            .collect())
    }
}
