//! Scattered node fields onto the target grid.

use mesh_common::{FieldSample, NodeCloud};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::grid::TargetGrid;
use crate::triangulation::InterpolationWeights;
use crate::types::NoValidDataWarning;

/// Value written to cells outside the convex hull of the valid nodes.
///
/// The default is zero so that land and out-of-hull cells read as still
/// water rather than missing data.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    #[default]
    Zero,
    Constant(f32),
    Nan,
}

impl FillPolicy {
    pub fn value(&self) -> f32 {
        match self {
            Self::Zero => 0.0,
            Self::Constant(v) => *v,
            Self::Nan => f32::NAN,
        }
    }

    /// Whether `v` is this policy's fill value (NaN-aware).
    pub fn is_fill(&self, v: f32) -> bool {
        match self {
            Self::Nan => v.is_nan(),
            _ => v == self.value(),
        }
    }
}

/// One regridded slice plus the warning raised when no node was usable.
#[derive(Debug, Clone, PartialEq)]
pub struct RegridOutcome {
    pub data: Vec<f32>,
    pub warning: Option<NoValidDataWarning>,
}

/// Linear (Delaunay barycentric) interpolation of field samples.
///
/// The triangulation over every node with finite coordinates is computed
/// once. A sample with NaN at some of those nodes is interpolated over a
/// fresh triangulation of its finite nodes, so NaN never enters the stencil.
pub struct FieldRegridder<'a> {
    cloud: &'a NodeCloud,
    grid: &'a TargetGrid,
    fill: FillPolicy,
    base: InterpolationWeights,
}

impl<'a> FieldRegridder<'a> {
    pub fn new(cloud: &'a NodeCloud, grid: &'a TargetGrid, fill: FillPolicy) -> Self {
        let base = InterpolationWeights::build(cloud.lons(), cloud.lats(), grid, |_| true);
        Self {
            cloud,
            grid,
            fill,
            base,
        }
    }

    pub fn fill(&self) -> FillPolicy {
        self.fill
    }

    pub fn grid(&self) -> &TargetGrid {
        self.grid
    }

    /// Interpolate one sample onto the grid.
    pub fn regrid(&self, sample: &FieldSample) -> Result<RegridOutcome> {
        sample.check_len(self.cloud.len())?;

        let usable = |i: usize| self.cloud.has_valid_position(i) && sample.values[i].is_finite();
        let valid = (0..self.cloud.len()).filter(|&i| usable(i)).count();

        if valid == 0 {
            warn!(variable = %sample.variable, "No valid node values; writing fill value");
            return Ok(RegridOutcome {
                data: vec![self.fill.value(); self.grid.len()],
                warning: Some(NoValidDataWarning::new(sample.variable.clone())),
            });
        }

        let data = if valid == self.base.node_count() {
            self.base.apply(&sample.values, self.fill.value())
        } else {
            debug!(
                variable = %sample.variable,
                valid = valid,
                total = self.base.node_count(),
                "Re-triangulating over finite values"
            );
            InterpolationWeights::build(self.cloud.lons(), self.cloud.lats(), self.grid, |i| {
                sample.values[i].is_finite()
            })
            .apply(&sample.values, self.fill.value())
        };

        Ok(RegridOutcome {
            data,
            warning: None,
        })
    }
}

/// One-shot regrid of a single sample.
pub fn regrid(
    cloud: &NodeCloud,
    sample: &FieldSample,
    grid: &TargetGrid,
    fill: FillPolicy,
) -> Result<RegridOutcome> {
    FieldRegridder::new(cloud, grid, fill).regrid(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;

    fn triangle() -> NodeCloud {
        NodeCloud::new(
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![-1.0, -1.0, 2.0],
        )
        .unwrap()
    }

    #[test]
    fn test_interior_and_outside_hull() {
        let cloud = triangle();
        let grid = GridBuilder::new(0.5).build(&cloud).unwrap().grid;
        let sample = FieldSample::new("U", vec![1.0, 2.0, 3.0]);

        let out = regrid(&cloud, &sample, &grid, FillPolicy::Zero).unwrap();
        assert!(out.warning.is_none());
        assert!((out.data[grid.index(1, 1)] - 2.5).abs() < 1e-6);
        assert_eq!(out.data[grid.index(2, 2)], 0.0);
        assert_eq!(out.data[grid.index(0, 0)], 1.0);
    }

    #[test]
    fn test_fill_policies() {
        let cloud = triangle();
        let grid = GridBuilder::new(0.5).build(&cloud).unwrap().grid;
        let sample = FieldSample::new("U", vec![1.0, 2.0, 3.0]);
        let outside = grid.index(2, 2);

        for fill in [FillPolicy::Zero, FillPolicy::Constant(-5.0), FillPolicy::Nan] {
            let out = regrid(&cloud, &sample, &grid, fill).unwrap();
            assert!(fill.is_fill(out.data[outside]), "{:?}", fill);
        }
    }

    #[test]
    fn test_all_nan_gives_warning() {
        let cloud = triangle();
        let grid = GridBuilder::new(0.5).build(&cloud).unwrap().grid;
        let sample = FieldSample::new("U", vec![f64::NAN; 3]);

        let out = regrid(&cloud, &sample, &grid, FillPolicy::Zero).unwrap();
        assert_eq!(out.warning, Some(NoValidDataWarning::new("U")));
        assert!(out.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_nan_node_excluded() {
        let cloud = NodeCloud::new(
            vec![0.0, 1.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![1.0; 4],
        )
        .unwrap();
        let grid = GridBuilder::new(0.5).build(&cloud).unwrap().grid;
        let sample = FieldSample::new("U", vec![1.0, 1.0, f64::NAN, 1.0]);

        let out = regrid(&cloud, &sample, &grid, FillPolicy::Constant(-1.0)).unwrap();
        assert_eq!(out.data[grid.index(2, 2)], -1.0);
        assert!(out.data.iter().all(|v| v.is_finite()));
        assert_eq!(out.data[grid.index(0, 0)], 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        let cloud = triangle();
        let grid = GridBuilder::new(0.5).build(&cloud).unwrap().grid;
        let sample = FieldSample::new("U", vec![1.0, 2.0]);
        assert!(regrid(&cloud, &sample, &grid, FillPolicy::Zero).is_err());
    }

    #[test]
    fn test_idempotent() {
        let cloud = triangle();
        let grid = GridBuilder::new(0.1).build(&cloud).unwrap().grid;
        let sample = FieldSample::new("U", vec![0.3, -2.0, 7.5]);
        let regridder = FieldRegridder::new(&cloud, &grid, FillPolicy::Zero);
        let a = regridder.regrid(&sample).unwrap();
        let b = regridder.regrid(&sample).unwrap();
        assert_eq!(a, b);
    }
}
