//! Bathymetry and wet/dry level mask on the target grid.
//!
//! The mask is derived once per run from node depth and reused for every
//! time step. Treating bathymetry as static over a long series is a
//! modelling approximation: wetting and drying at the coast is not tracked.

use mesh_common::{FieldSample, NodeCloud};
use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};
use crate::grid::TargetGrid;
use crate::regrid::{FieldRegridder, FillPolicy};
use crate::types::NoValidDataWarning;

/// How interpolated depth maps to the `mbathy` level index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskRule {
    /// `1` where depth exceeds the threshold, else `0`.
    Threshold(f64),
    /// Highest `i + 1` such that depth exceeds `levels[i]`, else `0`.
    LevelIndex(Vec<f64>),
}

impl Default for MaskRule {
    fn default() -> Self {
        Self::Threshold(0.0)
    }
}

impl MaskRule {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Threshold(t) if !t.is_finite() => Err(GridProcessorError::ConfigError(
                format!("mask threshold must be finite, got {}", t),
            )),
            Self::LevelIndex(levels) if levels.is_empty() => Err(
                GridProcessorError::ConfigError("level_index needs at least one level".to_string()),
            ),
            Self::LevelIndex(levels) if levels.iter().any(|l| !l.is_finite()) => Err(
                GridProcessorError::ConfigError("level depths must be finite".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Level index of one cell. NaN depth is dry.
    pub fn level(&self, depth: f32) -> i32 {
        let depth = depth as f64;
        match self {
            Self::Threshold(t) => i32::from(depth > *t),
            Self::LevelIndex(levels) => levels
                .iter()
                .rposition(|&l| depth > l)
                .map_or(0, |i| i as i32 + 1),
        }
    }
}

/// Interpolated depth and level mask, both row-major `[y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BathymetryMask {
    pub ny: usize,
    pub nx: usize,
    pub mbathy: Vec<i32>,
    pub depth: Vec<f32>,
}

impl BathymetryMask {
    pub fn is_wet(&self, y: usize, x: usize) -> bool {
        self.mbathy[y * self.nx + x] > 0
    }

    pub fn wet_cells(&self) -> usize {
        self.mbathy.iter().filter(|&&m| m > 0).count()
    }
}

/// Derives the bathymetry grid and mask from node depths.
#[derive(Debug, Clone, Default)]
pub struct BathymetryRasterizer {
    rule: MaskRule,
}

impl BathymetryRasterizer {
    pub fn new(rule: MaskRule) -> Self {
        Self { rule }
    }

    /// Interpolate `depths` (aligned with `cloud`) and derive the mask.
    ///
    /// Uses the field interpolation with NaN depths excluded. Cells outside
    /// the hull get depth 0 and are therefore dry.
    pub fn rasterize(
        &self,
        cloud: &NodeCloud,
        depths: &[f64],
        grid: &TargetGrid,
    ) -> Result<(BathymetryMask, Option<NoValidDataWarning>)> {
        self.rule.validate()?;

        let sample = FieldSample::new("depth", depths.to_vec());
        let outcome = FieldRegridder::new(cloud, grid, FillPolicy::Zero).regrid(&sample)?;

        let mbathy = outcome.data.iter().map(|&d| self.rule.level(d)).collect();
        Ok((
            BathymetryMask {
                ny: grid.ny(),
                nx: grid.nx(),
                mbathy,
                depth: outcome.data,
            },
            outcome.warning,
        ))
    }
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
    fn test_wet_mask_threshold() {
        let cloud = triangle();
        let grid = GridBuilder::new(0.25).build(&cloud).unwrap().grid;
        let (mask, warning) = BathymetryRasterizer::default()
            .rasterize(&cloud, cloud.depths(), &grid)
            .unwrap();

        assert!(warning.is_none());
        // (lon 0.5, lat 0.25): depth -0.25
        assert!(!mask.is_wet(1, 2));
        // (lon 0, lat 1): the deep node itself
        assert!(mask.is_wet(4, 0));
        // outside the hull
        assert!(!mask.is_wet(4, 4));
        assert_eq!(mask.depth[grid.index(4, 4)], 0.0);
    }

    #[test]
    fn test_level_index() {
        let rule = MaskRule::LevelIndex(vec![0.0, 5.0, 10.0]);
        assert_eq!(rule.level(-1.0), 0);
        assert_eq!(rule.level(3.0), 1);
        assert_eq!(rule.level(7.0), 2);
        assert_eq!(rule.level(50.0), 3);
        assert_eq!(rule.level(f32::NAN), 0);
    }

    #[test]
    fn test_rule_validation() {
        assert!(MaskRule::LevelIndex(vec![]).validate().is_err());
        assert!(MaskRule::Threshold(f64::NAN).validate().is_err());
        assert!(MaskRule::default().validate().is_ok());
    }

    #[test]
    fn test_nan_depths_excluded() {
        let cloud = NodeCloud::new(
            vec![0.0, 1.0, 0.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![5.0, 5.0, 5.0, f64::NAN],
        )
        .unwrap();
        let grid = GridBuilder::new(0.5).build(&cloud).unwrap().grid;
        let (mask, _) = BathymetryRasterizer::default()
            .rasterize(&cloud, cloud.depths(), &grid)
            .unwrap();
        assert!(mask.is_wet(0, 0));
        assert!(!mask.is_wet(2, 2));
    }
}
