//! Target regular lon/lat grid construction.
//!
//! Each axis holds `ceil((max - min) / resolution) + 1` points starting at
//! `min`, so the upper bound is always covered. The point count grows with
//! the inverse square of the resolution: halving the step quadruples the
//! grid and every per-time-step interpolation over it.

use mesh_common::{AxisBounds, BoundingBox, NodeCloud, NodeSelection};
use tracing::{debug, warn};

use crate::error::{GridProcessorError, Result};

/// Relative slack used when deciding whether `max` falls on a grid line.
const AXIS_EPSILON: f64 = 1e-9;

/// Regular grid with ascending longitudes (x) and latitudes (y).
///
/// Two-dimensional arrays over the grid are row-major `[y, x]`, so row 0 is
/// the southernmost latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGrid {
    lons: Vec<f64>,
    lats: Vec<f64>,
    resolution: f64,
}

impl TargetGrid {
    /// Lay out a grid over the given axis ranges.
    pub fn new(lon: AxisRange, lat: AxisRange, resolution: f64) -> Result<Self> {
        check_resolution(resolution)?;
        Ok(Self {
            lons: axis_coords(lon.min, lon.max, resolution),
            lats: axis_coords(lat.min, lat.max, resolution),
            resolution,
        })
    }

    /// Rebuild a grid from stored coordinate vectors.
    pub fn from_coords(lons: Vec<f64>, lats: Vec<f64>, resolution: f64) -> Result<Self> {
        check_resolution(resolution)?;
        if lons.is_empty() || lats.is_empty() {
            return Err(GridProcessorError::empty_domain("grid has no points"));
        }
        Ok(Self {
            lons,
            lats,
            resolution,
        })
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn nx(&self) -> usize {
        self.lons.len()
    }

    pub fn ny(&self) -> usize {
        self.lats.len()
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.nx() * self.ny()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of cell `(y, x)`.
    pub fn index(&self, y: usize, x: usize) -> usize {
        y * self.nx() + x
    }

    /// Bounds spanned by the grid points themselves.
    pub fn extent(&self) -> BoundingBox {
        BoundingBox::new(
            self.lons[0],
            self.lats[0],
            self.lons[self.nx() - 1],
            self.lats[self.ny() - 1],
        )
    }

    /// 2-D longitude and latitude arrays, row-major `[y, x]`.
    pub fn meshgrid(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lon2d = Vec::with_capacity(self.len());
        let mut lat2d = Vec::with_capacity(self.len());
        for &lat in &self.lats {
            for &lon in &self.lons {
                lon2d.push(lon);
                lat2d.push(lat);
            }
        }
        (lon2d, lat2d)
    }
}

/// Closed range along one grid axis. Unlike [`AxisBounds`] it may be
/// degenerate, as for a node cloud lying on a single meridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl From<AxisBounds> for AxisRange {
    fn from(b: AxisBounds) -> Self {
        Self {
            min: b.min,
            max: b.max,
        }
    }
}

fn check_resolution(resolution: f64) -> Result<()> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(GridProcessorError::invalid_bounds(format!(
            "resolution must be a positive number, got {}",
            resolution
        )));
    }
    Ok(())
}

/// Number of points needed to cover `[min, max]` at `resolution`.
pub fn axis_len(min: f64, max: f64, resolution: f64) -> usize {
    let steps = (max - min) / resolution;
    let steps = (steps - AXIS_EPSILON * steps.max(1.0)).ceil().max(0.0);
    steps as usize + 1
}

fn axis_coords(min: f64, max: f64, resolution: f64) -> Vec<f64> {
    (0..axis_len(min, max, resolution))
        .map(|i| min + i as f64 * resolution)
        .collect()
}

/// A target grid together with the node subset it was built for.
#[derive(Debug, Clone)]
pub struct GridPlan {
    pub grid: TargetGrid,
    /// Nodes inside the configured window. Computed once and applied to
    /// every field sample.
    pub selection: NodeSelection,
}

/// Builds the target grid for a node cloud.
#[derive(Debug, Clone)]
pub struct GridBuilder {
    resolution: f64,
    lon_bounds: Option<AxisBounds>,
    lat_bounds: Option<AxisBounds>,
    max_points: Option<usize>,
    warn_points: usize,
}

impl GridBuilder {
    pub fn new(resolution: f64) -> Self {
        Self {
            resolution,
            lon_bounds: None,
            lat_bounds: None,
            max_points: None,
            warn_points: 25_000_000,
        }
    }

    pub fn lon_bounds(mut self, bounds: Option<AxisBounds>) -> Self {
        self.lon_bounds = bounds;
        self
    }

    pub fn lat_bounds(mut self, bounds: Option<AxisBounds>) -> Self {
        self.lat_bounds = bounds;
        self
    }

    /// Fail instead of building grids with more than `max` points.
    pub fn max_points(mut self, max: Option<usize>) -> Self {
        self.max_points = max;
        self
    }

    pub fn warn_points(mut self, points: usize) -> Self {
        self.warn_points = points;
        self
    }

    /// Check resolution and bounds without touching any node data.
    pub fn validate(&self) -> Result<()> {
        check_resolution(self.resolution)?;
        for (axis, bounds) in [("longitude", self.lon_bounds), ("latitude", self.lat_bounds)] {
            if let Some(b) = bounds {
                if !b.min.is_finite() || !b.max.is_finite() || b.min >= b.max {
                    return Err(GridProcessorError::invalid_bounds(format!(
                        "{} bounds [{}, {}] must satisfy min < max",
                        axis, b.min, b.max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Expected grid shape `(ny, nx)` once the cloud extent is known.
    pub fn shape_for(&self, extent: &BoundingBox) -> (usize, usize) {
        let lon = self.lon_bounds.map(AxisRange::from).unwrap_or(AxisRange {
            min: extent.min_lon,
            max: extent.max_lon,
        });
        let lat = self.lat_bounds.map(AxisRange::from).unwrap_or(AxisRange {
            min: extent.min_lat,
            max: extent.max_lat,
        });
        (
            axis_len(lat.min, lat.max, self.resolution),
            axis_len(lon.min, lon.max, self.resolution),
        )
    }

    /// Build the grid and the node selection for `cloud`.
    pub fn build(&self, cloud: &NodeCloud) -> Result<GridPlan> {
        self.validate()?;

        let extent = cloud.extent().ok_or_else(|| {
            GridProcessorError::empty_domain(format!(
                "none of the {} nodes has finite coordinates",
                cloud.len()
            ))
        })?;

        let window = BoundingBox::new(
            self.lon_bounds.map_or(extent.min_lon, |b| b.min),
            self.lat_bounds.map_or(extent.min_lat, |b| b.min),
            self.lon_bounds.map_or(extent.max_lon, |b| b.max),
            self.lat_bounds.map_or(extent.max_lat, |b| b.max),
        );

        if extent.intersection(&window).is_none() {
            return Err(GridProcessorError::empty_domain(format!(
                "window {:?} does not intersect node extent {:?}",
                window, extent
            )));
        }

        let selection = if self.lon_bounds.is_some() || self.lat_bounds.is_some() {
            NodeSelection::within(cloud, &window)
        } else {
            NodeSelection::all(cloud.len())
        };

        if selection.selected() == 0 {
            return Err(GridProcessorError::empty_domain(format!(
                "no node lies inside window {:?}",
                window
            )));
        }

        let (ny, nx) = self.shape_for(&extent);
        let points = nx * ny;
        if let Some(max) = self.max_points {
            if points > max {
                return Err(GridProcessorError::invalid_bounds(format!(
                    "grid of {}x{} = {} points at resolution {} exceeds the limit of {}",
                    ny, nx, points, self.resolution, max
                )));
            }
        }
        if points > self.warn_points {
            warn!(
                ny = ny,
                nx = nx,
                resolution = self.resolution,
                "Large target grid; cost grows quadratically as resolution shrinks"
            );
        }

        let grid = TargetGrid::new(
            AxisRange {
                min: window.min_lon,
                max: window.max_lon,
            },
            AxisRange {
                min: window.min_lat,
                max: window.max_lat,
            },
            self.resolution,
        )?;

        debug!(
            nx = grid.nx(),
            ny = grid.ny(),
            selected = selection.selected(),
            total = cloud.len(),
            "Built target grid"
        );

        Ok(GridPlan { grid, selection })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> NodeCloud {
        NodeCloud::new(
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![-1.0, -1.0, 2.0],
        )
        .unwrap()
    }

    #[test]
    fn test_axis_len_includes_upper_bound() {
        assert_eq!(axis_len(0.0, 1.0, 0.5), 3);
        assert_eq!(axis_len(0.0, 1.0, 0.3), 5);
        assert_eq!(axis_len(0.0, 0.0, 0.5), 1);
        assert_eq!(axis_len(-10.0, 10.0, 0.1), 201);
    }

    #[test]
    fn test_grid_defaults_to_extent() {
        let plan = GridBuilder::new(0.5).build(&triangle()).unwrap();
        assert_eq!(plan.grid.lons(), &[0.0, 0.5, 1.0]);
        assert_eq!(plan.grid.lats(), &[0.0, 0.5, 1.0]);
        assert!(plan.selection.is_all());
    }

    #[test]
    fn test_meshgrid_row_major() {
        let plan = GridBuilder::new(0.5).build(&triangle()).unwrap();
        let (lon2d, lat2d) = plan.grid.meshgrid();
        let i = plan.grid.index(1, 2);
        assert_eq!(lon2d[i], 1.0);
        assert_eq!(lat2d[i], 0.5);
    }

    #[test]
    fn test_window_selects_nodes() {
        let plan = GridBuilder::new(0.25)
            .lon_bounds(Some(AxisBounds::new(0.0, 0.5).unwrap()))
            .build(&triangle())
            .unwrap();
        assert_eq!(plan.selection.mask(), &[true, false, true]);
        assert_eq!(plan.grid.nx(), 3);
        assert_eq!(plan.grid.ny(), 5);
    }

    #[test]
    fn test_inverted_bounds() {
        let builder = GridBuilder::new(0.5).lat_bounds(Some(AxisBounds {
            min: 2.0,
            max: 1.0,
        }));
        let err = builder.validate().unwrap_err();
        assert!(matches!(err, GridProcessorError::InvalidBounds(_)));
    }

    #[test]
    fn test_disjoint_window_is_empty_domain() {
        let err = GridBuilder::new(0.5)
            .lon_bounds(Some(AxisBounds::new(10.0, 11.0).unwrap()))
            .build(&triangle())
            .unwrap_err();
        assert!(matches!(err, GridProcessorError::EmptyDomain(_)));
    }

    #[test]
    fn test_bad_resolution() {
        assert!(GridBuilder::new(0.0).validate().is_err());
        assert!(GridBuilder::new(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_max_points() {
        let err = GridBuilder::new(0.01)
            .max_points(Some(100))
            .build(&triangle())
            .unwrap_err();
        assert!(matches!(err, GridProcessorError::InvalidBounds(_)));
    }
}
