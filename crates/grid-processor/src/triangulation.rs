//! Delaunay-based linear interpolation weights from scattered nodes to a grid.
//!
//! The node subset is triangulated once and every triangle is rasterized
//! onto the grid cells inside its bounding box. A cell takes the barycentric
//! weights of the first triangle (in triangulation order) that contains it;
//! cells covered by no triangle lie outside the convex hull.

use delaunator::{triangulate, Point};
use tracing::debug;

use crate::grid::TargetGrid;

/// Tolerance on barycentric coordinates, so cells on shared edges and hull
/// edges are counted as inside.
const BARYCENTRIC_EPSILON: f64 = 1e-10;

/// Interpolation stencil of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellWeights {
    /// Node indices into the original cloud.
    pub nodes: [u32; 3],
    pub weights: [f64; 3],
}

/// Precomputed stencils for every cell of a grid.
#[derive(Debug, Clone)]
pub struct InterpolationWeights {
    cells: Vec<Option<CellWeights>>,
    triangles: usize,
    nodes: usize,
}

impl InterpolationWeights {
    /// Triangulate the nodes for which `include(i)` holds and rasterize the
    /// triangles onto `grid`.
    ///
    /// Nodes with non-finite coordinates are always skipped. Fewer than three
    /// non-collinear nodes give no triangles, leaving every cell uncovered.
    pub fn build(
        lons: &[f64],
        lats: &[f64],
        grid: &TargetGrid,
        include: impl Fn(usize) -> bool,
    ) -> Self {
        let ids: Vec<u32> = (0..lons.len())
            .filter(|&i| lons[i].is_finite() && lats[i].is_finite() && include(i))
            .map(|i| i as u32)
            .collect();

        let points: Vec<Point> = ids
            .iter()
            .map(|&i| Point {
                x: lons[i as usize],
                y: lats[i as usize],
            })
            .collect();

        let mut cells = vec![None; grid.len()];
        let triangle_ids = if points.len() >= 3 {
            triangulate(&points).triangles
        } else {
            Vec::new()
        };
        let triangles = triangle_ids.len() / 3;

        for tri in triangle_ids.chunks_exact(3) {
            let vertices = [&points[tri[0]], &points[tri[1]], &points[tri[2]]];
            let nodes = [ids[tri[0]], ids[tri[1]], ids[tri[2]]];
            rasterize_triangle(grid, vertices, nodes, &mut cells);
        }

        debug!(
            nodes = ids.len(),
            triangles = triangles,
            covered = cells.iter().filter(|c| c.is_some()).count(),
            "Computed interpolation weights"
        );

        Self {
            cells,
            triangles,
            nodes: ids.len(),
        }
    }

    /// Number of nodes that entered the triangulation.
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles
    }

    /// Stencil of a cell, `None` outside the hull.
    pub fn cell(&self, index: usize) -> Option<&CellWeights> {
        self.cells.get(index).and_then(Option::as_ref)
    }

    /// Number of cells inside the hull.
    pub fn covered(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Interpolate node `values` onto the grid, `fill` outside the hull.
    pub fn apply(&self, values: &[f64], fill: f32) -> Vec<f32> {
        self.cells
            .iter()
            .map(|cell| match cell {
                Some(c) => {
                    let v: f64 = c
                        .nodes
                        .iter()
                        .zip(&c.weights)
                        .map(|(&n, &w)| values[n as usize] * w)
                        .sum();
                    v as f32
                }
                None => fill,
            })
            .collect()
    }
}

fn rasterize_triangle(
    grid: &TargetGrid,
    [a, b, c]: [&Point; 3],
    nodes: [u32; 3],
    cells: &mut [Option<CellWeights>],
) {
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det == 0.0 || !det.is_finite() {
        return;
    }

    let Some((x0, x1)) = index_span(grid.lons(), a.x.min(b.x).min(c.x), a.x.max(b.x).max(c.x))
    else {
        return;
    };
    let Some((y0, y1)) = index_span(grid.lats(), a.y.min(b.y).min(c.y), a.y.max(b.y).max(c.y))
    else {
        return;
    };

    for y in y0..=y1 {
        let py = grid.lats()[y];
        for x in x0..=x1 {
            let index = grid.index(y, x);
            if cells[index].is_some() {
                continue;
            }

            let px = grid.lons()[x];
            let l1 = ((b.y - c.y) * (px - c.x) + (c.x - b.x) * (py - c.y)) / det;
            let l2 = ((c.y - a.y) * (px - c.x) + (a.x - c.x) * (py - c.y)) / det;
            let l3 = 1.0 - l1 - l2;

            if l1 >= -BARYCENTRIC_EPSILON
                && l2 >= -BARYCENTRIC_EPSILON
                && l3 >= -BARYCENTRIC_EPSILON
            {
                cells[index] = Some(CellWeights {
                    nodes,
                    weights: [l1, l2, l3],
                });
            }
        }
    }
}

/// Inclusive index range of the ascending `coords` falling inside `[lo, hi]`,
/// widened by one cell on each side to absorb rounding.
fn index_span(coords: &[f64], lo: f64, hi: f64) -> Option<(usize, usize)> {
    let first = coords.partition_point(|&v| v < lo);
    let last = coords.partition_point(|&v| v <= hi);
    let start = first.saturating_sub(1);
    let end = (last + 1).min(coords.len());
    if start >= end {
        return None;
    }
    Some((start, end - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::AxisRange;

    fn unit_grid(resolution: f64) -> TargetGrid {
        TargetGrid::new(
            AxisRange { min: 0.0, max: 1.0 },
            AxisRange { min: 0.0, max: 1.0 },
            resolution,
        )
        .unwrap()
    }

    #[test]
    fn test_triangle_weights() {
        let grid = unit_grid(0.5);
        let lons = [0.0, 1.0, 0.0];
        let lats = [0.0, 0.0, 1.0];
        let weights = InterpolationWeights::build(&lons, &lats, &grid, |_| true);

        assert_eq!(weights.triangle_count(), 1);
        // (0.5, 0.5) sits on the hypotenuse.
        let cell = weights.cell(grid.index(1, 1)).unwrap();
        let sum: f64 = cell.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(weights.cell(grid.index(2, 2)).is_none());
        assert_eq!(weights.covered(), 6);
    }

    #[test]
    fn test_apply_linear_field_exact() {
        let grid = unit_grid(0.25);
        let lons = [0.0, 1.0, 1.0, 0.0];
        let lats = [0.0, 0.0, 1.0, 1.0];
        let weights = InterpolationWeights::build(&lons, &lats, &grid, |_| true);

        // f = 2x + 3y is reproduced exactly by linear interpolation.
        let values: Vec<f64> = lons.iter().zip(&lats).map(|(x, y)| 2.0 * x + 3.0 * y).collect();
        let out = weights.apply(&values, -1.0);
        assert_eq!(weights.covered(), grid.len());
        for y in 0..grid.ny() {
            for x in 0..grid.nx() {
                let expected = 2.0 * grid.lons()[x] + 3.0 * grid.lats()[y];
                let got = out[grid.index(y, x)] as f64;
                assert!((got - expected).abs() < 1e-5, "({}, {}): {}", y, x, got);
            }
        }
    }

    #[test]
    fn test_collinear_nodes_cover_nothing() {
        let grid = unit_grid(0.5);
        let lons = [0.0, 0.5, 1.0];
        let lats = [0.0, 0.5, 1.0];
        let weights = InterpolationWeights::build(&lons, &lats, &grid, |_| true);
        assert_eq!(weights.covered(), 0);
        assert!(weights.apply(&[1.0, 1.0, 1.0], 7.0).iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_excluded_nodes_shrink_hull() {
        let grid = unit_grid(0.5);
        let lons = [0.0, 1.0, 1.0, 0.0];
        let lats = [0.0, 0.0, 1.0, 1.0];
        let weights = InterpolationWeights::build(&lons, &lats, &grid, |i| i != 2);
        assert_eq!(weights.node_count(), 3);
        assert!(weights.cell(grid.index(2, 2)).is_none());
        assert!(weights.cell(grid.index(0, 0)).is_some());
    }

    #[test]
    fn test_index_span() {
        let coords = [0.0, 0.5, 1.0, 1.5];
        assert_eq!(index_span(&coords, 0.6, 0.9), Some((1, 2)));
        assert_eq!(index_span(&coords, 0.5, 1.0), Some((0, 3)));
        assert_eq!(index_span(&coords, 5.0, 6.0), Some((3, 3)));
    }
}
