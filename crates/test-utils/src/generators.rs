//! Synthetic mesh and field generators.
//!
//! The generated values follow simple closed-form patterns so interpolated
//! results can be checked exactly: linear fields are reproduced exactly by
//! barycentric interpolation inside the hull.

use mesh_common::{FieldSample, NodeCloud};

/// Four nodes at the corners of the unit square with depths 1, 2, 3, 4.
///
/// Node order: (0,0), (1,0), (0,1), (1,1).
pub fn unit_square_mesh() -> NodeCloud {
    NodeCloud::new(
        vec![0.0, 1.0, 0.0, 1.0],
        vec![0.0, 0.0, 1.0, 1.0],
        vec![1.0, 2.0, 3.0, 4.0],
    )
    .expect("corner mesh is consistent")
}

/// Regular lattice of `nx * ny` nodes covering `[lon0, lon1] x [lat0, lat1]`,
/// row-major from the south-west corner, with depth `10 + lon + lat`.
pub fn lattice_mesh(nx: usize, ny: usize, lon: (f64, f64), lat: (f64, f64)) -> NodeCloud {
    assert!(nx >= 2 && ny >= 2, "lattice needs at least 2x2 nodes");
    let dx = (lon.1 - lon.0) / (nx - 1) as f64;
    let dy = (lat.1 - lat.0) / (ny - 1) as f64;

    let mut lons = Vec::with_capacity(nx * ny);
    let mut lats = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            lons.push(lon.0 + i as f64 * dx);
            lats.push(lat.0 + j as f64 * dy);
        }
    }
    let depths = lons.iter().zip(&lats).map(|(x, y)| 10.0 + x + y).collect();
    NodeCloud::new(lons, lats, depths).expect("lattice mesh is consistent")
}

/// Evaluate `a + b*lon + c*lat` at every node.
pub fn linear_field(cloud: &NodeCloud, variable: &str, a: f64, b: f64, c: f64) -> FieldSample {
    let values = cloud
        .lons()
        .iter()
        .zip(cloud.lats())
        .map(|(x, y)| a + b * x + c * y)
        .collect();
    FieldSample::new(variable, values)
}

/// A field of `n` NaN values.
pub fn nan_field(variable: &str, n: usize) -> FieldSample {
    FieldSample::new(variable, vec![f64::NAN; n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_mesh_layout() {
        let cloud = lattice_mesh(3, 2, (0.0, 1.0), (10.0, 11.0));
        assert_eq!(cloud.len(), 6);
        assert_eq!(cloud.lons()[..3], [0.0, 0.5, 1.0]);
        assert_eq!(cloud.lats()[3], 11.0);
        assert_eq!(cloud.depths()[0], 20.0);
    }

    #[test]
    fn test_linear_field() {
        let cloud = unit_square_mesh();
        let field = linear_field(&cloud, "U", 1.0, 2.0, 3.0);
        assert_eq!(field.values, vec![1.0, 3.0, 4.0, 6.0]);
    }
}
