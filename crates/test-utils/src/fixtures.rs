//! Common test fixtures.

/// Lon/lat windows as `(min, max)` pairs.
pub mod window {
    /// Window used for the synthetic five-snapshot series.
    pub const LON: (f64, f64) = (0.0, 1.0);
    pub const LAT: (f64, f64) = (0.0, 1.0);

    /// A window that misses every generated mesh.
    pub const DISJOINT_LON: (f64, f64) = (50.0, 51.0);
}

/// Time constants matching the default time axis.
pub mod time {
    /// Default epoch, `2024-01-01T00:00:00Z`.
    pub const EPOCH: &str = "2024-01-01T00:00:00Z";

    /// Default step between instants.
    pub const STEP_SECONDS: u64 = 3600;

    pub const HOUR_UNITS: &str = "hours since 2024-01-01 00:00:00";
    pub const SECOND_UNITS: &str = "seconds since 2024-01-01 00:00:00";
}

/// SCHISM 2-D output names.
pub mod schism {
    pub const NODE_DIM: &str = "nSCHISM_hgrid_node";
    pub const NODE_X: &str = "SCHISM_hgrid_node_x";
    pub const NODE_Y: &str = "SCHISM_hgrid_node_y";
    pub const DEPTH: &str = "depth";
    pub const TIME: &str = "time";
    pub const VEL_X: &str = "depthAverageVelX";
    pub const VEL_Y: &str = "depthAverageVelY";
    pub const ELEVATION: &str = "elevation";
}
