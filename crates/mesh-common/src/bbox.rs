//! Longitude/latitude bounds.

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// Inclusive range along one axis (longitude or latitude), in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
}

impl AxisBounds {
    /// Create a range, rejecting inverted or non-finite limits.
    pub fn new(min: f64, max: f64) -> MeshResult<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(MeshError::InvalidBounds(format!(
                "non-finite range [{}, {}]",
                min, max
            )));
        }
        if min >= max {
            return Err(MeshError::InvalidBounds(format!(
                "min {} must be less than max {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Parse a "min,max" pair, as accepted on the command line.
    pub fn parse(s: &str) -> MeshResult<Self> {
        let (min, max) = s
            .split_once(',')
            .ok_or_else(|| MeshError::InvalidBounds(format!("expected 'min,max', got '{}'", s)))?;

        let min: f64 = min
            .trim()
            .parse()
            .map_err(|_| MeshError::InvalidBounds(format!("invalid number '{}'", min.trim())))?;
        let max: f64 = max
            .trim()
            .parse()
            .map_err(|_| MeshError::InvalidBounds(format!("invalid number '{}'", max.trim())))?;

        Self::new(min, max)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn from_axes(lon: AxisBounds, lat: AxisBounds) -> Self {
        Self::new(lon.min, lat.min, lon.max, lat.max)
    }

    pub fn lon(&self) -> AxisBounds {
        AxisBounds {
            min: self.min_lon,
            max: self.max_lon,
        }
    }

    pub fn lat(&self) -> AxisBounds {
        AxisBounds {
            min: self.min_lat,
            max: self.max_lat,
        }
    }

    /// Inclusive point test.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Compute the closed intersection of two boxes.
    ///
    /// Boxes that only touch along an edge intersect in a degenerate box,
    /// which is returned; disjoint boxes give `None`.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let min_lon = self.min_lon.max(other.min_lon);
        let min_lat = self.min_lat.max(other.min_lat);
        let max_lon = self.max_lon.min(other.max_lon);
        let max_lat = self.max_lat.min(other.max_lat);

        if min_lon > max_lon || min_lat > max_lat {
            return None;
        }

        Some(BoundingBox::new(min_lon, min_lat, max_lon, max_lat))
    }

    /// Extent of a set of points, skipping any with a non-finite coordinate.
    pub fn of_points(lons: &[f64], lats: &[f64]) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        for (&lon, &lat) in lons.iter().zip(lats) {
            if !lon.is_finite() || !lat.is_finite() {
                continue;
            }
            bbox = Some(match bbox {
                None => BoundingBox::new(lon, lat, lon, lat),
                Some(b) => BoundingBox::new(
                    b.min_lon.min(lon),
                    b.min_lat.min(lat),
                    b.max_lon.max(lon),
                    b.max_lat.max(lat),
                ),
            });
        }
        bbox
    }
}
