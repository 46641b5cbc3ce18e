//! Core data types for gridded output.

use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// A time-stacked variable on the target grid, row-major `[time, y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegriddedField {
    pub variable: String,
    ny: usize,
    nx: usize,
    data: Vec<f32>,
}

impl RegriddedField {
    /// Empty field for a `ny` x `nx` grid.
    pub fn new(variable: impl Into<String>, ny: usize, nx: usize) -> Self {
        Self {
            variable: variable.into(),
            ny,
            nx,
            data: Vec::new(),
        }
    }

    /// Pre-allocate room for `steps` slices.
    pub fn with_capacity(variable: impl Into<String>, ny: usize, nx: usize, steps: usize) -> Self {
        Self {
            variable: variable.into(),
            ny,
            nx,
            data: Vec::with_capacity(steps * ny * nx),
        }
    }

    /// Build from a complete `[time, y, x]` buffer.
    pub fn from_data(variable: impl Into<String>, ny: usize, nx: usize, data: Vec<f32>) -> Result<Self> {
        let slice = ny * nx;
        if slice == 0 || data.len() % slice != 0 {
            return Err(GridProcessorError::invalid_metadata(format!(
                "buffer of {} values is not a whole number of {}x{} slices",
                data.len(),
                ny,
                nx
            )));
        }
        Ok(Self {
            variable: variable.into(),
            ny,
            nx,
            data,
        })
    }

    /// Append the next time slice.
    pub fn push_slice(&mut self, slice: &[f32]) -> Result<()> {
        if slice.len() != self.slice_len() {
            return Err(GridProcessorError::invalid_metadata(format!(
                "{} slice has {} values, expected {}",
                self.variable,
                slice.len(),
                self.slice_len()
            )));
        }
        self.data.extend_from_slice(slice);
        Ok(())
    }

    pub fn steps(&self) -> usize {
        if self.slice_len() == 0 {
            0
        } else {
            self.data.len() / self.slice_len()
        }
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn slice_len(&self) -> usize {
        self.ny * self.nx
    }

    /// `(time, y, x)` shape.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.steps(), self.ny, self.nx)
    }

    /// Values of one time step.
    pub fn slice(&self, t: usize) -> Option<&[f32]> {
        let n = self.slice_len();
        self.data.get(t * n..(t + 1) * n)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, t: usize, y: usize, x: usize) -> Option<f32> {
        if y >= self.ny || x >= self.nx {
            return None;
        }
        self.slice(t).map(|s| s[y * self.nx + x])
    }
}

/// An all-NaN field slice that was replaced by the fill value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoValidDataWarning {
    pub variable: String,
    /// Snapshot the slice came from, when known.
    pub snapshot: Option<String>,
    /// Time index of the slice, when known.
    pub time_index: Option<u64>,
}

impl NoValidDataWarning {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            snapshot: None,
            time_index: None,
        }
    }

    pub fn at(mut self, snapshot: impl Into<String>, time_index: u64) -> Self {
        self.snapshot = Some(snapshot.into());
        self.time_index = Some(time_index);
        self
    }
}

impl std::fmt::Display for NoValidDataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no valid data for {}", self.variable)?;
        if let Some(snapshot) = &self.snapshot {
            write!(f, " in {}", snapshot)?;
        }
        if let Some(t) = self.time_index {
            write!(f, " at time index {}", t)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read_slices() {
        let mut field = RegriddedField::new("U", 2, 3);
        field.push_slice(&[1.0; 6]).unwrap();
        field.push_slice(&[2.0, 2.0, 2.0, 2.0, 2.0, 9.0]).unwrap();
        assert_eq!(field.shape(), (2, 2, 3));
        assert_eq!(field.get(1, 1, 2), Some(9.0));
        assert_eq!(field.get(0, 2, 0), None);
        assert!(field.slice(2).is_none());
    }

    #[test]
    fn test_push_wrong_size() {
        let mut field = RegriddedField::new("U", 2, 3);
        assert!(field.push_slice(&[1.0; 5]).is_err());
        assert_eq!(field.steps(), 0);
    }

    #[test]
    fn test_warning_display() {
        let w = NoValidDataWarning::new("U").at("out2d_3.nc", 2);
        assert_eq!(w.to_string(), "no valid data for U in out2d_3.nc at time index 2");
    }
}
