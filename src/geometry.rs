//! Survey geometry - bin axes, sampling and the bin/world transform

use crate::error::{Result, SubVolumeError};
use crate::types::{AxisRange, ZUnit};
use crate::utils::GRID_EPSILON;
use serde::{Deserialize, Serialize};

/// Affine mapping between (inline, crossline) bin coordinates and world (x, y)
///
/// `world = origin + inline * inline_step + xline * xline_step`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinTransform {
    pub origin: (f64, f64),
    pub inline_step: (f64, f64),
    pub xline_step: (f64, f64),
}

impl BinTransform {
    /// Create a transform, rejecting degenerate (non-invertible) grids
    pub fn new(origin: (f64, f64), inline_step: (f64, f64), xline_step: (f64, f64)) -> Result<Self> {
        let transform = Self {
            origin,
            inline_step,
            xline_step,
        };
        transform.validate()?;
        Ok(transform)
    }

    /// World x equals inline, world y equals crossline
    pub fn identity() -> Self {
        Self {
            origin: (0.0, 0.0),
            inline_step: (1.0, 0.0),
            xline_step: (0.0, 1.0),
        }
    }

    fn determinant(&self) -> f64 {
        self.inline_step.0 * self.xline_step.1 - self.xline_step.0 * self.inline_step.1
    }

    /// Check that the transform can be inverted
    pub fn validate(&self) -> Result<()> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < GRID_EPSILON * GRID_EPSILON {
            return Err(SubVolumeError::InvalidGeometry(
                "Bin transform is singular".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert bin coordinates to world coordinates
    pub fn bin_to_world(&self, inline: f64, xline: f64) -> (f64, f64) {
        (
            self.origin.0 + inline * self.inline_step.0 + xline * self.xline_step.0,
            self.origin.1 + inline * self.inline_step.1 + xline * self.xline_step.1,
        )
    }

    /// Convert world coordinates to (fractional) bin coordinates
    pub fn world_to_bin(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.origin.0;
        let dy = y - self.origin.1;
        let det = self.determinant();
        let inline = (dx * self.xline_step.1 - dy * self.xline_step.0) / det;
        let xline = (self.inline_step.0 * dy - self.inline_step.1 * dx) / det;
        (inline, xline)
    }
}

impl Default for BinTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Geometry of a regularly binned 3-D seismic volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeGeometry {
    /// Inline axis (bin coordinates)
    pub inline: AxisRange,

    /// Crossline axis (bin coordinates)
    pub xline: AxisRange,

    /// Vertical sample axis
    pub z: AxisRange,

    /// Unit of the vertical axis
    pub z_unit: ZUnit,

    /// Bin to world mapping
    pub transform: BinTransform,
}

impl VolumeGeometry {
    /// Create a new volume geometry with an identity bin transform
    pub fn new(inline: AxisRange, xline: AxisRange, z: AxisRange, z_unit: ZUnit) -> Result<Self> {
        let geometry = Self {
            inline,
            xline,
            z,
            z_unit,
            transform: BinTransform::identity(),
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Set the bin transform
    pub fn with_transform(mut self, transform: BinTransform) -> Result<Self> {
        transform.validate()?;
        self.transform = transform;
        Ok(self)
    }

    /// Check axes and transform; deserialized geometries should be validated
    pub fn validate(&self) -> Result<()> {
        for (name, axis) in [("inline", &self.inline), ("crossline", &self.xline), ("z", &self.z)] {
            if axis.delta == 0.0 || !axis.delta.is_finite() {
                return Err(SubVolumeError::InvalidGeometry(format!(
                    "{} axis delta must be non-zero and finite",
                    name
                )));
            }
            if axis.is_empty() {
                return Err(SubVolumeError::InvalidGeometry(format!(
                    "{} axis {} has no samples",
                    name, axis
                )));
            }
        }
        self.transform.validate()
    }

    pub fn num_inlines(&self) -> usize {
        self.inline.count()
    }

    pub fn num_xlines(&self) -> usize {
        self.xline.count()
    }

    pub fn num_samples(&self) -> usize {
        self.z.count()
    }

    /// Total number of traces in the volume
    pub fn num_traces(&self) -> usize {
        self.num_inlines() * self.num_xlines()
    }

    pub fn bin_to_world(&self, inline: f64, xline: f64) -> (f64, f64) {
        self.transform.bin_to_world(inline, xline)
    }

    pub fn world_to_bin(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.world_to_bin(x, y)
    }

    /// Check if a bin position lies on the volume grid
    pub fn contains_bin(&self, inline: f64, xline: f64) -> bool {
        self.inline.index_of(inline).is_some() && self.xline.index_of(xline).is_some()
    }

    /// Get a summary string of the geometry
    pub fn summary(&self) -> String {
        format!(
            "{} inlines ({}) x {} crosslines ({}) x {} samples ({} {})",
            self.num_inlines(),
            self.inline,
            self.num_xlines(),
            self.xline,
            self.num_samples(),
            self.z,
            self.z_unit
        )
    }
}
