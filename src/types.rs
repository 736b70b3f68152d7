//! Core data types for sub-volume iteration

use crate::utils::{step_count, GRID_EPSILON};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unit of the vertical (sample) axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZUnit {
    /// Two-way time in milliseconds
    Milliseconds,
    /// Two-way time in seconds
    Seconds,
    /// Depth in meters
    Meters,
    /// Depth in feet
    Feet,
}

impl ZUnit {
    /// Check if this is a time domain unit
    pub fn is_time(&self) -> bool {
        matches!(self, ZUnit::Milliseconds | ZUnit::Seconds)
    }

    /// Short label (e.g., "ms", "m")
    pub fn symbol(&self) -> &'static str {
        match self {
            ZUnit::Milliseconds => "ms",
            ZUnit::Seconds => "s",
            ZUnit::Meters => "m",
            ZUnit::Feet => "ft",
        }
    }
}

impl fmt::Display for ZUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Whether a trace holds real data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceStatus {
    Present,
    Missing,
}

/// Value used to fill the samples of synthesized Missing traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFill {
    #[default]
    Nan,
    Zero,
}

impl MissingFill {
    pub fn value(&self) -> f32 {
        match self {
            MissingFill::Nan => f32::NAN,
            MissingFill::Zero => 0.0,
        }
    }
}

/// One seismic sample sequence at a single (x, y) position
///
/// Samples are shared, so cloning a trace into many overlapping
/// sub-volumes does not copy the sample data. The status of a trace is
/// changed by re-tagging a copy with [`Trace::with_status`].
#[derive(Debug, Clone)]
pub struct Trace {
    x: f64,
    y: f64,
    z_start: f64,
    z_delta: f64,
    z_unit: ZUnit,
    samples: Arc<[f32]>,
    status: TraceStatus,
}

impl Trace {
    /// Create a present trace
    pub fn new(
        x: f64,
        y: f64,
        z_start: f64,
        z_delta: f64,
        z_unit: ZUnit,
        samples: impl Into<Arc<[f32]>>,
    ) -> Self {
        Self {
            x,
            y,
            z_start,
            z_delta,
            z_unit,
            samples: samples.into(),
            status: TraceStatus::Present,
        }
    }

    /// Create a Missing trace with NaN position and `num_samples` fill values
    pub fn missing(
        z_start: f64,
        z_delta: f64,
        z_unit: ZUnit,
        num_samples: usize,
        fill: MissingFill,
    ) -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
            z_start,
            z_delta,
            z_unit,
            samples: vec![fill.value(); num_samples].into(),
            status: TraceStatus::Missing,
        }
    }

    /// Copy of this trace sharing the same samples, tagged with `status`
    pub fn with_status(&self, status: TraceStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Same trace placed at a known world position
    pub fn at_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z_start(&self) -> f64 {
        self.z_start
    }

    pub fn z_delta(&self) -> f64 {
        self.z_delta
    }

    pub fn z_unit(&self) -> ZUnit {
        self.z_unit
    }

    /// Z value of the last sample
    pub fn z_end(&self) -> f64 {
        if self.samples.is_empty() {
            self.z_start
        } else {
            self.z_start + (self.samples.len() - 1) as f64 * self.z_delta
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn status(&self) -> TraceStatus {
        self.status
    }

    pub fn is_missing(&self) -> bool {
        self.status == TraceStatus::Missing
    }

    /// Bit-for-bit equality, treating NaN payloads as ordinary values
    pub fn same_bits(&self, other: &Trace) -> bool {
        self.status == other.status
            && self.z_unit == other.z_unit
            && self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.z_start.to_bits() == other.z_start.to_bits()
            && self.z_delta.to_bits() == other.z_delta.to_bits()
            && self.samples.len() == other.samples.len()
            && self
                .samples
                .iter()
                .zip(other.samples.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// A regularly sampled axis: `start`, `end` (inclusive) and signed `delta`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: f64,
    pub end: f64,
    pub delta: f64,
}

impl AxisRange {
    /// Create a new axis range
    pub fn new(start: f64, end: f64, delta: f64) -> Self {
        Self { start, end, delta }
    }

    /// A range with no grid points
    pub fn empty(delta: f64) -> Self {
        Self {
            start: 0.0,
            end: -delta,
            delta,
        }
    }

    /// Number of grid points, `1 + round((end - start) / delta)` floored at zero
    pub fn count(&self) -> usize {
        step_count(self.start, self.end, self.delta)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Coordinate of grid point `index`
    pub fn coord(&self, index: usize) -> f64 {
        self.start + index as f64 * self.delta
    }

    /// All grid coordinates in start→end order
    pub fn coords(&self) -> Vec<f64> {
        (0..self.count()).map(|i| self.coord(i)).collect()
    }

    /// Smallest coordinate covered by the range
    pub fn min(&self) -> f64 {
        self.start.min(self.end)
    }

    /// Largest coordinate covered by the range
    pub fn max(&self) -> f64 {
        self.start.max(self.end)
    }

    /// Index of the grid point at `coord`, if it lies on the grid
    pub fn index_of(&self, coord: f64) -> Option<usize> {
        if self.delta == 0.0 {
            return (coord == self.start && self.count() > 0).then_some(0);
        }

        let position = (coord - self.start) / self.delta;
        let nearest = position.round();
        if (position - nearest).abs() > GRID_EPSILON || nearest < 0.0 {
            return None;
        }

        let index = nearest as usize;
        (index < self.count()).then_some(index)
    }

    /// Check if `coord` lies inside `[min, max]`
    pub fn contains_coord(&self, coord: f64) -> bool {
        coord >= self.min() - GRID_EPSILON && coord <= self.max() + GRID_EPSILON
    }
}

impl fmt::Display for AxisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={} step {}", self.start, self.end, self.delta)
    }
}
