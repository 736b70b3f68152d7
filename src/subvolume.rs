//! Sub-volumes - fixed-size trace neighborhoods around a traversal position

use crate::aoi::AreaOfInterest;
use crate::cache::LineCache;
use crate::error::{Result, SubVolumeError};
use crate::types::{Trace, TraceStatus};
use crate::utils::{offset_index, window_offset};
use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::sync::Arc;

/// Number of lines along each traversal axis in one sub-volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowShape {
    /// Cells along the primary (outer, slow) axis
    pub primary: usize,
    /// Cells along the secondary (inner, fast) axis
    pub secondary: usize,
}

impl WindowShape {
    pub fn new(primary: usize, secondary: usize) -> Self {
        Self { primary, secondary }
    }

    /// Square window
    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary == 0 || self.secondary == 0 {
            return Err(SubVolumeError::Configuration(format!(
                "Window must be at least 1x1, got {}x{}",
                self.primary, self.secondary
            )));
        }
        Ok(())
    }
}

impl Default for WindowShape {
    fn default() -> Self {
        Self::square(3)
    }
}

/// Traces around one traversal position, indexed `[volume][primary][secondary]`
///
/// Volume 0 is the primary volume, followed by the secondary volumes in the
/// order they were added. Every cell holds a trace; positions without data
/// hold Missing traces.
#[derive(Debug, Clone)]
pub struct SubVolume {
    traces: Array3<Trace>,
    center: (usize, usize),
    center_bin: (f64, f64),
}

impl SubVolume {
    pub(crate) fn new(traces: Array3<Trace>, center: (usize, usize), center_bin: (f64, f64)) -> Self {
        Self {
            traces,
            center,
            center_bin,
        }
    }

    /// `(volumes, primary, secondary)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.traces.dim()
    }

    pub fn num_volumes(&self) -> usize {
        self.traces.len_of(Axis(0))
    }

    pub fn get(&self, volume: usize, primary: usize, secondary: usize) -> Option<&Trace> {
        self.traces.get((volume, primary, secondary))
    }

    /// All cells
    pub fn traces(&self) -> &Array3<Trace> {
        &self.traces
    }

    pub fn into_traces(self) -> Array3<Trace> {
        self.traces
    }

    /// The `[primary][secondary]` plane of one volume
    pub fn volume(&self, volume: usize) -> ArrayView2<'_, Trace> {
        self.traces.index_axis(Axis(0), volume)
    }

    /// Traversal position `(primary_index, secondary_index)` of the center cell
    pub fn center(&self) -> (usize, usize) {
        self.center
    }

    /// Bin coordinates `(inline, xline)` of the center cell
    pub fn center_bin(&self) -> (f64, f64) {
        self.center_bin
    }

    /// The trace at the window center of a volume
    pub fn center_trace(&self, volume: usize) -> Option<&Trace> {
        let (_, primary, secondary) = self.shape();
        self.get(volume, primary / 2, secondary / 2)
    }

    pub fn missing_count(&self) -> usize {
        self.traces.iter().filter(|t| t.is_missing()).count()
    }

    /// Bit-for-bit equality of position and every cell
    pub fn same_bits(&self, other: &SubVolume) -> bool {
        self.center == other.center
            && self.center_bin.0.to_bits() == other.center_bin.0.to_bits()
            && self.center_bin.1.to_bits() == other.center_bin.1.to_bits()
            && self.shape() == other.shape()
            && self
                .traces
                .iter()
                .zip(other.traces.iter())
                .all(|(a, b)| a.same_bits(b))
    }
}

impl Index<(usize, usize, usize)> for SubVolume {
    type Output = Trace;

    fn index(&self, index: (usize, usize, usize)) -> &Trace {
        &self.traces[index]
    }
}

/// Builds sub-volumes from the lines held in a [`LineCache`]
pub(crate) struct WindowAssembler {
    pub(crate) window: WindowShape,
    pub(crate) num_volumes: usize,
    pub(crate) num_primary_lines: usize,
    pub(crate) num_secondary_lines: usize,
    pub(crate) missing: Trace,
    pub(crate) aoi: Option<Arc<dyn AreaOfInterest>>,
}

impl WindowAssembler {
    /// Assemble the window centered on `(primary_index, secondary_index)`
    pub(crate) fn assemble(
        &self,
        cache: &LineCache,
        primary_index: usize,
        secondary_index: usize,
        center_bin: (f64, f64),
    ) -> SubVolume {
        let shape = (self.num_volumes, self.window.primary, self.window.secondary);
        let traces = Array3::from_shape_fn(shape, |(volume, i, j)| {
            self.cell(cache, volume, primary_index, secondary_index, i, j)
        });
        SubVolume::new(traces, (primary_index, secondary_index), center_bin)
    }

    fn cell(
        &self,
        cache: &LineCache,
        volume: usize,
        primary_index: usize,
        secondary_index: usize,
        i: usize,
        j: usize,
    ) -> Trace {
        let line = offset_index(
            primary_index,
            window_offset(i, self.window.primary),
            self.num_primary_lines,
        );
        let position = offset_index(
            secondary_index,
            window_offset(j, self.window.secondary),
            self.num_secondary_lines,
        );

        let cached = line
            .zip(position)
            .and_then(|(line, position)| cache.get(volume, line)?.get(position));

        match cached {
            Some(trace) => match &self.aoi {
                Some(aoi) if !aoi.contains(trace.x(), trace.y()) => {
                    trace.with_status(TraceStatus::Missing)
                }
                _ => trace.clone(),
            },
            None => self.missing.clone(),
        }
    }
}
