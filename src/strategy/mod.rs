//! Traversal strategies
//!
//! A traversal is the composition of two independent choices:
//!
//! - [`ScanOrder`]: which bin axis is the outer (primary) line axis. Lines
//!   along the primary axis are the unit of batch reads and caching.
//! - [`ExecutionMode`]: whether reads happen on the caller's thread
//!   ([`sync`]) or on a dedicated read-ahead thread ([`background`]).
//!
//! Both modes share a [`TraversalPlan`] that knows how to read a line from
//! every volume and how to assemble a window from the line cache.

pub(crate) mod background;
pub(crate) mod sync;

use crate::aoi::AreaOfInterest;
use crate::cache::LineCache;
use crate::error::{Result, SubVolumeError};
use crate::range::TraversalRange;
use crate::subvolume::{SubVolume, WindowAssembler, WindowShape};
use crate::types::{AxisRange, MissingFill, Trace};
use crate::utils::{percent, step_count};
use crate::volume::Volume;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Which bin axis is traversed as the outer (slow) axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ScanOrder {
    /// Inline lines, crosslines fastest
    #[default]
    PrimaryMajor,
    /// Crossline lines, inlines fastest
    SecondaryMajor,
}

impl ScanOrder {
    /// Name of the primary (line) axis
    pub fn line_axis_name(&self) -> &'static str {
        match self {
            ScanOrder::PrimaryMajor => "inline",
            ScanOrder::SecondaryMajor => "crossline",
        }
    }

    /// Map (primary, secondary) axis coordinates to (inline, xline)
    pub fn to_bin(&self, primary: f64, secondary: f64) -> (f64, f64) {
        match self {
            ScanOrder::PrimaryMajor => (primary, secondary),
            ScanOrder::SecondaryMajor => (secondary, primary),
        }
    }

    /// Split a traversal range into (primary, secondary) axes
    pub fn axes(&self, range: &TraversalRange) -> (AxisRange, AxisRange) {
        match self {
            ScanOrder::PrimaryMajor => (range.inline, range.xline),
            ScanOrder::SecondaryMajor => (range.xline, range.inline),
        }
    }
}

impl FromStr for ScanOrder {
    type Err = SubVolumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" | "primary_major" => Ok(ScanOrder::PrimaryMajor),
            "crossline" | "xline" | "secondary_major" => Ok(ScanOrder::SecondaryMajor),
            other => Err(SubVolumeError::Configuration(format!(
                "Unknown scan order: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ScanOrder {
    type Error = SubVolumeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ScanOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.line_axis_name())
    }
}

/// Where line reads are performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ExecutionMode {
    /// Each pull reads and assembles on the caller's thread
    #[default]
    Synchronous,
    /// A dedicated thread reads ahead into a bounded buffer
    Background,
}

impl FromStr for ExecutionMode {
    type Err = SubVolumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synchronous" | "sync" => Ok(ExecutionMode::Synchronous),
            "background" | "threaded" => Ok(ExecutionMode::Background),
            other => Err(SubVolumeError::Configuration(format!(
                "Unknown execution mode: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ExecutionMode {
    type Error = SubVolumeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Shared flag asking a traversal to stop
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Progress of a traversal, readable from any thread without pulling
pub(crate) struct TraversalStatus {
    position: AtomicUsize,
    total: usize,
    done: AtomicBool,
    completed: AtomicBool,
    message: Mutex<String>,
}

impl TraversalStatus {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            position: AtomicUsize::new(0),
            total,
            done: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            message: Mutex::new("Not started".to_string()),
        }
    }

    pub(crate) fn set_position(&self, position: usize) {
        self.position.store(position, Ordering::Release);
    }

    pub(crate) fn set_message(&self, message: impl Into<String>) {
        *self.message.lock() = message.into();
    }

    /// Mark the traversal over; `completed` when it reached the end normally
    pub(crate) fn finish(&self, completed: bool) {
        if completed {
            self.position.store(self.total, Ordering::Release);
            self.completed.store(true, Ordering::Release);
        }
        self.done.store(true, Ordering::Release);
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) fn completion(&self) -> f64 {
        percent(self.position.load(Ordering::Acquire), self.total)
    }

    pub(crate) fn message(&self) -> String {
        self.message.lock().clone()
    }
}

/// A running traversal, pulled one sub-volume at a time
pub(crate) trait Traversal: Send {
    /// Next sub-volume in raster order, `None` once the traversal is over
    fn next_subvolume(&mut self) -> Result<Option<SubVolume>>;

    /// Progress block shared with observers
    fn status(&self) -> &Arc<TraversalStatus>;

    /// Release resources; further pulls return `None`
    fn close(&mut self);

    /// Percentage of the traversal completed
    fn completion(&self) -> f64 {
        self.status().completion()
    }

    /// Human readable status
    fn message(&self) -> String {
        self.status().message()
    }
}

/// Everything a strategy needs to read lines and assemble windows
pub(crate) struct TraversalPlan {
    scan_order: ScanOrder,
    volumes: Vec<Arc<dyn Volume>>,
    primary_axis: AxisRange,
    secondary_axis: AxisRange,
    z_start: f64,
    z_end: f64,
    assembler: WindowAssembler,
}

impl TraversalPlan {
    pub(crate) fn new(
        scan_order: ScanOrder,
        volumes: Vec<Arc<dyn Volume>>,
        range: &TraversalRange,
        window: WindowShape,
        z_range: (f64, f64),
        aoi: Option<Arc<dyn AreaOfInterest>>,
        fill: MissingFill,
    ) -> Self {
        let (primary_axis, secondary_axis) = scan_order.axes(range);
        let (z_start, z_end) = z_range;

        let z_axis = volumes[0].z_axis();
        let num_samples = step_count(z_start, z_end, z_axis.delta);
        let missing = Trace::missing(z_start, z_axis.delta, volumes[0].z_unit(), num_samples, fill);

        let assembler = WindowAssembler {
            window,
            num_volumes: volumes.len(),
            num_primary_lines: primary_axis.count(),
            num_secondary_lines: secondary_axis.count(),
            missing,
            aoi,
        };

        Self {
            scan_order,
            volumes,
            primary_axis,
            secondary_axis,
            z_start,
            z_end,
            assembler,
        }
    }

    pub(crate) fn num_volumes(&self) -> usize {
        self.volumes.len()
    }

    pub(crate) fn num_primary_lines(&self) -> usize {
        self.primary_axis.count()
    }

    pub(crate) fn num_secondary_lines(&self) -> usize {
        self.secondary_axis.count()
    }

    pub(crate) fn window(&self) -> WindowShape {
        self.assembler.window
    }

    /// Samples every trace of a sub-volume carries
    pub(crate) fn num_samples(&self) -> usize {
        self.assembler.missing.num_samples()
    }

    pub(crate) fn primary_name(&self) -> &str {
        self.volumes[0].name()
    }

    /// Bin coordinates `(inline, xline)` of a traversal position
    pub(crate) fn bin_at(&self, primary_index: usize, secondary_index: usize) -> (f64, f64) {
        self.scan_order.to_bin(
            self.primary_axis.coord(primary_index),
            self.secondary_axis.coord(secondary_index),
        )
    }

    /// Inline and crossline coordinate arrays of every trace on a line
    fn line_bins(&self, line: usize) -> (Vec<f64>, Vec<f64>) {
        (0..self.num_secondary_lines())
            .map(|s| self.bin_at(line, s))
            .unzip()
    }

    /// Check if any trace position on a line falls inside the AOI
    ///
    /// Always true without an AOI.
    pub(crate) fn line_intersects_aoi(&self, line: usize) -> bool {
        let Some(aoi) = &self.assembler.aoi else {
            return true;
        };
        let geometry = self.volumes[0].geometry();
        (0..self.num_secondary_lines()).any(|s| {
            let (inline, xline) = self.bin_at(line, s);
            let (x, y) = geometry.bin_to_world(inline, xline);
            aoi.contains(x, y)
        })
    }

    /// Read one line from every volume into the cache
    pub(crate) fn read_line(&self, cache: &mut LineCache, line: usize) -> Result<()> {
        let (inlines, xlines) = self.line_bins(line);
        for (slot, volume) in self.volumes.iter().enumerate() {
            let traces = volume.read_lines(&inlines, &xlines, self.z_start, self.z_end)?;
            if traces.len() != inlines.len() {
                return Err(SubVolumeError::volume_read(
                    volume.name(),
                    format!(
                        "requested {} traces for {} {}, got {}",
                        inlines.len(),
                        self.scan_order.line_axis_name(),
                        self.primary_axis.coord(line),
                        traces.len()
                    ),
                ));
            }
            let expected = self.num_samples();
            if let Some(trace) = traces.iter().find(|t| t.num_samples() != expected) {
                return Err(SubVolumeError::volume_read(
                    volume.name(),
                    format!(
                        "expected {} samples per trace on {} {}, got {}",
                        expected,
                        self.scan_order.line_axis_name(),
                        self.primary_axis.coord(line),
                        trace.num_samples()
                    ),
                ));
            }
            cache.put(slot, line, traces);
        }
        debug!(
            volume = %self.primary_name(),
            axis = self.scan_order.line_axis_name(),
            line,
            coord = self.primary_axis.coord(line),
            "read line"
        );
        Ok(())
    }

    pub(crate) fn evict_line(&self, cache: &mut LineCache, line: usize) {
        for slot in 0..self.num_volumes() {
            cache.evict(slot, line);
        }
    }

    pub(crate) fn assemble(
        &self,
        cache: &LineCache,
        primary_index: usize,
        secondary_index: usize,
    ) -> SubVolume {
        let center_bin = self.bin_at(primary_index, secondary_index);
        self.assembler
            .assemble(cache, primary_index, secondary_index, center_bin)
    }

    /// Status line for the given primary line, e.g. "Scanning inline 104 (3 of 6)"
    pub(crate) fn progress_message(&self, primary_index: usize) -> String {
        format!(
            "Scanning {} {} ({} of {})",
            self.scan_order.line_axis_name(),
            self.primary_axis.coord(primary_index),
            primary_index + 1,
            self.num_primary_lines()
        )
    }
}
