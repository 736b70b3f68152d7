//! Sub-volume iterator - main API for traversing seismic volumes

use crate::aoi::AreaOfInterest;
use crate::config::IteratorConfig;
use crate::error::{Result, SubVolumeError};
use crate::range::TraversalRange;
use crate::strategy::background::BackgroundTraversal;
use crate::strategy::sync::SynchronousTraversal;
use crate::strategy::{
    CancellationToken, ExecutionMode, ScanOrder, Traversal, TraversalPlan, TraversalStatus,
};
use crate::subvolume::{SubVolume, WindowShape};
use crate::utils::{step_count, GRID_EPSILON};
use crate::volume::Volume;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for [`SubVolumeIterator`]
pub struct SubVolumeIteratorBuilder {
    primary: Arc<dyn Volume>,
    secondaries: Vec<Arc<dyn Volume>>,
    aoi: Option<Arc<dyn AreaOfInterest>>,
    z_range: Option<(f64, f64)>,
    config: IteratorConfig,
}

impl SubVolumeIteratorBuilder {
    fn new(primary: Arc<dyn Volume>) -> Self {
        Self {
            primary,
            secondaries: Vec::new(),
            aoi: None,
            z_range: None,
            config: IteratorConfig::default(),
        }
    }

    /// Restrict the traversal to an area of interest
    pub fn with_aoi(mut self, aoi: Arc<dyn AreaOfInterest>) -> Self {
        self.aoi = Some(aoi);
        self
    }

    /// Add a co-registered volume; its traces follow the primary's in each sub-volume
    pub fn with_secondary(mut self, volume: Arc<dyn Volume>) -> Self {
        self.secondaries.push(volume);
        self
    }

    /// Read samples between `z_start` and `z_end` instead of the default range
    pub fn with_z_range(mut self, z_start: f64, z_end: f64) -> Self {
        self.z_range = Some((z_start, z_end));
        self
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: IteratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_scan_order(mut self, scan_order: ScanOrder) -> Self {
        self.config.scan_order = scan_order;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.config.execution_mode = mode;
        self
    }

    pub fn with_window(mut self, window: WindowShape) -> Self {
        self.config.window = window;
        self
    }

    /// Set the read-ahead increments used by the background mode
    pub fn with_steps(mut self, primary_step: usize, secondary_step: usize) -> Self {
        self.config.primary_step = primary_step;
        self.config.secondary_step = secondary_step;
        self
    }

    /// Z range precedence: explicit, then the AOI's, then the whole volume
    fn resolve_z_range(&self) -> Result<(f64, f64)> {
        let z_axis = self.primary.z_axis();
        let (z_start, z_end) = self
            .z_range
            .or_else(|| self.aoi.as_ref().and_then(|aoi| aoi.z_range()))
            .unwrap_or((z_axis.start, z_axis.end));

        if !z_start.is_finite() || !z_end.is_finite() || step_count(z_start, z_end, z_axis.delta) == 0 {
            return Err(SubVolumeError::Configuration(format!(
                "Z range {}..{} is empty for sample interval {}",
                z_start, z_end, z_axis.delta
            )));
        }
        Ok((z_start, z_end))
    }

    /// Validate the setup and start the traversal
    pub fn build(self) -> Result<SubVolumeIterator> {
        self.config.validate()?;
        let z_range = self.resolve_z_range()?;

        let primary_geometry = self.primary.geometry();
        for secondary in &self.secondaries {
            let geometry = secondary.geometry();
            if geometry.z_unit != primary_geometry.z_unit
                || (geometry.z.delta - primary_geometry.z.delta).abs() > GRID_EPSILON
            {
                return Err(SubVolumeError::Configuration(format!(
                    "Volume {} samples every {} {}, primary {} samples every {} {}",
                    secondary.name(),
                    geometry.z.delta,
                    geometry.z_unit.symbol(),
                    self.primary.name(),
                    primary_geometry.z.delta,
                    primary_geometry.z_unit.symbol()
                )));
            }
            if geometry.inline != primary_geometry.inline || geometry.xline != primary_geometry.xline {
                warn!(
                    primary = %self.primary.name(),
                    secondary = %secondary.name(),
                    "secondary volume bin grid differs from primary, off-grid traces will be missing"
                );
            }
        }

        let range = TraversalRange::compute(primary_geometry, self.aoi.as_deref());
        let config = self.config;
        let mut volumes = Vec::with_capacity(1 + self.secondaries.len());
        volumes.push(Arc::clone(&self.primary));
        volumes.extend(self.secondaries);

        let shape = (volumes.len(), config.window.primary, config.window.secondary);
        let plan = TraversalPlan::new(
            config.scan_order,
            volumes,
            &range,
            config.window,
            z_range,
            self.aoi,
            config.missing_fill,
        );

        info!(
            volume = %self.primary.name(),
            scan_order = %config.scan_order,
            mode = ?config.execution_mode,
            inlines = range.num_inlines(),
            xlines = range.num_xlines(),
            "starting sub-volume traversal"
        );

        let cancel = CancellationToken::new();
        let traversal: Box<dyn Traversal> = match config.execution_mode {
            ExecutionMode::Synchronous => Box::new(SynchronousTraversal::new(plan)),
            ExecutionMode::Background => {
                Box::new(BackgroundTraversal::spawn(plan, &config, cancel.clone())?)
            }
        };

        let status = Arc::clone(traversal.status());
        Ok(SubVolumeIterator {
            status,
            state: Mutex::new(IteratorState {
                traversal,
                pending: None,
                exhausted: false,
            }),
            cancel,
            range,
            shape,
            config,
        })
    }
}

struct IteratorState {
    traversal: Box<dyn Traversal>,
    pending: Option<Result<SubVolume>>,
    exhausted: bool,
}

impl IteratorState {
    /// Pull one element ahead so `has_next` can answer without consuming it
    fn fill(&mut self, cancel: &CancellationToken) {
        if self.pending.is_some() || self.exhausted {
            return;
        }
        if cancel.is_cancelled() {
            self.traversal.close();
            self.pending = Some(Err(SubVolumeError::Cancelled));
            self.exhausted = true;
            return;
        }
        match self.traversal.next_subvolume() {
            Ok(Some(subvolume)) => self.pending = Some(Ok(subvolume)),
            Ok(None) => self.exhausted = true,
            Err(err) => {
                self.pending = Some(Err(err));
                self.exhausted = true;
            }
        }
    }
}

/// Pull-based traversal over one primary and any number of secondary volumes
///
/// Every sub-volume has the shape `[volumes][window.primary][window.secondary]`
/// and they arrive in raster order. All methods take `&self`. Pulls are
/// serialized internally; [`message`](Self::message) and
/// [`completion`](Self::completion) read a shared progress block and never
/// wait on a pull, so a progress thread can poll them while another thread
/// is blocked in [`next_subvolume`](Self::next_subvolume). Dropping the
/// iterator stops any background reader.
///
/// # Example
///
/// ```rust,ignore
/// use seismic_subvolume::{ExecutionMode, SubVolumeIterator, WindowShape};
///
/// let iterator = SubVolumeIterator::builder(volume)
///     .with_window(WindowShape::square(5))
///     .with_execution_mode(ExecutionMode::Background)
///     .build()?;
///
/// while iterator.has_next() {
///     let subvolume = iterator.next_subvolume()?;
///     // ...
/// }
/// ```
pub struct SubVolumeIterator {
    state: Mutex<IteratorState>,
    status: Arc<TraversalStatus>,
    cancel: CancellationToken,
    range: TraversalRange,
    shape: (usize, usize, usize),
    config: IteratorConfig,
}

impl SubVolumeIterator {
    /// Start building an iterator over `primary`
    pub fn builder(primary: Arc<dyn Volume>) -> SubVolumeIteratorBuilder {
        SubVolumeIteratorBuilder::new(primary)
    }

    /// True while another sub-volume (or a pending error) can be pulled
    pub fn has_next(&self) -> bool {
        let mut state = self.state.lock();
        state.fill(&self.cancel);
        state.pending.is_some()
    }

    /// Pull the next sub-volume
    ///
    /// Fails with [`SubVolumeError::Exhausted`] once the traversal is over,
    /// and surfaces volume read failures from either execution mode.
    pub fn next_subvolume(&self) -> Result<SubVolume> {
        let mut state = self.state.lock();
        state.fill(&self.cancel);
        state.pending.take().unwrap_or(Err(SubVolumeError::Exhausted))
    }

    /// Human readable status of the traversal
    pub fn message(&self) -> String {
        self.status.message()
    }

    /// Percentage of the traversal completed
    pub fn completion(&self) -> f64 {
        self.status.completion()
    }

    /// Stop the traversal and release its reader thread, if any
    pub fn close(&self) {
        self.cancel.cancel();
        let mut state = self.state.lock();
        state.traversal.close();
        state.pending = None;
        state.exhausted = true;
    }

    /// Token that cancels this traversal from another thread
    ///
    /// A consumer blocked in [`next_subvolume`](Self::next_subvolume)
    /// notices the cancellation within one poll interval.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Inline and crossline bounds being traversed
    pub fn range(&self) -> &TraversalRange {
        &self.range
    }

    /// Shape `(volumes, primary, secondary)` of every sub-volume
    pub fn subvolume_shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    pub fn config(&self) -> &IteratorConfig {
        &self.config
    }
}

impl Iterator for SubVolumeIterator {
    type Item = Result<SubVolume>;

    fn next(&mut self) -> Option<Self::Item> {
        let state = self.state.get_mut();
        state.fill(&self.cancel);
        state.pending.take()
    }
}

impl Drop for SubVolumeIterator {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.state.get_mut().traversal.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aoi::{Extent, RectangleAoi};
    use crate::geometry::VolumeGeometry;
    use crate::types::{AxisRange, ZUnit};
    use crate::volume::MemoryVolume;

    fn create_volume() -> Arc<dyn Volume> {
        let geometry = VolumeGeometry::new(
            AxisRange::new(100.0, 110.0, 2.0),
            AxisRange::new(200.0, 206.0, 2.0),
            AxisRange::new(0.0, 40.0, 4.0),
            ZUnit::Milliseconds,
        )
        .unwrap();
        Arc::new(MemoryVolume::from_fn("test", geometry, |(i, j, k)| {
            (i * 100 + j * 10 + k) as f32
        }))
    }

    #[test]
    fn test_exhausted_after_last() {
        let iterator = SubVolumeIterator::builder(create_volume()).build().unwrap();
        let mut count = 0;
        while iterator.has_next() {
            iterator.next_subvolume().unwrap();
            count += 1;
        }
        assert_eq!(count, 24);
        assert!(!iterator.has_next());
        assert!(matches!(
            iterator.next_subvolume(),
            Err(SubVolumeError::Exhausted)
        ));
    }

    #[test]
    fn test_next_without_has_next() {
        let iterator = SubVolumeIterator::builder(create_volume()).build().unwrap();
        for _ in 0..24 {
            assert!(iterator.next_subvolume().is_ok());
        }
        assert!(iterator.next_subvolume().is_err());
    }

    #[test]
    fn test_has_next_does_not_consume() {
        let iterator = SubVolumeIterator::builder(create_volume()).build().unwrap();
        assert!(iterator.has_next());
        assert!(iterator.has_next());
        assert_eq!(iterator.next_subvolume().unwrap().center(), (0, 0));
    }

    #[test]
    fn test_z_range_from_aoi() {
        let aoi = RectangleAoi::new(Extent::new(0.0, 1000.0, 0.0, 1000.0)).with_z_range(8.0, 16.0);
        let iterator = SubVolumeIterator::builder(create_volume())
            .with_aoi(Arc::new(aoi))
            .build()
            .unwrap();
        let sub = iterator.next_subvolume().unwrap();
        assert_eq!(sub[(0, 1, 1)].num_samples(), 3);
        assert_eq!(sub[(0, 1, 1)].samples(), &[2.0, 3.0, 4.0]);
        assert_eq!(sub[(0, 0, 0)].num_samples(), 3);
    }

    #[test]
    fn test_explicit_z_range_wins() {
        let aoi = RectangleAoi::new(Extent::new(0.0, 1000.0, 0.0, 1000.0)).with_z_range(8.0, 16.0);
        let iterator = SubVolumeIterator::builder(create_volume())
            .with_aoi(Arc::new(aoi))
            .with_z_range(0.0, 4.0)
            .build()
            .unwrap();
        let sub = iterator.next_subvolume().unwrap();
        assert_eq!(sub[(0, 1, 1)].samples(), &[0.0, 1.0]);
    }

    #[test]
    fn test_rejects_inverted_z_range() {
        let result = SubVolumeIterator::builder(create_volume())
            .with_z_range(40.0, 0.0)
            .build();
        assert!(matches!(result, Err(SubVolumeError::Configuration(_))));
    }

    fn create_volume_sampled(name: &str, z: AxisRange, z_unit: ZUnit) -> Arc<dyn Volume> {
        let geometry = VolumeGeometry::new(
            AxisRange::new(100.0, 110.0, 2.0),
            AxisRange::new(200.0, 206.0, 2.0),
            z,
            z_unit,
        )
        .unwrap();
        Arc::new(MemoryVolume::from_fn(name, geometry, |_| 0.0))
    }

    #[test]
    fn test_rejects_secondary_with_other_sampling() {
        let finer = create_volume_sampled("finer", AxisRange::new(0.0, 40.0, 2.0), ZUnit::Milliseconds);
        let result = SubVolumeIterator::builder(create_volume())
            .with_secondary(finer)
            .build();
        match result {
            Err(SubVolumeError::Configuration(message)) => assert!(message.contains("finer")),
            _ => panic!("expected a configuration error"),
        }

        let depth = create_volume_sampled("depth", AxisRange::new(0.0, 40.0, 4.0), ZUnit::Meters);
        let result = SubVolumeIterator::builder(create_volume())
            .with_secondary(depth)
            .build();
        assert!(matches!(result, Err(SubVolumeError::Configuration(_))));
    }

    #[test]
    fn test_secondary_with_shorter_z_axis_keeps_sample_count() {
        let shorter = create_volume_sampled("shorter", AxisRange::new(0.0, 20.0, 4.0), ZUnit::Milliseconds);
        let iterator = SubVolumeIterator::builder(create_volume())
            .with_secondary(shorter)
            .build()
            .unwrap();
        for sub in iterator {
            let sub = sub.unwrap();
            assert!(sub.traces().iter().all(|trace| trace.num_samples() == 11));
        }
    }

    #[test]
    fn test_rejects_bad_config() {
        let result = SubVolumeIterator::builder(create_volume())
            .with_window(WindowShape::new(0, 3))
            .build();
        assert!(matches!(result, Err(SubVolumeError::Configuration(_))));
    }

    #[test]
    fn test_close_ends_iteration() {
        let iterator = SubVolumeIterator::builder(create_volume())
            .with_execution_mode(ExecutionMode::Background)
            .build()
            .unwrap();
        assert!(iterator.next_subvolume().is_ok());
        iterator.close();
        assert!(!iterator.has_next());
        assert!(matches!(
            iterator.next_subvolume(),
            Err(SubVolumeError::Exhausted)
        ));
    }

    #[test]
    fn test_cancelled_synchronous_traversal() {
        let iterator = SubVolumeIterator::builder(create_volume()).build().unwrap();
        assert!(iterator.next_subvolume().is_ok());
        iterator.cancellation_token().cancel();
        assert!(matches!(
            iterator.next_subvolume(),
            Err(SubVolumeError::Cancelled)
        ));
        assert!(!iterator.has_next());
    }

    #[test]
    fn test_std_iterator() {
        let iterator = SubVolumeIterator::builder(create_volume())
            .with_window(WindowShape::new(1, 3))
            .build()
            .unwrap();
        assert_eq!(iterator.subvolume_shape(), (1, 1, 3));
        let shapes: Vec<_> = iterator.map(|sub| sub.unwrap().shape()).collect();
        assert_eq!(shapes.len(), 24);
        assert!(shapes.iter().all(|&shape| shape == (1, 1, 3)));
    }

    #[test]
    fn test_iterator_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SubVolumeIterator>();
    }
}
