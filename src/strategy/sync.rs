//! Synchronous traversal - reads and assembles on the caller's thread

use super::{Traversal, TraversalPlan, TraversalStatus};
use crate::cache::LineCache;
use crate::error::Result;
use crate::subvolume::SubVolume;
use crate::utils::window_half;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Iterating,
    Done,
}

/// Single-threaded pull traversal over every `(primary, secondary)` position
///
/// The cache slides along the primary axis: at the start of each primary
/// line one new line is read half a window ahead and the line that left the
/// trailing half-window is evicted, so at most `window + 1` lines per volume
/// are resident.
pub(crate) struct SynchronousTraversal {
    plan: TraversalPlan,
    cache: LineCache,
    state: State,
    loop_counter: usize,
    total_loops: usize,
    status: Arc<TraversalStatus>,
}

impl SynchronousTraversal {
    pub(crate) fn new(plan: TraversalPlan) -> Self {
        let total_loops = plan.num_primary_lines() * plan.num_secondary_lines();
        let cache = LineCache::new(plan.num_volumes());
        Self {
            plan,
            cache,
            state: State::NotStarted,
            loop_counter: 0,
            total_loops,
            status: Arc::new(TraversalStatus::new(total_loops)),
        }
    }

    /// Bring the cache in line with the window centered on `primary_index`
    fn advance_window(&mut self, primary_index: usize) -> Result<()> {
        let half = window_half(self.plan.window().primary);
        let num_lines = self.plan.num_primary_lines();

        if self.state == State::NotStarted {
            for line in 0..=half.min(num_lines - 1) {
                self.plan.read_line(&mut self.cache, line)?;
            }
            self.state = State::Iterating;
            return Ok(());
        }

        let ahead = primary_index + half;
        if ahead < num_lines {
            self.plan.read_line(&mut self.cache, ahead)?;
        }
        if primary_index > half {
            let behind = primary_index - half - 1;
            self.plan.evict_line(&mut self.cache, behind);
            debug!(line = behind, "evicted line");
        }
        Ok(())
    }

    fn finish(&mut self) {
        if self.state != State::Done {
            info!(
                volume = %self.plan.primary_name(),
                subvolumes = self.loop_counter,
                "synchronous traversal finished"
            );
            self.state = State::Done;
            self.status.set_message("Done");
            self.status.finish(true);
            self.cache.clear_all();
        }
    }

    #[cfg(test)]
    fn resident_lines(&self, slot: usize) -> Vec<usize> {
        self.cache.lines(slot)
    }
}

impl Traversal for SynchronousTraversal {
    fn next_subvolume(&mut self) -> Result<Option<SubVolume>> {
        if self.state == State::Done || self.loop_counter >= self.total_loops {
            self.finish();
            return Ok(None);
        }

        let num_secondary = self.plan.num_secondary_lines();
        let primary_index = self.loop_counter / num_secondary;
        let secondary_index = self.loop_counter % num_secondary;

        if secondary_index == 0 {
            if let Err(err) = self.advance_window(primary_index) {
                self.state = State::Done;
                self.status.set_message(format!("Failed: {}", err));
                self.status.finish(false);
                return Err(err);
            }
            self.status
                .set_message(self.plan.progress_message(primary_index));
        }

        let subvolume = self.plan.assemble(&self.cache, primary_index, secondary_index);
        self.loop_counter += 1;
        self.status.set_position(self.loop_counter);
        Ok(Some(subvolume))
    }

    fn status(&self) -> &Arc<TraversalStatus> {
        &self.status
    }

    fn close(&mut self) {
        if self.state != State::Done {
            self.state = State::Done;
            self.status.set_message("Closed");
            self.status.finish(false);
        }
        self.cache.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::VolumeGeometry;
    use crate::range::TraversalRange;
    use crate::strategy::ScanOrder;
    use crate::subvolume::WindowShape;
    use crate::types::{AxisRange, MissingFill, ZUnit};
    use crate::volume::{MemoryVolume, Volume};
    use std::sync::Arc;

    fn create_plan(scan_order: ScanOrder, window: WindowShape) -> TraversalPlan {
        let geometry = VolumeGeometry::new(
            AxisRange::new(100.0, 110.0, 2.0),
            AxisRange::new(200.0, 206.0, 2.0),
            AxisRange::new(0.0, 40.0, 4.0),
            ZUnit::Milliseconds,
        )
        .unwrap();
        let volume: Arc<dyn Volume> = Arc::new(MemoryVolume::from_fn(
            "test",
            geometry,
            |(i, j, _)| (i * 10 + j) as f32,
        ));
        let range = TraversalRange::compute(volume.geometry(), None);
        TraversalPlan::new(
            scan_order,
            vec![volume],
            &range,
            window,
            (0.0, 40.0),
            None,
            MissingFill::Nan,
        )
    }

    #[test]
    fn test_yields_every_position() {
        let mut traversal =
            SynchronousTraversal::new(create_plan(ScanOrder::PrimaryMajor, WindowShape::square(3)));
        let mut centers = Vec::new();
        while let Some(sub) = traversal.next_subvolume().unwrap() {
            centers.push(sub.center());
        }

        assert_eq!(centers.len(), 24);
        assert_eq!(centers[0], (0, 0));
        assert_eq!(centers[1], (0, 1));
        assert_eq!(centers[4], (1, 0));
        assert_eq!(centers[23], (5, 3));
        assert_eq!(traversal.completion(), 100.0);
        assert!(traversal.next_subvolume().unwrap().is_none());
    }

    #[test]
    fn test_sliding_window_bound() {
        let mut traversal =
            SynchronousTraversal::new(create_plan(ScanOrder::PrimaryMajor, WindowShape::square(3)));

        let mut expected = vec![vec![0, 1], vec![0, 1, 2], vec![1, 2, 3]];
        expected.reverse();
        for _ in 0..3 {
            for _ in 0..4 {
                traversal.next_subvolume().unwrap();
            }
            let resident = traversal.resident_lines(0);
            assert!(resident.len() <= 4);
            assert_eq!(resident, expected.pop().unwrap());
        }
    }

    #[test]
    fn test_crossline_order_center_values() {
        let mut traversal = SynchronousTraversal::new(create_plan(
            ScanOrder::SecondaryMajor,
            WindowShape::square(1),
        ));

        // Crossline lines: the first four sub-volumes walk inlines on crossline 200
        let sub = traversal.next_subvolume().unwrap().unwrap();
        assert_eq!(sub.center_bin(), (100.0, 200.0));
        let sub = traversal.next_subvolume().unwrap().unwrap();
        assert_eq!(sub.center_bin(), (102.0, 200.0));
        assert_eq!(sub[(0, 0, 0)].samples()[0], 10.0);

        let mut count = 2;
        while traversal.next_subvolume().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 24);
    }

    #[test]
    fn test_progress_message() {
        let mut traversal =
            SynchronousTraversal::new(create_plan(ScanOrder::PrimaryMajor, WindowShape::square(3)));
        assert_eq!(traversal.message(), "Not started");
        for _ in 0..5 {
            traversal.next_subvolume().unwrap();
        }
        assert_eq!(traversal.message(), "Scanning inline 102 (2 of 6)");
        assert!((traversal.completion() - 100.0 * 5.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_close_stops_traversal() {
        let mut traversal =
            SynchronousTraversal::new(create_plan(ScanOrder::PrimaryMajor, WindowShape::square(3)));
        traversal.next_subvolume().unwrap();
        traversal.close();
        assert!(traversal.next_subvolume().unwrap().is_none());
    }
}
