//! Background traversal - a dedicated reader thread runs ahead of the consumer
//!
//! ```text
//! reader thread                         handoff buffer            consumer
//!   read_next_window(row)                 (bounded)
//!   populate_buffer(row) ── SubVolume ──►  [ ... ]  ── recv ──►  next_subvolume()
//!   dump_current_window()
//!   increment_index()
//! ```
//!
//! The buffer is the only channel between the two threads. The reader owns
//! its line cache outright; the consumer only ever sees finished
//! sub-volumes. A read failure is sent down the buffer and ends the reader.

use super::{CancellationToken, Traversal, TraversalPlan, TraversalStatus};
use crate::cache::LineCache;
use crate::config::IteratorConfig;
use crate::error::{Result, SubVolumeError};
use crate::subvolume::SubVolume;
use crate::utils::{offset_index, window_offset};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest the reader blocks on a full buffer before re-checking cancellation
const SEND_SLICE: Duration = Duration::from_millis(50);

type Handoff = Result<SubVolume>;

/// Consumer side of a background traversal
pub(crate) struct BackgroundTraversal {
    receiver: Option<Receiver<Handoff>>,
    worker: Option<thread::JoinHandle<()>>,
    status: Arc<TraversalStatus>,
    cancel: CancellationToken,
    poll_interval: Duration,
    finished: bool,
}

impl BackgroundTraversal {
    /// Start the reader thread
    pub(crate) fn spawn(
        plan: TraversalPlan,
        config: &IteratorConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let (sender, receiver) = bounded(config.buffer_capacity);
        let status = Arc::new(TraversalStatus::new(plan.num_primary_lines()));
        let thread_name = format!("subvolume-reader-{}", plan.primary_name());

        let reader = Reader {
            cache: LineCache::new(plan.num_volumes()),
            plan,
            primary_step: config.primary_step,
            secondary_step: config.secondary_step,
            sender,
            status: Arc::clone(&status),
            cancel: cancel.clone(),
        };
        let worker = thread::Builder::new()
            .name(thread_name)
            .spawn(move || reader.run())?;

        Ok(Self {
            receiver: Some(receiver),
            worker: Some(worker),
            status,
            cancel,
            poll_interval: config.poll_interval(),
            finished: false,
        })
    }

    /// Join the reader once it has hung up
    fn join_worker(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| {
                SubVolumeError::ReaderTerminated("reader thread panicked".to_string())
            }),
            None => Ok(()),
        }
    }

    fn end_of_sequence(&mut self) -> Result<Option<SubVolume>> {
        self.finished = true;
        self.receiver = None;
        self.join_worker()?;
        if !self.status.is_completed() && self.cancel.is_cancelled() {
            return Err(SubVolumeError::Cancelled);
        }
        Ok(None)
    }
}

impl Traversal for BackgroundTraversal {
    fn next_subvolume(&mut self) -> Result<Option<SubVolume>> {
        if self.finished {
            return Ok(None);
        }
        let receiver = match &self.receiver {
            Some(receiver) => receiver.clone(),
            None => return Ok(None),
        };

        loop {
            match receiver.recv_timeout(self.poll_interval) {
                Ok(Ok(subvolume)) => return Ok(Some(subvolume)),
                Ok(Err(err)) => {
                    // The reader stops after reporting a failure
                    self.end_of_sequence()?;
                    return Err(err);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        drop(receiver);
                        self.close();
                        return Err(SubVolumeError::Cancelled);
                    }
                    debug!(
                        done = self.status.is_done(),
                        "waiting for background reader"
                    );
                }
                Err(RecvTimeoutError::Disconnected) => return self.end_of_sequence(),
            }
        }
    }

    fn status(&self) -> &Arc<TraversalStatus> {
        &self.status
    }

    fn close(&mut self) {
        self.cancel.cancel();
        self.finished = true;
        // Dropping the receiver fails any send the reader is blocked on
        self.receiver = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("background reader panicked before close");
            }
        }
    }
}

impl Drop for BackgroundTraversal {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader thread state; owns the plan and the line cache
struct Reader {
    plan: TraversalPlan,
    cache: LineCache,
    primary_step: usize,
    secondary_step: usize,
    sender: Sender<Handoff>,
    status: Arc<TraversalStatus>,
    cancel: CancellationToken,
}

impl Reader {
    fn run(mut self) {
        let total = self.plan.num_primary_lines();
        info!(
            volume = %self.plan.primary_name(),
            lines = total,
            "background reader started"
        );

        let mut primary_index = 0;
        let mut completed = true;
        while primary_index < total && self.plan.num_secondary_lines() > 0 {
            if self.cancel.is_cancelled() {
                completed = false;
                break;
            }
            self.status.set_position(primary_index);
            self.status
                .set_message(self.plan.progress_message(primary_index));

            if let Err(err) = self.read_next_window(primary_index) {
                warn!(
                    volume = %self.plan.primary_name(),
                    error = %err,
                    "background read failed"
                );
                self.status.set_message(format!("Failed: {}", err));
                self.send(Err(err));
                completed = false;
                break;
            }

            if !self.populate_buffer(primary_index) {
                completed = false;
                break;
            }
            self.dump_current_window();
            primary_index = self.increment_index(primary_index);
        }

        if completed {
            self.status.set_message("Done");
        }
        self.status.finish(completed);
        info!(
            volume = %self.plan.primary_name(),
            completed,
            "background reader finished"
        );
    }

    /// Read the block of lines the window around `primary_index` needs
    fn read_next_window(&mut self, primary_index: usize) -> Result<()> {
        let window = self.plan.window().primary;
        let num_lines = self.plan.num_primary_lines();

        for cell in 0..window {
            let Some(line) = offset_index(primary_index, window_offset(cell, window), num_lines)
            else {
                continue;
            };
            if !self.plan.line_intersects_aoi(line) {
                debug!(line, "line outside area of interest, skipped");
                continue;
            }
            self.plan.read_line(&mut self.cache, line)?;
        }
        Ok(())
    }

    /// Push every sub-volume of the row; false when the consumer is gone
    fn populate_buffer(&mut self, primary_index: usize) -> bool {
        if self.cache.is_empty(0) {
            debug!(primary_index, "no lines read for row, nothing to hand off");
            return true;
        }

        for secondary_index in (0..self.plan.num_secondary_lines()).step_by(self.secondary_step) {
            let subvolume = self
                .plan
                .assemble(&self.cache, primary_index, secondary_index);
            if !self.send(Ok(subvolume)) {
                return false;
            }
        }
        true
    }

    /// Old entries are unreachable once the block moves on
    fn dump_current_window(&mut self) {
        self.cache.clear_all();
    }

    /// Next row; not clamped, so a step past the last line ends the traversal
    fn increment_index(&self, primary_index: usize) -> usize {
        primary_index + self.primary_step
    }

    /// Blocking send that gives up on cancellation or a dropped consumer
    fn send(&self, item: Handoff) -> bool {
        let mut item = item;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            match self.sender.send_timeout(item, SEND_SLICE) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => item = back,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}
