//! Iterator configuration

use crate::error::{Result, SubVolumeError};
use crate::strategy::{ExecutionMode, ScanOrder};
use crate::subvolume::WindowShape;
use crate::types::MissingFill;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default consumer wait between checks of the background reader
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// How a sub-volume iterator traverses its volumes
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes:
///
/// ```json
/// { "scan_order": "crossline", "execution_mode": "background", "window": { "primary": 5, "secondary": 5 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IteratorConfig {
    /// Outer traversal axis
    pub scan_order: ScanOrder,

    /// Synchronous pulls or background read-ahead
    pub execution_mode: ExecutionMode,

    /// Sub-volume window shape
    pub window: WindowShape,

    /// Primary lines advanced per row (background mode)
    pub primary_step: usize,

    /// Secondary positions advanced per sub-volume (background mode)
    pub secondary_step: usize,

    /// Capacity of the background handoff buffer
    pub buffer_capacity: usize,

    /// Consumer wait in milliseconds before re-checking the reader
    pub poll_interval_ms: u64,

    /// Fill value of synthesized Missing traces
    pub missing_fill: MissingFill,
}

impl Default for IteratorConfig {
    fn default() -> Self {
        Self {
            scan_order: ScanOrder::default(),
            execution_mode: ExecutionMode::default(),
            window: WindowShape::default(),
            primary_step: 1,
            secondary_step: 1,
            buffer_capacity: 1,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            missing_fill: MissingFill::default(),
        }
    }
}

impl IteratorConfig {
    /// Set the scan order
    pub fn with_scan_order(mut self, scan_order: ScanOrder) -> Self {
        self.scan_order = scan_order;
        self
    }

    /// Set the execution mode
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Set the window shape
    pub fn with_window(mut self, window: WindowShape) -> Self {
        self.window = window;
        self
    }

    /// Set the read-ahead increments
    pub fn with_steps(mut self, primary_step: usize, secondary_step: usize) -> Self {
        self.primary_step = primary_step;
        self.secondary_step = secondary_step;
        self
    }

    /// Set the handoff buffer capacity
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the consumer poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the Missing trace fill value
    pub fn with_missing_fill(mut self, fill: MissingFill) -> Self {
        self.missing_fill = fill;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject configurations no strategy can run
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        if self.primary_step == 0 || self.secondary_step == 0 {
            return Err(SubVolumeError::Configuration(format!(
                "Steps must be at least 1, got {}x{}",
                self.primary_step, self.secondary_step
            )));
        }
        if self.buffer_capacity == 0 {
            return Err(SubVolumeError::Configuration(
                "Buffer capacity must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(SubVolumeError::Configuration(
                "Poll interval must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SubVolumeError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
