//! Seismic sub-volume iteration
//!
//! Walks every trace position of a 3D seismic volume in raster order and
//! hands out small windows of neighboring traces (sub-volumes) centered on
//! each position, for attribute computation, feature extraction or
//! training-data generation.
//!
//! # Features
//!
//! - Inline-major or crossline-major scan order
//! - Synchronous pulls or background read-ahead on a dedicated thread
//! - Optional area of interest (rectangle or polygon) restricting the scan
//! - Any number of co-registered secondary volumes read alongside the primary
//! - Missing trace synthesis at volume edges and outside the area of interest
//! - Line cache bounded to the window height along the scan axis
//!
//! Volumes are accessed through the [`Volume`] trait; [`MemoryVolume`] is an
//! in-memory implementation backed by an `ndarray` cube.
//!
//! # Example
//!
//! ```rust,ignore
//! use seismic_subvolume::{ScanOrder, SubVolumeIterator, WindowShape};
//! use std::sync::Arc;
//!
//! let iterator = SubVolumeIterator::builder(Arc::new(volume))
//!     .with_scan_order(ScanOrder::PrimaryMajor)
//!     .with_window(WindowShape::square(3))
//!     .build()?;
//!
//! for subvolume in iterator {
//!     let subvolume = subvolume?;
//!     println!("{:?} missing={}", subvolume.center_bin(), subvolume.missing_count());
//! }
//! ```

pub mod aoi;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod iterator;
pub mod range;
pub mod strategy;
pub mod subvolume;
pub mod types;
pub mod utils;
pub mod volume;

// Re-exports
pub use aoi::{AreaOfInterest, Extent, PolygonAoi, RectangleAoi};
pub use cache::LineCache;
pub use config::IteratorConfig;
pub use error::{Result, SubVolumeError};
pub use geometry::{BinTransform, VolumeGeometry};
pub use iterator::{SubVolumeIterator, SubVolumeIteratorBuilder};
pub use range::TraversalRange;
pub use strategy::{CancellationToken, ExecutionMode, ScanOrder};
pub use subvolume::{SubVolume, WindowShape};
pub use types::{AxisRange, MissingFill, Trace, TraceStatus, ZUnit};
pub use volume::{MemoryVolume, Volume};

/// Version of the crate
pub const SUBVOLUME_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!SUBVOLUME_VERSION.is_empty());
    }
}
