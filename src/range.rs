//! Traversal range - the inline/crossline bounds clipped to an area of interest

use crate::aoi::AreaOfInterest;
use crate::geometry::VolumeGeometry;
use crate::types::AxisRange;
use crate::utils::GRID_EPSILON;

/// Inline and crossline ranges a traversal iterates over
///
/// Both ranges lie on the volume's bin grid and run start→end in the
/// direction of the volume's own deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversalRange {
    pub inline: AxisRange,
    pub xline: AxisRange,
    first_inline_index: usize,
    first_xline_index: usize,
}

impl TraversalRange {
    /// Compute the range for a volume, optionally clipped to an AOI's bounding box
    pub fn compute(geometry: &VolumeGeometry, aoi: Option<&dyn AreaOfInterest>) -> Self {
        let Some(aoi) = aoi else {
            return Self::full(geometry);
        };

        let extent = aoi.bounding_extent();
        let mut inline_bounds = (f64::INFINITY, f64::NEG_INFINITY);
        let mut xline_bounds = (f64::INFINITY, f64::NEG_INFINITY);
        for (x, y) in extent.corners() {
            let (inline, xline) = geometry.world_to_bin(x, y);
            inline_bounds = (inline_bounds.0.min(inline), inline_bounds.1.max(inline));
            xline_bounds = (xline_bounds.0.min(xline), xline_bounds.1.max(xline));
        }

        let (inline, first_inline_index) =
            clip_axis(&geometry.inline, inline_bounds.0, inline_bounds.1);
        let (xline, first_xline_index) = clip_axis(&geometry.xline, xline_bounds.0, xline_bounds.1);

        Self {
            inline,
            xline,
            first_inline_index,
            first_xline_index,
        }
    }

    /// The whole volume extent
    pub fn full(geometry: &VolumeGeometry) -> Self {
        Self {
            inline: geometry.inline,
            xline: geometry.xline,
            first_inline_index: 0,
            first_xline_index: 0,
        }
    }

    pub fn num_inlines(&self) -> usize {
        self.inline.count()
    }

    pub fn num_xlines(&self) -> usize {
        self.xline.count()
    }

    /// True when there is nothing to traverse
    pub fn is_empty(&self) -> bool {
        self.num_inlines() == 0 || self.num_xlines() == 0
    }

    /// Index of the first clipped inline within the volume's inline axis
    pub fn first_inline_index(&self) -> usize {
        self.first_inline_index
    }

    /// Index of the first clipped crossline within the volume's crossline axis
    pub fn first_xline_index(&self) -> usize {
        self.first_xline_index
    }
}

/// Intersect `axis` with the bin interval `[lo, hi]`, snapping inward to the grid
fn clip_axis(axis: &AxisRange, lo: f64, hi: f64) -> (AxisRange, usize) {
    let count = axis.count();
    if count == 0 {
        return (AxisRange::empty(axis.delta), 0);
    }

    let step = axis.delta.abs();
    let origin = axis.min();
    let lo_index = ((lo - origin) / step - GRID_EPSILON).ceil().max(0.0);
    let hi_index = ((hi - origin) / step + GRID_EPSILON)
        .floor()
        .min((count - 1) as f64);

    if !(lo_index <= hi_index) {
        return (AxisRange::empty(axis.delta), 0);
    }

    let (lo_index, hi_index) = (lo_index as usize, hi_index as usize);
    let lo_coord = origin + lo_index as f64 * step;
    let hi_coord = origin + hi_index as f64 * step;

    if axis.delta > 0.0 {
        (AxisRange::new(lo_coord, hi_coord, axis.delta), lo_index)
    } else {
        (
            AxisRange::new(hi_coord, lo_coord, axis.delta),
            count - 1 - hi_index,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aoi::{Extent, RectangleAoi};
    use crate::geometry::BinTransform;
    use crate::types::ZUnit;

    fn create_test_geometry(inline: AxisRange, xline: AxisRange) -> VolumeGeometry {
        VolumeGeometry::new(inline, xline, AxisRange::new(0.0, 40.0, 4.0), ZUnit::Milliseconds)
            .unwrap()
    }

    #[test]
    fn test_full_range_without_aoi() {
        let geometry = create_test_geometry(
            AxisRange::new(100.0, 110.0, 2.0),
            AxisRange::new(206.0, 200.0, -2.0),
        );
        let range = TraversalRange::compute(&geometry, None);
        assert_eq!(range.inline, geometry.inline);
        assert_eq!(range.xline, geometry.xline);
        assert_eq!(range.num_inlines(), 6);
        assert_eq!(range.num_xlines(), 4);
    }

    #[test]
    fn test_aoi_clips_inlines() {
        let geometry = create_test_geometry(
            AxisRange::new(100.0, 110.0, 2.0),
            AxisRange::new(200.0, 206.0, 2.0),
        );
        let aoi = RectangleAoi::new(Extent::new(100.0, 104.0, 190.0, 220.0));
        let range = TraversalRange::compute(&geometry, Some(&aoi));

        assert_eq!(range.inline, AxisRange::new(100.0, 104.0, 2.0));
        assert_eq!(range.xline, AxisRange::new(200.0, 206.0, 2.0));
        assert_eq!(range.num_inlines() * range.num_xlines(), 12);
    }

    #[test]
    fn test_aoi_snaps_inward() {
        let geometry = create_test_geometry(
            AxisRange::new(100.0, 110.0, 2.0),
            AxisRange::new(200.0, 206.0, 2.0),
        );
        let aoi = RectangleAoi::new(Extent::new(101.0, 107.5, 201.0, 205.0));
        let range = TraversalRange::compute(&geometry, Some(&aoi));

        assert_eq!(range.inline, AxisRange::new(102.0, 106.0, 2.0));
        assert_eq!(range.xline, AxisRange::new(202.0, 204.0, 2.0));
        assert_eq!(range.first_inline_index(), 1);
        assert_eq!(range.first_xline_index(), 1);
    }

    #[test]
    fn test_aoi_keeps_negative_delta() {
        let geometry = create_test_geometry(
            AxisRange::new(110.0, 100.0, -2.0),
            AxisRange::new(200.0, 206.0, 2.0),
        );
        let aoi = RectangleAoi::new(Extent::new(100.0, 104.0, 0.0, 1000.0));
        let range = TraversalRange::compute(&geometry, Some(&aoi));

        assert_eq!(range.inline, AxisRange::new(104.0, 100.0, -2.0));
        assert_eq!(range.inline.coords(), vec![104.0, 102.0, 100.0]);
        assert_eq!(range.first_inline_index(), 3);
    }

    #[test]
    fn test_aoi_outside_volume_is_empty() {
        let geometry = create_test_geometry(
            AxisRange::new(100.0, 110.0, 2.0),
            AxisRange::new(200.0, 206.0, 2.0),
        );
        let aoi = RectangleAoi::new(Extent::new(500.0, 600.0, 500.0, 600.0));
        let range = TraversalRange::compute(&geometry, Some(&aoi));
        assert!(range.is_empty());
        assert_eq!(range.num_inlines(), 0);
    }

    #[test]
    fn test_aoi_through_rotated_grid() {
        // World axes swapped: x follows crossline, y follows inline
        let geometry = create_test_geometry(
            AxisRange::new(1.0, 20.0, 1.0),
            AxisRange::new(1.0, 30.0, 1.0),
        )
        .with_transform(BinTransform::new((0.0, 0.0), (0.0, 10.0), (10.0, 0.0)).unwrap())
        .unwrap();
        let aoi = RectangleAoi::new(Extent::new(50.0, 100.0, 20.0, 40.0));
        let range = TraversalRange::compute(&geometry, Some(&aoi));

        assert_eq!(range.inline, AxisRange::new(2.0, 4.0, 1.0));
        assert_eq!(range.xline, AxisRange::new(5.0, 10.0, 1.0));
    }
}
