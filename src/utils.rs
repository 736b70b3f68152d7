//! Utility functions

/// Tolerance used when snapping world/bin positions onto a regular grid
pub const GRID_EPSILON: f64 = 1e-6;

/// Number of grid points from `start` to `end` inclusive with spacing `delta`
///
/// Computed as `1 + round((end - start) / delta)`, floored at zero. A
/// range whose end lies on the wrong side of `start` for the sign of
/// `delta` is empty.
pub fn step_count(start: f64, end: f64, delta: f64) -> usize {
    if delta == 0.0 || !delta.is_finite() {
        return if start == end { 1 } else { 0 };
    }

    let steps = 1.0 + ((end - start) / delta).round();
    if steps.is_finite() && steps > 0.0 {
        steps as usize
    } else {
        0
    }
}

/// Half-width of a window of `size` cells; the center cell sits at this offset
pub fn window_half(size: usize) -> usize {
    size / 2
}

/// Signed offset of cell `cell` relative to the center of a window of `size`
pub fn window_offset(cell: usize, size: usize) -> isize {
    cell as isize - window_half(size) as isize
}

/// Resolve `base + offset` into `[0, len)`, or `None` when it falls outside
pub fn offset_index(base: usize, offset: isize, len: usize) -> Option<usize> {
    let index = base as isize + offset;
    if index < 0 || index as usize >= len {
        None
    } else {
        Some(index as usize)
    }
}

/// Percentage of `done` out of `total`; an empty job counts as complete
pub fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * done.min(total) as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_count() {
        assert_eq!(step_count(100.0, 110.0, 2.0), 6);
        assert_eq!(step_count(110.0, 100.0, -2.0), 6);
        assert_eq!(step_count(5.0, 5.0, 1.0), 1);
        assert_eq!(step_count(0.0, 1000.0, 4.0), 251);
    }

    #[test]
    fn test_step_count_empty_range() {
        assert_eq!(step_count(110.0, 100.0, 2.0), 0);
        assert_eq!(step_count(100.0, 110.0, -2.0), 0);
        assert_eq!(step_count(0.0, 1.0, 0.0), 0);
    }

    #[test]
    fn test_window_offsets() {
        assert_eq!(window_half(3), 1);
        assert_eq!(window_offset(0, 3), -1);
        assert_eq!(window_offset(2, 3), 1);
        // Even windows lean towards the leading edge
        assert_eq!(window_offset(0, 4), -2);
        assert_eq!(window_offset(3, 4), 1);
        assert_eq!(window_offset(0, 1), 0);
    }

    #[test]
    fn test_offset_index() {
        assert_eq!(offset_index(0, -1, 4), None);
        assert_eq!(offset_index(0, 0, 4), Some(0));
        assert_eq!(offset_index(3, 1, 4), None);
        assert_eq!(offset_index(2, 1, 4), Some(3));
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 4), 0.0);
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(9, 4), 100.0);
        assert_eq!(percent(0, 0), 100.0);
    }
}
