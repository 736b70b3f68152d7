//! Volume accessors - the batch trace-read contract and an in-memory backend

use crate::error::{Result, SubVolumeError};
use crate::geometry::VolumeGeometry;
use crate::types::{AxisRange, MissingFill, Trace, ZUnit};
use crate::utils::step_count;
use ndarray::Array3;
use num_traits::ToPrimitive;

/// Trait for random access to the traces of a seismic volume
///
/// Implementations answer line-batch reads: one trace per requested
/// (inline, crossline) pair, aligned by index. Positions off the volume
/// grid come back as Missing traces rather than errors.
pub trait Volume: Send + Sync {
    /// Human readable name used in logs and errors
    fn name(&self) -> &str;

    /// Geometry and sampling of the volume
    fn geometry(&self) -> &VolumeGeometry;

    /// Read the traces at `inlines[i], xlines[i]` between `z_start` and `z_end`
    fn read_lines(
        &self,
        inlines: &[f64],
        xlines: &[f64],
        z_start: f64,
        z_end: f64,
    ) -> Result<Vec<Trace>>;

    fn inline_axis(&self) -> AxisRange {
        self.geometry().inline
    }

    fn xline_axis(&self) -> AxisRange {
        self.geometry().xline
    }

    fn z_axis(&self) -> AxisRange {
        self.geometry().z
    }

    fn z_unit(&self) -> ZUnit {
        self.geometry().z_unit
    }

    fn num_inlines(&self) -> usize {
        self.geometry().num_inlines()
    }

    fn num_xlines(&self) -> usize {
        self.geometry().num_xlines()
    }

    fn bin_to_world(&self, inline: f64, xline: f64) -> (f64, f64) {
        self.geometry().bin_to_world(inline, xline)
    }

    fn world_to_bin(&self, x: f64, y: f64) -> (f64, f64) {
        self.geometry().world_to_bin(x, y)
    }
}

/// Volume held entirely in memory, indexed `[inline][crossline][sample]`
pub struct MemoryVolume {
    name: String,
    geometry: VolumeGeometry,
    data: Array3<f32>,
}

impl MemoryVolume {
    /// Create a volume from sample data shaped to the geometry
    pub fn new(name: impl Into<String>, geometry: VolumeGeometry, data: Array3<f32>) -> Result<Self> {
        let expected = (
            geometry.num_inlines(),
            geometry.num_xlines(),
            geometry.num_samples(),
        );
        if data.dim() != expected {
            return Err(SubVolumeError::InvalidGeometry(format!(
                "Sample array shape {:?} does not match geometry {:?}",
                data.dim(),
                expected
            )));
        }

        Ok(Self {
            name: name.into(),
            geometry,
            data,
        })
    }

    /// Create a volume whose samples are computed from `(inline, xline, sample)` indices
    pub fn from_fn<F>(name: impl Into<String>, geometry: VolumeGeometry, f: F) -> Self
    where
        F: FnMut((usize, usize, usize)) -> f32,
    {
        let shape = (
            geometry.num_inlines(),
            geometry.num_xlines(),
            geometry.num_samples(),
        );
        Self {
            name: name.into(),
            geometry,
            data: Array3::from_shape_fn(shape, f),
        }
    }

    /// Create a volume from integer or floating point samples
    ///
    /// Values that do not fit in `f32` become NaN.
    pub fn from_samples<T>(
        name: impl Into<String>,
        geometry: VolumeGeometry,
        data: Array3<T>,
    ) -> Result<Self>
    where
        T: ToPrimitive + Copy,
    {
        let converted = data.mapv(|v| v.to_f32().unwrap_or(f32::NAN));
        Self::new(name, geometry, converted)
    }

    /// Raw sample storage
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    fn nearest_sample(&self, z: f64) -> Option<usize> {
        let axis = &self.geometry.z;
        let position = ((z - axis.start) / axis.delta).round();
        if position < 0.0 || position >= axis.count() as f64 {
            None
        } else {
            Some(position as usize)
        }
    }

    fn read_trace(&self, inline: f64, xline: f64, z_start: f64, num_samples: usize) -> Trace {
        let (x, y) = self.geometry.bin_to_world(inline, xline);
        let z_delta = self.geometry.z.delta;
        let z_unit = self.geometry.z_unit;

        let (i, j) = match (
            self.geometry.inline.index_of(inline),
            self.geometry.xline.index_of(xline),
        ) {
            (Some(i), Some(j)) => (i, j),
            _ => {
                return Trace::missing(z_start, z_delta, z_unit, num_samples, MissingFill::Nan)
                    .at_position(x, y)
            }
        };

        let samples: Vec<f32> = (0..num_samples)
            .map(|k| {
                self.nearest_sample(z_start + k as f64 * z_delta)
                    .map(|s| self.data[[i, j, s]])
                    .unwrap_or(f32::NAN)
            })
            .collect();

        Trace::new(x, y, z_start, z_delta, z_unit, samples)
    }
}

impl Volume for MemoryVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    fn read_lines(
        &self,
        inlines: &[f64],
        xlines: &[f64],
        z_start: f64,
        z_end: f64,
    ) -> Result<Vec<Trace>> {
        if inlines.len() != xlines.len() {
            return Err(SubVolumeError::volume_read(
                &self.name,
                format!(
                    "{} inline coordinates but {} crossline coordinates",
                    inlines.len(),
                    xlines.len()
                ),
            ));
        }

        let num_samples = step_count(z_start, z_end, self.geometry.z.delta);
        Ok(inlines
            .iter()
            .zip(xlines.iter())
            .map(|(&inline, &xline)| self.read_trace(inline, xline, z_start, num_samples))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TraceStatus;

    fn create_test_volume() -> MemoryVolume {
        let geometry = VolumeGeometry::new(
            AxisRange::new(100.0, 110.0, 2.0),
            AxisRange::new(200.0, 206.0, 2.0),
            AxisRange::new(0.0, 40.0, 4.0),
            ZUnit::Milliseconds,
        )
        .unwrap();
        MemoryVolume::from_fn("test", geometry, |(i, j, k)| (i * 100 + j * 10 + k) as f32)
    }

    #[test]
    fn test_read_line() {
        let volume = create_test_volume();
        let traces = volume
            .read_lines(&[104.0; 4], &[200.0, 202.0, 204.0, 206.0], 0.0, 40.0)
            .unwrap();

        assert_eq!(traces.len(), 4);
        assert_eq!(traces[1].status(), TraceStatus::Present);
        assert_eq!(traces[1].num_samples(), 11);
        assert_eq!(traces[1].samples()[0], 210.0);
        assert_eq!(traces[1].samples()[10], 220.0);
        assert_eq!((traces[1].x(), traces[1].y()), (104.0, 202.0));
    }

    #[test]
    fn test_read_z_window() {
        let volume = create_test_volume();
        let traces = volume.read_lines(&[100.0], &[200.0], 32.0, 48.0).unwrap();

        // 32..=48 at 4 ms: samples 8, 9, 10 exist, 11 and 12 lie below the volume
        assert_eq!(traces[0].samples()[..3], [8.0, 9.0, 10.0]);
        assert!(traces[0].samples()[3].is_nan());
        assert_eq!(traces[0].num_samples(), 5);
    }

    #[test]
    fn test_off_grid_position_is_missing() {
        let volume = create_test_volume();
        let traces = volume
            .read_lines(&[101.0, 120.0], &[200.0, 200.0], 0.0, 40.0)
            .unwrap();
        assert!(traces.iter().all(|t| t.is_missing()));
        assert_eq!(traces[0].num_samples(), 11);
    }

    #[test]
    fn test_mismatched_coordinates() {
        let volume = create_test_volume();
        let result = volume.read_lines(&[100.0, 102.0], &[200.0], 0.0, 40.0);
        assert!(matches!(result, Err(SubVolumeError::VolumeRead { .. })));
    }

    #[test]
    fn test_from_integer_samples() {
        let geometry = VolumeGeometry::new(
            AxisRange::new(1.0, 2.0, 1.0),
            AxisRange::new(1.0, 1.0, 1.0),
            AxisRange::new(0.0, 2.0, 1.0),
            ZUnit::Meters,
        )
        .unwrap();
        let data = Array3::from_shape_fn((2, 1, 3), |(i, _, k)| (i as i16 - 1) * 1000 + k as i16);
        let volume = MemoryVolume::from_samples("int16", geometry, data).unwrap();
        assert_eq!(volume.data()[[0, 0, 2]], -998.0);
        assert_eq!(volume.num_inlines(), 2);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let geometry = create_test_volume().geometry().clone();
        let result = MemoryVolume::new("bad", geometry, Array3::zeros((1, 1, 1)));
        assert!(result.is_err());
    }
}
