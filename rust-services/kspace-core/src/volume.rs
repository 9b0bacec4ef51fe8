//! In-memory k-space tensor store.

use ndarray::{s, Array5, Array6, ArrayView2, Zip};
use num_complex::Complex32;
use serde::Serialize;

use crate::error::{IndexAxis, Result, ViewerError};

/// Dimensions of a dynamic multi-coil acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VolumeShape {
    pub nt: usize,
    pub nz: usize,
    pub nc: usize,
    pub ny: usize,
    pub nx: usize,
}

impl VolumeShape {
    /// Width over height of a single coil plane.
    pub fn aspect_ratio(&self) -> f64 {
        self.nx as f64 / self.ny as f64
    }

    fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 5 {
            return Err(ViewerError::InvalidShape(format!(
                "expected 5 axes [nt, nz, nc, ny, nx], got {:?}",
                dims
            )));
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(ViewerError::InvalidShape(format!(
                "zero-length axis in {:?}",
                dims
            )));
        }
        Ok(VolumeShape {
            nt: dims[0],
            nz: dims[1],
            nc: dims[2],
            ny: dims[3],
            nx: dims[4],
        })
    }
}

/// Raw k-space samples laid out as `[time, slice, coil, row, col]`.
///
/// Immutable once built; a new load produces a new volume instead of
/// mutating this one.
#[derive(Debug, Clone)]
pub struct KSpaceVolume {
    data: Array5<Complex32>,
    shape: VolumeShape,
}

impl KSpaceVolume {
    /// Build from an interleaved `[nt, nz, nc, ny, nx, 2]` tensor whose last
    /// axis holds `{real, imag}`.
    pub fn from_interleaved(raw: Array6<f32>) -> Result<Self> {
        let dims = raw.shape().to_vec();
        if dims[5] != 2 {
            return Err(ViewerError::InvalidShape(format!(
                "last axis must hold {{real, imag}} (len 2), got {}",
                dims[5]
            )));
        }
        let shape = VolumeShape::from_dims(&dims[..5])?;
        let real = raw.slice(s![.., .., .., .., .., 0]);
        let imag = raw.slice(s![.., .., .., .., .., 1]);
        let data = Zip::from(&real)
            .and(&imag)
            .map_collect(|&re, &im| Complex32::new(re, im));
        Ok(KSpaceVolume { data, shape })
    }

    /// Build from separate real and imaginary `[nt, nz, nc, ny, nx]` tensors.
    pub fn from_parts(real: Array5<f32>, imag: Array5<f32>) -> Result<Self> {
        if real.shape() != imag.shape() {
            return Err(ViewerError::InvalidShape(format!(
                "real {:?} and imag {:?} shapes differ",
                real.shape(),
                imag.shape()
            )));
        }
        let shape = VolumeShape::from_dims(real.shape())?;
        let data = Zip::from(&real)
            .and(&imag)
            .map_collect(|&re, &im| Complex32::new(re, im));
        Ok(KSpaceVolume { data, shape })
    }

    pub fn from_complex(data: Array5<Complex32>) -> Result<Self> {
        let shape = VolumeShape::from_dims(data.shape())?;
        Ok(KSpaceVolume { data, shape })
    }

    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    /// Check a `(time, slice)` pair against the declared bounds.
    pub fn check_frame(&self, time_index: usize, slice_index: usize) -> Result<()> {
        check_index(IndexAxis::Time, time_index, self.shape.nt)?;
        check_index(IndexAxis::Slice, slice_index, self.shape.nz)
    }

    pub fn check_coil(&self, coil: usize) -> Result<()> {
        check_index(IndexAxis::Coil, coil, self.shape.nc)
    }

    /// Borrow one coil plane `ny x nx`.
    pub fn plane(&self, time_index: usize, slice_index: usize, coil: usize) -> Result<ArrayView2<'_, Complex32>> {
        self.check_frame(time_index, slice_index)?;
        self.check_coil(coil)?;
        Ok(self.data.slice(s![time_index, slice_index, coil, .., ..]))
    }
}

fn check_index(axis: IndexAxis, index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(ViewerError::IndexError { axis, index, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn interleaved_tensor_splits_real_and_imag() {
        let mut raw = Array6::<f32>::zeros((2, 1, 3, 4, 5, 2));
        raw[[1, 0, 2, 3, 4, 0]] = 1.5;
        raw[[1, 0, 2, 3, 4, 1]] = -2.0;

        let vol = KSpaceVolume::from_interleaved(raw).unwrap();
        assert_eq!(
            vol.shape(),
            VolumeShape { nt: 2, nz: 1, nc: 3, ny: 4, nx: 5 }
        );
        let plane = vol.plane(1, 0, 2).unwrap();
        assert_eq!(plane.dim(), (4, 5));
        assert_eq!(plane[[3, 4]], Complex32::new(1.5, -2.0));
        assert_eq!(plane[[0, 0]], Complex32::new(0.0, 0.0));
    }

    #[test]
    fn rejects_bad_trailing_axis() {
        let raw = Array6::<f32>::zeros((1, 1, 1, 2, 2, 3));
        assert!(matches!(
            KSpaceVolume::from_interleaved(raw),
            Err(ViewerError::InvalidShape(_))
        ));
    }

    #[test]
    fn rejects_mismatched_parts_and_empty_axes() {
        let real = Array5::<f32>::zeros((1, 1, 2, 4, 4));
        let imag = Array5::<f32>::zeros((1, 1, 2, 4, 3));
        assert!(KSpaceVolume::from_parts(real, imag).is_err());

        let empty = Array::zeros((1, 0, 2, 4, 4));
        assert!(KSpaceVolume::from_parts(empty.clone(), empty).is_err());
    }

    #[test]
    fn out_of_bounds_plane_is_index_error() {
        let vol = KSpaceVolume::from_complex(Array5::zeros((2, 3, 4, 2, 2))).unwrap();
        match vol.plane(2, 0, 0) {
            Err(ViewerError::IndexError { axis, index, len }) => {
                assert_eq!((axis, index, len), (IndexAxis::Time, 2, 2));
            }
            other => panic!("expected IndexError, got {:?}", other.map(|p| p.dim())),
        }
        assert!(vol.plane(0, 3, 0).is_err());
        assert!(vol.plane(0, 0, 4).is_err());
        assert!(vol.plane(1, 2, 3).is_ok());
    }

    #[test]
    fn aspect_ratio_is_width_over_height() {
        let shape = VolumeShape { nt: 1, nz: 1, nc: 1, ny: 64, nx: 128 };
        assert!((shape.aspect_ratio() - 2.0).abs() < 1e-12);
    }
}
