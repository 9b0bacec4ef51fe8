//! 2D FFT helpers for k-space planes, using rustfft.
//!
//! Follows NumPy conventions: the inverse transform is scaled by `1/(ny*nx)`
//! and the shifts match `np.fft.fftshift` / `np.fft.ifftshift` for both even
//! and odd sizes.

use std::sync::Arc;

use ndarray::{Array2, ArrayView2, Axis};
use num_complex::Complex32;
use rustfft::{Fft, FftDirection, FftPlanner};

/// Cached plans for transforming `ny x nx` planes.
pub struct Fft2dPlan {
    ny: usize,
    nx: usize,
    row_fwd: Arc<dyn Fft<f32>>,
    col_fwd: Arc<dyn Fft<f32>>,
    row_inv: Arc<dyn Fft<f32>>,
    col_inv: Arc<dyn Fft<f32>>,
}

impl Fft2dPlan {
    pub fn new(ny: usize, nx: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            ny,
            nx,
            row_fwd: planner.plan_fft(nx, FftDirection::Forward),
            col_fwd: planner.plan_fft(ny, FftDirection::Forward),
            row_inv: planner.plan_fft(nx, FftDirection::Inverse),
            col_inv: planner.plan_fft(ny, FftDirection::Inverse),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    /// In-place unnormalized forward 2D FFT.
    pub fn fft2(&self, data: &mut Array2<Complex32>) {
        self.process(data, &*self.row_fwd, &*self.col_fwd);
    }

    /// In-place inverse 2D FFT, scaled by `1/(ny*nx)`.
    pub fn ifft2(&self, data: &mut Array2<Complex32>) {
        self.process(data, &*self.row_inv, &*self.col_inv);
        let scale = 1.0 / (self.ny * self.nx) as f32;
        data.mapv_inplace(|v| v * scale);
    }

    fn process(&self, data: &mut Array2<Complex32>, row: &dyn Fft<f32>, col: &dyn Fft<f32>) {
        assert_eq!(data.dim(), (self.ny, self.nx), "plane does not match plan");

        let scratch_len = row
            .get_inplace_scratch_len()
            .max(col.get_inplace_scratch_len());
        let mut scratch = vec![Complex32::new(0.0, 0.0); scratch_len];
        let mut buffer = vec![Complex32::new(0.0, 0.0); self.ny.max(self.nx)];

        // Rows (contiguous for standard layout, copied otherwise)
        for mut lane in data.lanes_mut(Axis(1)) {
            let buf = &mut buffer[..self.nx];
            for (b, v) in buf.iter_mut().zip(lane.iter()) {
                *b = *v;
            }
            row.process_with_scratch(buf, &mut scratch[..row.get_inplace_scratch_len()]);
            for (v, b) in lane.iter_mut().zip(buf.iter()) {
                *v = *b;
            }
        }

        // Columns
        for mut lane in data.lanes_mut(Axis(0)) {
            let buf = &mut buffer[..self.ny];
            for (b, v) in buf.iter_mut().zip(lane.iter()) {
                *b = *v;
            }
            col.process_with_scratch(buf, &mut scratch[..col.get_inplace_scratch_len()]);
            for (v, b) in lane.iter_mut().zip(buf.iter()) {
                *v = *b;
            }
        }
    }

    /// Spatial image from a k-space plane: `ifftshift(ifft2(fftshift(k)))`.
    pub fn ifft2_centered(&self, kspace: ArrayView2<'_, Complex32>) -> Array2<Complex32> {
        let mut data = fftshift2(kspace);
        self.ifft2(&mut data);
        ifftshift2(data.view())
    }

    /// K-space plane from a spatial image; inverse of [`Self::ifft2_centered`].
    pub fn fft2_centered(&self, image: ArrayView2<'_, Complex32>) -> Array2<Complex32> {
        let mut data = fftshift2(image);
        self.fft2(&mut data);
        ifftshift2(data.view())
    }
}

/// Move the zero-frequency sample to the centre (`np.fft.fftshift`).
pub fn fftshift2<T: Copy>(a: ArrayView2<'_, T>) -> Array2<T> {
    let (ny, nx) = a.dim();
    roll2(a, ny / 2, nx / 2)
}

/// Undo [`fftshift2`] (`np.fft.ifftshift`).
pub fn ifftshift2<T: Copy>(a: ArrayView2<'_, T>) -> Array2<T> {
    let (ny, nx) = a.dim();
    roll2(a, ny - ny / 2, nx - nx / 2)
}

/// Circular shift: `out[(y + sy) % ny, (x + sx) % nx] = a[y, x]`.
fn roll2<T: Copy>(a: ArrayView2<'_, T>, sy: usize, sx: usize) -> Array2<T> {
    let (ny, nx) = a.dim();
    Array2::from_shape_fn((ny, nx), |(y, x)| {
        a[[(y + ny - sy % ny.max(1)) % ny, (x + nx - sx % nx.max(1)) % nx]]
    })
}
