//! Synthetic dynamic phantom for demos and smoke runs.

use std::f32::consts::PI;

use ndarray::{s, Array2, Array5};
use ndarray_rand::rand_distr::{Distribution, Normal};
use num_complex::Complex32;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Result, ViewerError};
use crate::fft::Fft2dPlan;
use crate::volume::{KSpaceVolume, VolumeShape};

/// Build a k-space volume from a pulsing disc phantom.
///
/// - shape: volume dimensions
/// - noise: std-dev of complex Gaussian noise added in image space
/// - seed: RNG seed, so runs are reproducible
///
/// Each coil sees the disc through a smooth sensitivity peaked at its own
/// position on a ring around the field of view, with a coil-dependent
/// phase. The disc radius oscillates over time and shrinks towards the
/// outer slices.
pub fn phantom_volume(shape: VolumeShape, noise: f32, seed: u64) -> Result<KSpaceVolume> {
    if !(noise.is_finite() && noise >= 0.0) {
        return Err(ViewerError::Config(format!("noise level must be non-negative, got {}", noise)));
    }
    let normal = Normal::new(0.0f32, noise)
        .map_err(|e| ViewerError::Config(format!("invalid noise level {}: {}", noise, e)))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let plan = Fft2dPlan::new(shape.ny, shape.nx);

    let (ny, nx) = (shape.ny as f32, shape.nx as f32);
    let (cy, cx) = (ny / 2.0, nx / 2.0);
    let base_radius = 0.35 * ny.min(nx);

    let mut data = Array5::<Complex32>::zeros((shape.nt, shape.nz, shape.nc, shape.ny, shape.nx));
    for t in 0..shape.nt {
        let pulse = 1.0 + 0.15 * (2.0 * PI * t as f32 / shape.nt.max(1) as f32).sin();
        for z in 0..shape.nz {
            let offset = (z as f32 - (shape.nz as f32 - 1.0) / 2.0) / shape.nz as f32;
            let radius = base_radius * pulse * (1.0 - offset.abs());
            for c in 0..shape.nc {
                let angle = 2.0 * PI * c as f32 / shape.nc as f32;
                let (sy, sx) = (cy + cy * angle.sin(), cx + cx * angle.cos());
                let width = 0.5 * ny.max(nx);
                let phase = Complex32::from_polar(1.0, angle);

                let noise_re = Array2::from_shape_simple_fn((shape.ny, shape.nx), || normal.sample(&mut rng));
                let noise_im = Array2::from_shape_simple_fn((shape.ny, shape.nx), || normal.sample(&mut rng));
                let image = Array2::from_shape_fn((shape.ny, shape.nx), |(y, x)| {
                    let (fy, fx) = (y as f32, x as f32);
                    let inside = (fy - cy).hypot(fx - cx) <= radius;
                    let sens = (-((fy - sy).powi(2) + (fx - sx).powi(2)) / (width * width)).exp();
                    let signal = if inside { sens } else { 0.0 };
                    phase * signal + Complex32::new(noise_re[[y, x]], noise_im[[y, x]])
                });

                let kspace = plan.fft2_centered(image.view());
                data.slice_mut(s![t, z, c, .., ..]).assign(&kspace);
            }
        }
    }

    KSpaceVolume::from_complex(data)
}
