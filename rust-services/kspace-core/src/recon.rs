//! Direct reconstruction of one (time, slice) frame.
//!
//! The two domains are deliberately not symmetric:
//!
//! - KSpace: the composite is `log1p(sqrt(sum_c |k_c|^2))` taken on the raw
//!   samples, with no transform at all.
//! - Image: every coil is inverse-transformed on its own and the composite is
//!   the root-sum-of-squares of the coil magnitudes, with no log compression.

use ndarray::{Array2, Zip};
use num_complex::Complex32;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, ViewerError};
use crate::fft::Fft2dPlan;
use crate::view::{Domain, ViewSelector};
use crate::volume::{KSpaceVolume, VolumeShape};

/// Coils taking part in a reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoilSelection {
    /// Every coil, combined into a composite.
    All,
    /// One coil shown on its own; no combination.
    Single(usize),
}

/// Output of [`Reconstructor::reconstruct`].
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub domain: Domain,
    /// Coil indices, parallel to `per_coil`.
    pub coils: Vec<usize>,
    /// Complex plane per selected coil: raw samples in KSpace, the
    /// inverse-transformed image in Image.
    pub per_coil: Vec<Array2<Complex32>>,
    /// Real-valued image ready for normalization.
    pub composite: Array2<f32>,
}

impl Reconstruction {
    /// Display magnitude for every selected coil, in `coils` order.
    pub fn coil_magnitudes(&self) -> Vec<Array2<f32>> {
        self.per_coil
            .iter()
            .map(|plane| coil_display(self.domain, plane))
            .collect()
    }
}

/// Per-volume reconstruction engine holding the FFT plans.
pub struct Reconstructor {
    plan: Fft2dPlan,
    parallel: bool,
}

impl Reconstructor {
    pub fn new(shape: VolumeShape, parallel: bool) -> Self {
        Self {
            plan: Fft2dPlan::new(shape.ny, shape.nx),
            parallel,
        }
    }

    pub fn reconstruct(
        &self,
        volume: &KSpaceVolume,
        selector: &ViewSelector,
        coils: CoilSelection,
    ) -> Result<Reconstruction> {
        let (t, z) = (selector.time_index, selector.slice_index);
        volume.check_frame(t, z)?;
        let coil_indices: Vec<usize> = match coils {
            CoilSelection::All => (0..volume.shape().nc).collect(),
            CoilSelection::Single(c) => {
                volume.check_coil(c)?;
                vec![c]
            }
        };
        let plane = (volume.shape().ny, volume.shape().nx);
        if plane != self.plan.dim() {
            return Err(ViewerError::InvalidShape(format!(
                "reconstructor planned for {:?} planes, volume has {:?}",
                self.plan.dim(),
                plane
            )));
        }

        let domain = selector.domain;
        let to_plane = |&c: &usize| -> Result<Array2<Complex32>> {
            let raw = volume.plane(t, z, c)?;
            Ok(match domain {
                Domain::KSpace => raw.to_owned(),
                Domain::Image => self.plan.ifft2_centered(raw),
            })
        };
        let per_coil: Vec<Array2<Complex32>> = if self.parallel {
            coil_indices.par_iter().map(to_plane).collect::<Result<_>>()?
        } else {
            coil_indices.iter().map(to_plane).collect::<Result<_>>()?
        };

        let composite = match coils {
            CoilSelection::Single(_) => coil_display(domain, &per_coil[0]),
            CoilSelection::All => {
                let rss = root_sum_of_squares(&per_coil, volume.shape());
                match domain {
                    Domain::KSpace => rss.mapv(f32::ln_1p),
                    Domain::Image => rss,
                }
            }
        };

        debug!(
            time = t,
            slice = z,
            ?domain,
            coils = coil_indices.len(),
            "reconstructed frame"
        );

        Ok(Reconstruction {
            domain,
            coils: coil_indices,
            per_coil,
            composite,
        })
    }
}

/// One-shot reconstruction that plans its own transforms.
pub fn reconstruct(
    volume: &KSpaceVolume,
    selector: &ViewSelector,
    coils: CoilSelection,
) -> Result<Reconstruction> {
    Reconstructor::new(volume.shape(), true).reconstruct(volume, selector, coils)
}

/// Display magnitude of a single coil: `log1p(|c|)` for k-space, `|c|` for
/// image space.
pub fn coil_display(domain: Domain, plane: &Array2<Complex32>) -> Array2<f32> {
    match domain {
        Domain::KSpace => plane.mapv(|v| v.norm().ln_1p()),
        Domain::Image => plane.mapv(|v| v.norm()),
    }
}

/// `sqrt(sum_c |x_c|^2)` across planes.
fn root_sum_of_squares(planes: &[Array2<Complex32>], shape: VolumeShape) -> Array2<f32> {
    let mut acc = Array2::<f32>::zeros((shape.ny, shape.nx));
    for plane in planes {
        Zip::from(&mut acc).and(plane).for_each(|a, v| *a += v.norm_sqr());
    }
    acc.mapv_inplace(f32::sqrt);
    acc
}
