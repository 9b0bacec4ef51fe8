//! Reading k-space volumes from `.npz` archives.
//!
//! Expected NPZ structure, either:
//!   - key "kspace": 6D array (nt, nz, nc, ny, nx, 2), last axis {real, imag}
//!   - keys "real" and "imag": 5D arrays (nt, nz, nc, ny, nx)
//!
//! Elements may be f32 or f64; f64 data is narrowed to f32.

use std::fs::File;
use std::path::Path;

use ndarray::{Array, Dimension, Ix5, Ix6, OwnedRepr};
use ndarray_npy::NpzReader;
use tracing::{info, warn};

use crate::error::{Result, ViewerError};
use crate::volume::KSpaceVolume;

/// Source of k-space volumes for a session.
pub trait VolumeLoader: Send {
    fn load(&self, path: &Path) -> Result<KSpaceVolume>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NpzLoader;

impl VolumeLoader for NpzLoader {
    fn load(&self, path: &Path) -> Result<KSpaceVolume> {
        let result = load_npz(path);
        match &result {
            Ok(volume) => info!(path = %path.display(), shape = ?volume.shape(), "loaded k-space volume"),
            Err(e) => warn!(path = %path.display(), error = %e, "k-space load failed"),
        }
        result
    }
}

fn load_npz(path: &Path) -> Result<KSpaceVolume> {
    let file = File::open(path).map_err(|e| ViewerError::load(path, format!("failed to open: {}", e)))?;
    let mut npz = NpzReader::new(file).map_err(|e| ViewerError::load(path, format!("failed to read NPZ: {}", e)))?;
    let names = npz
        .names()
        .map_err(|e| ViewerError::load(path, format!("failed to list arrays: {}", e)))?;

    if let Some(name) = find_key(&names, "kspace") {
        let raw = read_f32::<Ix6>(&mut npz, &name).map_err(|e| ViewerError::load(path, e))?;
        return KSpaceVolume::from_interleaved(raw).map_err(|e| ViewerError::load(path, e));
    }

    match (find_key(&names, "real"), find_key(&names, "imag")) {
        (Some(re), Some(im)) => {
            let real = read_f32::<Ix5>(&mut npz, &re).map_err(|e| ViewerError::load(path, e))?;
            let imag = read_f32::<Ix5>(&mut npz, &im).map_err(|e| ViewerError::load(path, e))?;
            KSpaceVolume::from_parts(real, imag).map_err(|e| ViewerError::load(path, e))
        }
        _ => Err(ViewerError::load(
            path,
            format!("missing 'kspace' or 'real'/'imag' arrays (found {:?})", names),
        )),
    }
}

/// Archive entry for `key`, with or without the `.npy` suffix NumPy adds.
fn find_key(names: &[String], key: &str) -> Option<String> {
    names
        .iter()
        .find(|n| n.as_str() == key || n.strip_suffix(".npy") == Some(key))
        .cloned()
}

fn read_f32<D: Dimension>(npz: &mut NpzReader<File>, name: &str) -> std::result::Result<Array<f32, D>, String> {
    match npz.by_name::<OwnedRepr<f32>, D>(name) {
        Ok(array) => Ok(array),
        Err(f32_err) => npz
            .by_name::<OwnedRepr<f64>, D>(name)
            .map(|array| array.mapv(|v| v as f32))
            .map_err(|_| format!("invalid '{}' array: {}", name, f32_err)),
    }
}
