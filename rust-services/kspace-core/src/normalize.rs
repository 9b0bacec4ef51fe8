//! Mapping of real-valued images to 8-bit grayscale.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Divisors at or below this are treated as 1, yielding an all-zero image.
const DIVISOR_FLOOR: f32 = 1e-12;

/// 8-bit grayscale raster handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderableImage {
    pub width: usize,
    pub height: usize,
    /// Row-major `height x width` intensities.
    pub pixels: Array2<u8>,
}

impl RenderableImage {
    pub fn from_pixels(pixels: Array2<u8>) -> Self {
        let (height, width) = pixels.dim();
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// How the scale divisor is chosen.
///
/// `PerImage` scales every image by its own maximum, so brightness is not
/// comparable between coils, frames or domains. `Fixed` lets a caller supply
/// a shared maximum instead.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum NormalizationPolicy {
    #[default]
    PerImage,
    Fixed { max: f32 },
}

/// `round(clamp(x / max(x), 0, 1) * 255)` with the per-image maximum.
pub fn normalize(input: &Array2<f32>) -> RenderableImage {
    normalize_with(input, NormalizationPolicy::PerImage)
}

pub fn normalize_with(input: &Array2<f32>, policy: NormalizationPolicy) -> RenderableImage {
    let divisor = match policy {
        NormalizationPolicy::PerImage => input
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f32, f32::max),
        NormalizationPolicy::Fixed { max } => max,
    };
    let divisor = if divisor.is_finite() && divisor > DIVISOR_FLOOR {
        divisor
    } else {
        1.0
    };

    let pixels = input.mapv(|v| {
        if !v.is_finite() {
            return 0;
        }
        ((v / divisor).clamp(0.0, 1.0) * 255.0).round() as u8
    });
    RenderableImage::from_pixels(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn scales_to_full_range() {
        let img = normalize(&array![[0.0, 1.0], [2.0, 4.0]]);
        assert_eq!(img.pixels, array![[0u8, 64], [128, 255]]);
        assert_eq!((img.width, img.height), (2, 2));
    }

    #[test]
    fn all_zero_input_gives_zero_image() {
        let img = normalize(&Array2::zeros((3, 5)));
        assert_eq!((img.width, img.height), (5, 3));
        assert!(img.pixels.iter().all(|&p| p == 0));

        let tiny = normalize(&Array2::from_elem((2, 2), 1e-20));
        assert!(tiny.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn idempotent_on_normalized_image() {
        let first = normalize(&array![[0.0, 10.0, 33.3], [80.0, 200.0, 255.0]]);
        let again = normalize(&first.pixels.mapv(f32::from));
        assert_eq!(first, again);
    }

    #[test]
    fn non_finite_samples_map_to_zero() {
        let img = normalize(&array![[f32::NAN, 2.0], [f32::INFINITY, 1.0]]);
        assert_eq!(img.pixels, array![[0u8, 255], [0, 128]]);
    }

    #[test]
    fn fixed_policy_uses_shared_scale() {
        let img = normalize_with(
            &array![[1.0, 2.0, 8.0]],
            NormalizationPolicy::Fixed { max: 4.0 },
        );
        assert_eq!(img.pixels, array![[64u8, 128, 255]]);
    }

    #[test]
    fn policy_reads_from_json() {
        let p: NormalizationPolicy = serde_json::from_str(r#"{"mode":"fixed","max":3.5}"#).unwrap();
        assert_eq!(p, NormalizationPolicy::Fixed { max: 3.5 });
        let p: NormalizationPolicy = serde_json::from_str(r#"{"mode":"per_image"}"#).unwrap();
        assert_eq!(p, NormalizationPolicy::PerImage);
    }
}
