//! Composition of per-coil tiles into a single mosaic raster.

use ndarray::{s, Array2};

use crate::layout::{LayoutParams, MosaicLayout};
use crate::normalize::RenderableImage;

/// Place `tiles` row-major on a black canvas, each scaled to the layout cell
/// with nearest-neighbour sampling. Coil `i` lands at row `i / cols`,
/// column `i % cols`; tiles past `rows * cols` are ignored.
pub fn compose_mosaic(layout: &MosaicLayout, tiles: &[RenderableImage], params: LayoutParams) -> RenderableImage {
    let (width, height) = layout.extent(params);
    let mut canvas = Array2::<u8>::zeros((height as usize, width as usize));
    let (cw, ch) = (layout.cell_width as usize, layout.cell_height as usize);

    for (i, tile) in tiles.iter().take(layout.rows * layout.cols).enumerate() {
        let (x0, y0) = layout.cell_origin(i, params);
        let (x0, y0) = (x0 as usize, y0 as usize);
        let scaled = resize_nearest(&tile.pixels, ch, cw);
        canvas.slice_mut(s![y0..y0 + ch, x0..x0 + cw]).assign(&scaled);
    }

    RenderableImage::from_pixels(canvas)
}

/// Nearest-neighbour resample to `height x width`.
pub fn resize_nearest(src: &Array2<u8>, height: usize, width: usize) -> Array2<u8> {
    let (sh, sw) = src.dim();
    if sh == 0 || sw == 0 {
        return Array2::zeros((height, width));
    }
    Array2::from_shape_fn((height, width), |(y, x)| {
        let sy = (y * sh) / height;
        let sx = (x * sw) / width;
        src[[sy, sx]]
    })
}
