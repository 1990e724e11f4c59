//! CubeCL kernels for the difference and reduction passes.

use cubecl::prelude::*;

/// Per-pixel absolute difference between the wide rendered buffer and the
/// reference depth map tiled across all candidates.
#[cube(launch_unchecked)]
pub fn tile_abs_diff_kernel<F: Float>(
    rendered: &Array<F>,  // Wide buffer, rows are num_poses * crop_width
    reference: &Array<F>, // Single crop-sized reference tile
    crop_width: u32,      // Tile width in pixels
    crop_height: u32,     // Tile height in pixels
    num_poses: u32,       // Tiles in the wide buffer
    diff: &mut Array<F>,  // Wide output, same layout as rendered
) {
    let idx = ABSOLUTE_POS;
    let wide_width = num_poses * crop_width;
    let total = wide_width * crop_height;

    if idx < total {
        let py = idx / wide_width;
        let cx = (idx % wide_width) % crop_width;
        let d = rendered[idx] - reference[py * crop_width + cx];
        diff[idx] = F::abs(d);
    }
}

/// One pyramid level: block-average every tile down by `fx x fy`.
///
/// One thread per output cell. `inv_block` is `1 / (fx * fy)`, computed
/// on the host so the kernel stays in pure float arithmetic.
#[cube(launch_unchecked)]
pub fn reduce_tiles_kernel<F: Float>(
    input: &Array<F>,      // Wide buffer of num_tiles tiles, in_w x in_h each
    num_tiles: u32,        // Tiles reduced in parallel
    in_w: u32,             // Input tile width
    fx: u32,               // Horizontal block factor (divides in_w)
    fy: u32,               // Vertical block factor (divides in_h)
    out_w: u32,            // in_w / fx
    out_h: u32,            // in_h / fy
    inv_block: F,          // 1 / (fx * fy)
    output: &mut Array<F>, // Wide buffer of num_tiles tiles, out_w x out_h each
) {
    let idx = ABSOLUTE_POS;
    let wide_out = num_tiles * out_w;
    let total = wide_out * out_h;

    if idx < total {
        let oy = idx / wide_out;
        let wx = idx % wide_out;
        let tile = wx / out_w;
        let ox = wx % out_w;

        let wide_in = num_tiles * in_w;
        let mut sum = F::new(0.0);
        for j in 0..fy {
            let iy = oy * fy + j;
            let row = iy * wide_in + tile * in_w + ox * fx;
            for i in 0..fx {
                sum += input[row + i];
            }
        }
        output[idx] = sum * inv_block;
    }
}
