//! Mipmap-style pyramid reduction of per-pixel error images.
//!
//! Each pass block-averages the image down by the smallest divisor of the
//! current dimension (2 for even sizes, 5 for 25 -> 5 -> 1, a whole prime
//! axis in one pass) until a single value per tile remains. Because every
//! pass is an exact block mean, the final scalar equals the arithmetic
//! mean of the full-resolution image up to floating-point rounding, which
//! keeps energies comparable across crop resolutions.
//!
//! The tiled variants operate on N horizontally packed tiles at once and
//! reduce each tile independently; this is the CPU mirror of the GPU
//! pyramid, where it exists to keep per-generation readback at one scalar
//! per candidate.

use crate::depth_image::DepthImage;

/// Smallest divisor >= 2 of `n` (or `n` itself when prime, collapsing the
/// axis in a single pass; 1 when the axis is already reduced).
pub fn reduction_factor(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return d;
        }
        d += 1;
    }
    n
}

/// One pyramid level: block-average `num_tiles` tiles of `tile_w x
/// tile_h` down by `fx x fy`. Input rows are `num_tiles * tile_w` wide.
pub fn reduce_level(
    input: &[f32],
    num_tiles: usize,
    tile_w: usize,
    tile_h: usize,
    fx: usize,
    fy: usize,
) -> Vec<f32> {
    debug_assert_eq!(input.len(), num_tiles * tile_w * tile_h);
    debug_assert!(fx >= 1 && tile_w % fx == 0);
    debug_assert!(fy >= 1 && tile_h % fy == 0);

    let out_w = tile_w / fx;
    let out_h = tile_h / fy;
    let in_row = num_tiles * tile_w;
    let out_row = num_tiles * out_w;
    let inv_block = 1.0 / (fx * fy) as f32;

    let mut output = vec![0.0f32; num_tiles * out_w * out_h];
    for tile in 0..num_tiles {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut sum = 0.0f32;
                for j in 0..fy {
                    let iy = oy * fy + j;
                    let base = iy * in_row + tile * tile_w + ox * fx;
                    for i in 0..fx {
                        sum += input[base + i];
                    }
                }
                output[oy * out_row + tile * out_w + ox] = sum * inv_block;
            }
        }
    }
    output
}

/// Collapse `num_tiles` horizontally packed tiles to one scalar each by
/// running the pyramid to 1x1.
pub fn reduce_tiles(
    buffer: &[f32],
    num_tiles: usize,
    tile_w: usize,
    tile_h: usize,
) -> Vec<f32> {
    debug_assert_eq!(buffer.len(), num_tiles * tile_w * tile_h);
    if num_tiles == 0 {
        return Vec::new();
    }

    let mut current = buffer.to_vec();
    let mut w = tile_w;
    let mut h = tile_h;
    while w > 1 || h > 1 {
        let fx = reduction_factor(w);
        let fy = reduction_factor(h);
        current = reduce_level(&current, num_tiles, w, h, fx, fy);
        w /= fx;
        h /= fy;
    }
    current
}

/// Reduce a single image to its pyramid scalar.
pub fn reduce_image(image: &DepthImage) -> f32 {
    reduce_tiles(image.as_slice(), 1, image.width(), image.height())[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn direct_mean(values: &[f32]) -> f32 {
        values.iter().sum::<f32>() / values.len() as f32
    }

    #[test]
    fn test_reduction_factor() {
        assert_eq!(reduction_factor(1), 1);
        assert_eq!(reduction_factor(2), 2);
        assert_eq!(reduction_factor(200), 2);
        assert_eq!(reduction_factor(25), 5);
        assert_eq!(reduction_factor(15), 3);
        assert_eq!(reduction_factor(7), 7);
    }

    #[test]
    fn test_uniform_input_is_fixed_point() {
        for (w, h) in [(8, 8), (200, 200), (25, 25), (15, 9), (7, 3)] {
            let img = DepthImage::filled(w, h, 0.3125);
            let v = reduce_image(&img);
            assert_relative_eq!(v, 0.3125, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reduce_equals_mean() {
        let mut data = Vec::new();
        for i in 0..(20 * 12) {
            data.push(((i * 37) % 101) as f32 / 101.0);
        }
        let img = DepthImage::from_vec(20, 12, data.clone()).unwrap();
        assert_relative_eq!(reduce_image(&img), direct_mean(&data), epsilon = 1e-5);
    }

    #[test]
    fn test_reduce_odd_dimensions() {
        // 25 -> 5 -> 1 and a prime axis collapsed in one pass.
        for (w, h) in [(25, 25), (25, 7), (13, 1)] {
            let data: Vec<f32> = (0..w * h).map(|i| (i % 17) as f32 / 16.0).collect();
            let img = DepthImage::from_vec(w, h, data.clone()).unwrap();
            assert_relative_eq!(reduce_image(&img), direct_mean(&data), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_single_level_block_mean() {
        // 4x2 -> 2x1 with 2x2 blocks.
        let input = [1.0, 3.0, 5.0, 7.0, 2.0, 4.0, 6.0, 8.0];
        let out = reduce_level(&input, 1, 4, 2, 2, 2);
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0], 2.5);
        assert_relative_eq!(out[1], 6.5);
    }

    #[test]
    fn test_tiled_matches_per_image_reduction() {
        let tile_w = 16;
        let tile_h = 12;
        let num_tiles = 3;
        let mut tiles: Vec<Vec<f32>> = Vec::new();
        for t in 0..num_tiles {
            tiles.push(
                (0..tile_w * tile_h)
                    .map(|i| ((i * (t + 3) * 29) % 97) as f32 / 97.0)
                    .collect(),
            );
        }

        // Pack horizontally.
        let mut wide = vec![0.0f32; num_tiles * tile_w * tile_h];
        for (t, tile) in tiles.iter().enumerate() {
            for y in 0..tile_h {
                for x in 0..tile_w {
                    wide[y * num_tiles * tile_w + t * tile_w + x] = tile[y * tile_w + x];
                }
            }
        }

        let batched = reduce_tiles(&wide, num_tiles, tile_w, tile_h);
        assert_eq!(batched.len(), num_tiles);
        for (t, tile) in tiles.iter().enumerate() {
            let single = reduce_tiles(tile, 1, tile_w, tile_h)[0];
            assert_relative_eq!(batched[t], single, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_empty_tiles() {
        assert!(reduce_tiles(&[], 0, 8, 8).is_empty());
    }
}
