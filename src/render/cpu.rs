//! CPU depth rasterizer.
//!
//! Reference implementation of the render pass: the same projection,
//! crop, and depth-test rules as the CUDA kernels, usable on machines
//! without a GPU and as ground truth in tests. Barycentric coverage with
//! samples at pixel centers, window-space depth interpolated linearly in
//! screen space, min-depth test against a background of 1.0.

use crate::depth_image::{DepthImage, BACKGROUND_DEPTH};
use crate::mesh::TriangleMesh;
use crate::pose::PoseParameters;
use crate::render::{project_vertex, RenderConfig, ScreenVertex};
use anyhow::Result;
use nalgebra::Matrix4;
use rayon::prelude::*;

/// Degenerate-triangle area cutoff in squared pixels.
const MIN_TRIANGLE_AREA: f32 = 1e-12;

/// Render one pose into a crop-sized depth image.
pub fn render_depth(
    mesh: &TriangleMesh,
    pose: &PoseParameters,
    config: &RenderConfig,
) -> Result<DepthImage> {
    config.validate()?;
    let mut image = DepthImage::new(config.crop_width, config.crop_height);
    let mvp = config.projection_matrix() * pose.model_matrix();
    rasterize_into(image.as_mut_slice(), mesh, &mvp, config);
    Ok(image)
}

/// Render N poses side by side into one wide buffer of N crop-sized
/// tiles, tile `i` starting at column `i * crop_width`. This is the
/// layout the batched evaluator differences and reduces in one pass.
/// Candidates are rendered across host cores (order-preserving).
pub fn render_tiled(
    mesh: &TriangleMesh,
    poses: &[PoseParameters],
    config: &RenderConfig,
) -> Result<DepthImage> {
    config.validate()?;
    let cw = config.crop_width;
    let tiles: Vec<DepthImage> = poses
        .par_iter()
        .map(|pose| render_depth(mesh, pose, config))
        .collect::<Result<_>>()?;

    let wide_width = poses.len() * cw;
    let mut image = DepthImage::new(wide_width.max(1), config.crop_height);
    let target = image.as_mut_slice();
    for (i, tile) in tiles.iter().enumerate() {
        let src = tile.as_slice();
        for y in 0..config.crop_height {
            let dst = y * wide_width + i * cw;
            target[dst..dst + cw].copy_from_slice(&src[y * cw..(y + 1) * cw]);
        }
    }
    Ok(image)
}

/// Rasterize the mesh under `mvp` into a crop-sized depth buffer.
fn rasterize_into(
    target: &mut [f32],
    mesh: &TriangleMesh,
    mvp: &Matrix4<f32>,
    config: &RenderConfig,
) {
    let (cx0, cy0) = config.crop_origin();
    let cx1 = cx0 + config.crop_width;
    let cy1 = cy0 + config.crop_height;

    let screen: Vec<ScreenVertex> = mesh
        .vertices
        .iter()
        .map(|&v| project_vertex(mvp, v, config))
        .collect();

    for tri in &mesh.indices {
        let a = screen[tri[0] as usize];
        let b = screen[tri[1] as usize];
        let c = screen[tri[2] as usize];

        // Research-grade clipping: drop any triangle that crosses the
        // camera plane, matching the reference renders.
        if a.clip_w <= 0.0 || b.clip_w <= 0.0 || c.clip_w <= 0.0 {
            continue;
        }

        let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        if area.abs() < MIN_TRIANGLE_AREA {
            continue;
        }
        let inv_area = 1.0 / area;

        // Bounding box clipped to the crop window.
        let min_x = a.x.min(b.x).min(c.x).floor().max(cx0 as f32) as usize;
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).min(cx1 as i64 - 1);
        let min_y = a.y.min(b.y).min(c.y).floor().max(cy0 as f32) as usize;
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).min(cy1 as i64 - 1);
        if max_x < min_x as i64 || max_y < min_y as i64 {
            continue;
        }

        for py in min_y..=max_y as usize {
            let sy = py as f32 + 0.5;
            for px in min_x..=max_x as usize {
                let sx = px as f32 + 0.5;

                let w0 = (c.x - b.x) * (sy - b.y) - (c.y - b.y) * (sx - b.x);
                let w1 = (a.x - c.x) * (sy - c.y) - (a.y - c.y) * (sx - c.x);
                let w2 = (b.x - a.x) * (sy - a.y) - (b.y - a.y) * (sx - a.x);

                // Accept both windings, as a depth-only pass does not cull.
                let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0)
                    || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
                if !inside {
                    continue;
                }

                let b0 = w0 * inv_area;
                let b1 = w1 * inv_area;
                let b2 = w2 * inv_area;
                let depth = b0 * a.depth + b1 * b.depth + b2 * c.depth;
                if !(0.0..=BACKGROUND_DEPTH).contains(&depth) {
                    continue;
                }

                let idx = (py - cy0) * config.crop_width + (px - cx0);
                if depth < target[idx] {
                    target[idx] = depth;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_square_mesh;

    fn small_config() -> RenderConfig {
        RenderConfig {
            width: 64,
            height: 64,
            crop_width: 32,
            crop_height: 32,
            aspect: 1.0,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn test_square_covers_center() {
        let mesh = make_square_mesh(0.05);
        let config = small_config();
        let pose = PoseParameters::new(0.0, 0.0, -0.5, 0.0, 0.0, 0.0);
        let img = render_depth(&mesh, &pose, &config).unwrap();

        let center = img.get(config.crop_width / 2, config.crop_height / 2);
        assert!(center < BACKGROUND_DEPTH, "center depth {}", center);
        // The square is small; crop corners stay background.
        assert_eq!(img.get(0, 0), BACKGROUND_DEPTH);
        assert_eq!(
            img.get(config.crop_width - 1, config.crop_height - 1),
            BACKGROUND_DEPTH
        );
    }

    #[test]
    fn test_nearer_surface_wins_depth_test() {
        let mesh = make_square_mesh(0.05);
        let config = small_config();
        let near = render_depth(
            &mesh,
            &PoseParameters::new(0.0, 0.0, -0.3, 0.0, 0.0, 0.0),
            &config,
        )
        .unwrap();
        let far = render_depth(
            &mesh,
            &PoseParameters::new(0.0, 0.0, -0.7, 0.0, 0.0, 0.0),
            &config,
        )
        .unwrap();
        let cx = config.crop_width / 2;
        let cy = config.crop_height / 2;
        assert!(near.get(cx, cy) < far.get(cx, cy));

        // A mesh holding both squares must keep the nearer depth.
        let mut both = make_square_mesh(0.05);
        let offset = both.vertices.len() as u32;
        for v in make_square_mesh(0.05).vertices {
            both.vertices.push([v[0], v[1], v[2] - 0.4]);
        }
        for t in make_square_mesh(0.05).indices {
            both.indices
                .push([t[0] + offset, t[1] + offset, t[2] + offset]);
        }
        let img = render_depth(
            &both,
            &PoseParameters::new(0.0, 0.0, -0.3, 0.0, 0.0, 0.0),
            &config,
        )
        .unwrap();
        assert!((img.get(cx, cy) - near.get(cx, cy)).abs() < 1e-6);
    }

    #[test]
    fn test_mesh_behind_camera_renders_background() {
        let mesh = make_square_mesh(0.05);
        let config = small_config();
        let pose = PoseParameters::new(0.0, 0.0, 0.5, 0.0, 0.0, 0.0);
        let img = render_depth(&mesh, &pose, &config).unwrap();
        assert!(img.as_slice().iter().all(|&v| v == BACKGROUND_DEPTH));
    }

    #[test]
    fn test_tiled_matches_sequential() {
        let mesh = make_square_mesh(0.08);
        let config = small_config();
        let poses = [
            PoseParameters::new(0.0, 0.0, -0.4, 0.0, 0.0, 0.0),
            PoseParameters::new(0.02, -0.01, -0.55, 0.3, 0.0, 0.1),
            PoseParameters::new(-0.03, 0.02, -0.6, 0.0, 0.4, 0.0),
        ];
        let wide = render_tiled(&mesh, &poses, &config).unwrap();
        assert_eq!(wide.width(), 3 * config.crop_width);

        for (i, pose) in poses.iter().enumerate() {
            let single = render_depth(&mesh, pose, &config).unwrap();
            for y in 0..config.crop_height {
                for x in 0..config.crop_width {
                    assert_eq!(
                        wide.get(i * config.crop_width + x, y),
                        single.get(x, y),
                        "tile {} pixel ({}, {})",
                        i,
                        x,
                        y
                    );
                }
            }
        }
    }

    #[test]
    fn test_crop_window_matches_render_then_crop() {
        // Rasterizing only the crop window is pixel-identical to
        // rendering the whole viewport and cropping afterwards.
        let mesh = make_square_mesh(0.08);
        let full = RenderConfig {
            width: 64,
            height: 64,
            crop_width: 64,
            crop_height: 64,
            aspect: 1.0,
            ..RenderConfig::default()
        };
        let windowed = small_config();
        let pose = PoseParameters::new(0.01, -0.02, -0.5, 0.2, 0.1, 0.0);

        let whole = render_depth(&mesh, &pose, &full).unwrap();
        let direct = render_depth(&mesh, &pose, &windowed).unwrap();
        let cropped = crate::test_utils::crop_center(&whole, 32, 32);
        assert_eq!(cropped.as_slice(), direct.as_slice());
    }

    #[test]
    fn test_empty_pose_batch() {
        let mesh = make_square_mesh(0.05);
        let config = small_config();
        let wide = render_tiled(&mesh, &[], &config).unwrap();
        assert_eq!(wide.height(), config.crop_height);
    }
}
