//! CubeCL kernels for the batched depth render.
//!
//! Two passes per generation: project every (pose, vertex) pair, then
//! rasterize every crop pixel of every tile. The rasterizer is
//! pixel-parallel — each thread walks the triangle list and keeps its own
//! depth minimum, so no atomics are needed on the depth buffer.

use cubecl::prelude::*;

/// Transform and viewport-map all vertices for all candidate poses.
///
/// One thread per (pose, vertex). Output is 4 floats per pair: screen x,
/// screen y, window depth, and clip-space w (`w <= 0` marks a vertex
/// behind the camera; its other fields are then zero).
#[cube(launch_unchecked)]
pub fn project_vertices_kernel<F: Float>(
    vertices: &Array<F>,   // [x0, y0, z0, x1, ...] model space, shared by all poses
    mvp: &Array<F>,        // 16 floats per pose, row-major
    num_vertices: u32,     // Vertices in the mesh
    num_poses: u32,        // Candidate poses in the batch
    viewport_width: F,     // Full viewport width in pixels
    viewport_height: F,    // Full viewport height in pixels
    screen: &mut Array<F>, // 4 floats per (pose, vertex)
) {
    let idx = ABSOLUTE_POS;
    let total = num_vertices * num_poses;

    if idx < total {
        let pose = idx / num_vertices;
        let vert = idx % num_vertices;

        let vb = vert * 3;
        let x = vertices[vb];
        let y = vertices[vb + 1];
        let z = vertices[vb + 2];

        let mb = pose * 16;
        let cx = mvp[mb] * x + mvp[mb + 1] * y + mvp[mb + 2] * z + mvp[mb + 3];
        let cy = mvp[mb + 4] * x + mvp[mb + 5] * y + mvp[mb + 6] * z + mvp[mb + 7];
        let cz = mvp[mb + 8] * x + mvp[mb + 9] * y + mvp[mb + 10] * z + mvp[mb + 11];
        let cw = mvp[mb + 12] * x + mvp[mb + 13] * y + mvp[mb + 14] * z + mvp[mb + 15];

        let ob = idx * 4;
        if cw > F::new(0.0) {
            let inv_w = F::new(1.0) / cw;
            let half = F::new(0.5);
            screen[ob] = (cx * inv_w + F::new(1.0)) * half * viewport_width;
            screen[ob + 1] = (cy * inv_w + F::new(1.0)) * half * viewport_height;
            screen[ob + 2] = (cz * inv_w + F::new(1.0)) * half;
            screen[ob + 3] = cw;
        } else {
            screen[ob] = F::new(0.0);
            screen[ob + 1] = F::new(0.0);
            screen[ob + 2] = F::new(0.0);
            screen[ob + 3] = cw;
        }
    }
}

/// Rasterize every tile of the wide depth buffer.
///
/// One thread per output pixel. The thread's tile selects the projected
/// vertex block for its pose; coverage is a barycentric test at the pixel
/// center in full-viewport coordinates, depth interpolates linearly in
/// screen space, and the thread-local minimum wins. Uncovered pixels get
/// the background depth 1.0.
#[cube(launch_unchecked)]
pub fn rasterize_tiles_kernel<F: Float>(
    screen: &Array<F>,    // Projected vertices, 4 floats per (pose, vertex)
    indices: &Array<u32>, // 3 vertex indices per triangle
    num_triangles: u32,   // Triangles in the mesh
    num_vertices: u32,    // Vertices in the mesh
    crop_width: u32,      // Tile width in pixels
    crop_height: u32,     // Tile height in pixels
    crop_x0: u32,         // Crop window origin in the full viewport
    crop_y0: u32,
    num_poses: u32,       // Tiles in the wide buffer
    depth: &mut Array<F>, // Wide buffer, rows are num_poses * crop_width
) {
    let idx = ABSOLUTE_POS;
    let wide_width = num_poses * crop_width;
    let total = wide_width * crop_height;

    if idx < total {
        let py = idx / wide_width;
        let wx = idx % wide_width;
        let tile = wx / crop_width;
        let cx = wx % crop_width;

        // Sample position at the pixel center, in viewport coordinates.
        let sx = F::cast_from(cx + crop_x0) + F::new(0.5);
        let sy = F::cast_from(py + crop_y0) + F::new(0.5);

        let base = tile * num_vertices;
        let mut best = F::new(1.0);

        for t in 0..num_triangles {
            let i0 = (base + indices[t * 3]) * 4;
            let i1 = (base + indices[t * 3 + 1]) * 4;
            let i2 = (base + indices[t * 3 + 2]) * 4;

            let w0c = screen[i0 + 3];
            let w1c = screen[i1 + 3];
            let w2c = screen[i2 + 3];

            // Triangles crossing the camera plane are dropped whole.
            if w0c > F::new(0.0) && w1c > F::new(0.0) && w2c > F::new(0.0) {
                let ax = screen[i0];
                let ay = screen[i0 + 1];
                let bx = screen[i1];
                let by = screen[i1 + 1];
                let cx2 = screen[i2];
                let cy2 = screen[i2 + 1];

                let area = (bx - ax) * (cy2 - ay) - (by - ay) * (cx2 - ax);
                if F::abs(area) > F::new(1e-12) {
                    let w0 = (cx2 - bx) * (sy - by) - (cy2 - by) * (sx - bx);
                    let w1 = (ax - cx2) * (sy - cy2) - (ay - cy2) * (sx - cx2);
                    let w2 = (bx - ax) * (sy - ay) - (by - ay) * (sx - ax);

                    let zero = F::new(0.0);
                    let pos = w0 >= zero && w1 >= zero && w2 >= zero;
                    let neg = w0 <= zero && w1 <= zero && w2 <= zero;
                    if pos || neg {
                        let inv_area = F::new(1.0) / area;
                        let d = (w0 * screen[i0 + 2]
                            + w1 * screen[i1 + 2]
                            + w2 * screen[i2 + 2])
                            * inv_area;
                        if d >= zero && d < best {
                            best = d;
                        }
                    }
                }
            }
        }

        depth[idx] = best;
    }
}
