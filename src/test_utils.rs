//! Synthetic meshes and fitness landscapes for testing.
//!
//! These keep the optimizer's correctness tests independent of any real
//! scan data or GPU: the quadratic evaluator gives a smooth landscape
//! with a known optimum, and the square mesh renders deterministically
//! through the CPU rasterizer.

use crate::depth_image::DepthImage;
use crate::evaluator::FitnessEvaluator;
use crate::mesh::TriangleMesh;
use crate::pose::PoseParameters;
use anyhow::Result;

/// An axis-aligned square of half-extent `half` in the XY plane at z = 0,
/// built from two triangles. Poses translate it into the view volume.
pub fn make_square_mesh(half: f32) -> TriangleMesh {
    TriangleMesh {
        vertices: vec![
            [-half, -half, 0.0],
            [half, -half, 0.0],
            [half, half, 0.0],
            [-half, half, 0.0],
        ],
        indices: vec![[0, 1, 2], [0, 2, 3]],
    }
}

/// The centered `crop_width x crop_height` window of an image, for
/// comparing crop-window renders against full-frame renders.
pub fn crop_center(image: &DepthImage, crop_width: usize, crop_height: usize) -> DepthImage {
    assert!(crop_width <= image.width() && crop_height <= image.height());
    let x0 = (image.width() - crop_width) / 2;
    let y0 = (image.height() - crop_height) / 2;
    let mut out = DepthImage::new(crop_width, crop_height);
    for y in 0..crop_height {
        for x in 0..crop_width {
            out.set(x, y, image.get(x0 + x, y0 + y));
        }
    }
    out
}

/// A pure-CPU fitness landscape: weighted squared distance to a known
/// optimum. Rotation axes are down-weighted so translation and rotation
/// errors contribute on comparable scales.
pub struct QuadraticEvaluator {
    target: PoseParameters,
    pub evaluations: usize,
}

impl QuadraticEvaluator {
    pub fn new(target: PoseParameters) -> Self {
        Self {
            target,
            evaluations: 0,
        }
    }

    pub fn energy(&self, pose: &PoseParameters) -> f32 {
        let d = *pose - self.target;
        d.x_translation * d.x_translation
            + d.y_translation * d.y_translation
            + d.z_translation * d.z_translation
            + 0.5 * (d.x_rotation * d.x_rotation
                + d.y_rotation * d.y_rotation
                + d.z_rotation * d.z_rotation)
    }
}

impl FitnessEvaluator for QuadraticEvaluator {
    fn evaluate(&mut self, poses: &[PoseParameters]) -> Result<Vec<f32>> {
        self.evaluations += poses.len();
        Ok(poses.iter().map(|p| self.energy(p)).collect())
    }
}
