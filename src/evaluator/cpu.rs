//! CPU implementation of the render-compare-reduce pipeline.
//!
//! Runs the identical protocol to the GPU path — tiled batch render,
//! pixel-aligned absolute difference against a tiled reference, per-tile
//! pyramid reduction — with the rasterization fanned out across host
//! cores instead of GPU lanes.

use crate::depth_image::DepthImage;
use crate::evaluator::reduce::{reduce_image, reduce_tiles};
use crate::evaluator::{EvaluatorError, FitnessEvaluator};
use crate::mesh::TriangleMesh;
use crate::pose::PoseParameters;
use crate::render::cpu::{render_depth, render_tiled};
use crate::render::RenderConfig;
use anyhow::{ensure, Result};

/// Depth-difference fitness evaluator running entirely on the host.
pub struct CpuEvaluator {
    mesh: TriangleMesh,
    config: RenderConfig,
    reference: DepthImage,
}

impl CpuEvaluator {
    /// Build an evaluator for a fixed mesh and reference depth map. Fails
    /// fast when the reference does not match the crop window — running
    /// with a mismatched reference would make every energy meaningless.
    pub fn new(mesh: TriangleMesh, config: RenderConfig, reference: DepthImage) -> Result<Self> {
        config.validate()?;
        ensure!(!mesh.is_empty(), EvaluatorError::EmptyMesh);
        if reference.width() != config.crop_width || reference.height() != config.crop_height {
            return Err(EvaluatorError::ReferenceSizeMismatch {
                expected_w: config.crop_width,
                expected_h: config.crop_height,
                actual_w: reference.width(),
                actual_h: reference.height(),
            }
            .into());
        }
        tracing::info!(
            triangles = mesh.num_triangles(),
            crop_width = config.crop_width,
            crop_height = config.crop_height,
            "CPU evaluator ready"
        );
        Ok(Self {
            mesh,
            config,
            reference,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Evaluate one pose through the single-candidate path. The batched
    /// path must agree with this within rounding.
    pub fn evaluate_single(&self, pose: &PoseParameters) -> Result<f32> {
        let rendered = render_depth(&self.mesh, pose, &self.config)?;
        let diff = rendered.abs_diff(&self.reference)?;
        Ok(reduce_image(&diff))
    }
}

impl FitnessEvaluator for CpuEvaluator {
    fn evaluate(&mut self, poses: &[PoseParameters]) -> Result<Vec<f32>> {
        if poses.is_empty() {
            return Ok(Vec::new());
        }

        let n = poses.len();
        let cw = self.config.crop_width;
        let ch = self.config.crop_height;
        let wide_width = n * cw;

        // Render all candidates into one wide buffer of N tiles, then
        // difference against the reference tiled across every candidate
        // and collapse each tile in the same pyramid.
        let rendered = render_tiled(&self.mesh, poses, &self.config)?;
        let wide = rendered.as_slice();
        let reference = self.reference.as_slice();
        let mut diff = vec![0.0f32; n * cw * ch];
        for y in 0..ch {
            let row = y * wide_width;
            let ref_row = y * cw;
            for wx in 0..wide_width {
                diff[row + wx] = (wide[row + wx] - reference[ref_row + wx % cw]).abs();
            }
        }

        let energies = reduce_tiles(&diff, n, cw, ch);
        if energies.len() != n {
            return Err(EvaluatorError::BatchSizeMismatch {
                expected: n,
                actual: energies.len(),
            }
            .into());
        }
        Ok(energies)
    }
}
