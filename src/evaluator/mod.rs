//! Fitness evaluation: render, difference, and reduce candidate poses to
//! scalar energies.
//!
//! The swarm only sees the [`FitnessEvaluator`] trait, so the PSO engine
//! can be tested against pure-CPU synthetic landscapes while production
//! runs use the tiled render pipeline (CPU fallback or CUDA). Energy is
//! the mean absolute per-pixel depth difference over the crop window;
//! lower is better and zero means a pixel-perfect match.

pub mod cpu;
#[cfg(feature = "cuda")]
pub mod gpu;
#[cfg(feature = "cuda")]
pub mod kernels;
pub mod reduce;

pub use cpu::CpuEvaluator;
#[cfg(feature = "cuda")]
pub use gpu::GpuEvaluator;
pub use reduce::{reduce_image, reduce_tiles, reduction_factor};

use crate::pose::PoseParameters;
use anyhow::Result;
use thiserror::Error;

/// Errors from the render-compare-reduce pipeline.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("reference depth map is {actual_w}x{actual_h}, expected crop size {expected_w}x{expected_h}")]
    ReferenceSizeMismatch {
        expected_w: usize,
        expected_h: usize,
        actual_w: usize,
        actual_h: usize,
    },

    #[error("evaluator produced {actual} energies for {expected} candidates")]
    BatchSizeMismatch { expected: usize, actual: usize },

    #[error("mesh has no triangles")]
    EmptyMesh,

    #[error("GPU readback returned {actual} scalars, expected {expected}")]
    ReadbackSizeMismatch { expected: usize, actual: usize },
}

/// Batched fitness evaluation: one scalar energy per candidate pose,
/// order-preserving. A failed batch is an error, never a sentinel energy.
pub trait FitnessEvaluator {
    fn evaluate(&mut self, poses: &[PoseParameters]) -> Result<Vec<f32>>;
}

impl<F> FitnessEvaluator for F
where
    F: FnMut(&[PoseParameters]) -> Result<Vec<f32>>,
{
    fn evaluate(&mut self, poses: &[PoseParameters]) -> Result<Vec<f32>> {
        self(poses)
    }
}
