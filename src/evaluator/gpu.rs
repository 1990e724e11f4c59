//! CUDA implementation of the render-compare-reduce pipeline.
//!
//! The mesh and reference depth map are uploaded once at construction.
//! Each generation then runs four kernel stages — vertex projection,
//! tile rasterization, per-pixel difference, and the reduction pyramid —
//! and reads back exactly one scalar per candidate. No full-resolution
//! image ever crosses back to the host, which is what keeps the
//! per-generation cost proportional to population size rather than
//! image size times population size.

use anyhow::Result;
use cubecl::client::ComputeClient;
use cubecl::cuda::{CudaDevice, CudaRuntime};
use cubecl::prelude::*;
use cubecl::server::Handle;

use crate::depth_image::DepthImage;
use crate::evaluator::kernels::{reduce_tiles_kernel, tile_abs_diff_kernel};
use crate::evaluator::reduce::reduction_factor;
use crate::evaluator::{EvaluatorError, FitnessEvaluator};
use crate::mesh::TriangleMesh;
use crate::pose::PoseParameters;
use crate::render::kernels::{project_vertices_kernel, rasterize_tiles_kernel};
use crate::render::RenderConfig;

/// Type alias for the CUDA compute client.
type CudaClient = ComputeClient<<CudaRuntime as Runtime>::Server>;

/// Threads per cube for all launches.
const CUBE_DIM: u32 = 256;

/// Whether a CUDA device can be initialized on this machine.
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| {
        let _device = CudaDevice::new(0);
    })
    .is_ok()
}

/// Depth-difference fitness evaluator running on a CUDA device.
pub struct GpuEvaluator {
    /// CUDA device (kept alive for the evaluator's lifetime).
    #[allow(dead_code)]
    device: CudaDevice,
    client: CudaClient,
    config: RenderConfig,
    num_vertices: usize,
    num_triangles: usize,
    vertices_gpu: Handle,
    indices_gpu: Handle,
    reference_gpu: Handle,
}

impl GpuEvaluator {
    /// Upload the mesh and reference to the default CUDA device. Fails
    /// fast on an unusable render target, empty mesh, or a reference
    /// that does not match the crop window.
    pub fn new(mesh: &TriangleMesh, config: RenderConfig, reference: &DepthImage) -> Result<Self> {
        Self::with_device_id(0, mesh, config, reference)
    }

    /// Same as [`GpuEvaluator::new`] on a specific CUDA device.
    pub fn with_device_id(
        device_id: usize,
        mesh: &TriangleMesh,
        config: RenderConfig,
        reference: &DepthImage,
    ) -> Result<Self> {
        config.validate()?;
        if mesh.is_empty() {
            return Err(EvaluatorError::EmptyMesh.into());
        }
        if reference.width() != config.crop_width || reference.height() != config.crop_height {
            return Err(EvaluatorError::ReferenceSizeMismatch {
                expected_w: config.crop_width,
                expected_h: config.crop_height,
                actual_w: reference.width(),
                actual_h: reference.height(),
            }
            .into());
        }

        let device = CudaDevice::new(device_id);
        let client = CudaRuntime::client(&device);

        let vertices_flat: Vec<f32> = mesh
            .vertices
            .iter()
            .flat_map(|v| v.iter().copied())
            .collect();
        let indices_flat: Vec<u32> = mesh
            .indices
            .iter()
            .flat_map(|t| t.iter().copied())
            .collect();

        let vertices_gpu = client.create(f32::as_bytes(&vertices_flat));
        let indices_gpu = client.create(u32::as_bytes(&indices_flat));
        let reference_gpu = client.create(f32::as_bytes(reference.as_slice()));

        tracing::info!(
            device_id,
            vertices = mesh.num_vertices(),
            triangles = mesh.num_triangles(),
            crop_width = config.crop_width,
            crop_height = config.crop_height,
            "GPU evaluator ready"
        );

        Ok(Self {
            device,
            client,
            config,
            num_vertices: mesh.num_vertices(),
            num_triangles: mesh.num_triangles(),
            vertices_gpu,
            indices_gpu,
            reference_gpu,
        })
    }

    fn cube_count(total: usize) -> CubeCount {
        CubeCount::Static(total.div_ceil(CUBE_DIM as usize) as u32, 1, 1)
    }

    /// Flatten per-pose MVP matrices row-major for the projection kernel.
    fn mvp_matrices(&self, poses: &[PoseParameters]) -> Vec<f32> {
        let proj = self.config.projection_matrix();
        let mut flat = Vec::with_capacity(poses.len() * 16);
        for pose in poses {
            let mvp = proj * pose.model_matrix();
            // nalgebra stores column-major; the transpose's column order
            // is the row-major layout the kernel indexes.
            flat.extend_from_slice(mvp.transpose().as_slice());
        }
        flat
    }
}

impl FitnessEvaluator for GpuEvaluator {
    fn evaluate(&mut self, poses: &[PoseParameters]) -> Result<Vec<f32>> {
        if poses.is_empty() {
            return Ok(Vec::new());
        }

        let n = poses.len();
        let cw = self.config.crop_width;
        let ch = self.config.crop_height;
        let (crop_x0, crop_y0) = self.config.crop_origin();
        let wide_pixels = n * cw * ch;

        // Upload this generation's transforms.
        let mvp_flat = self.mvp_matrices(poses);
        let mvp_gpu = self.client.create(f32::as_bytes(&mvp_flat));

        // Stage 1: project every (pose, vertex) pair.
        let num_projected = n * self.num_vertices;
        let screen_gpu = self
            .client
            .empty(num_projected * 4 * std::mem::size_of::<f32>());
        unsafe {
            project_vertices_kernel::launch_unchecked::<f32, CudaRuntime>(
                &self.client,
                Self::cube_count(num_projected),
                CubeDim::new(CUBE_DIM, 1, 1),
                ArrayArg::from_raw_parts::<f32>(&self.vertices_gpu, self.num_vertices * 3, 1),
                ArrayArg::from_raw_parts::<f32>(&mvp_gpu, n * 16, 1),
                ScalarArg::new(self.num_vertices as u32),
                ScalarArg::new(n as u32),
                ScalarArg::new(self.config.width as f32),
                ScalarArg::new(self.config.height as f32),
                ArrayArg::from_raw_parts::<f32>(&screen_gpu, num_projected * 4, 1),
            );
        }

        // Stage 2: rasterize all tiles of the wide depth buffer.
        let depth_gpu = self.client.empty(wide_pixels * std::mem::size_of::<f32>());
        unsafe {
            rasterize_tiles_kernel::launch_unchecked::<f32, CudaRuntime>(
                &self.client,
                Self::cube_count(wide_pixels),
                CubeDim::new(CUBE_DIM, 1, 1),
                ArrayArg::from_raw_parts::<f32>(&screen_gpu, num_projected * 4, 1),
                ArrayArg::from_raw_parts::<u32>(&self.indices_gpu, self.num_triangles * 3, 1),
                ScalarArg::new(self.num_triangles as u32),
                ScalarArg::new(self.num_vertices as u32),
                ScalarArg::new(cw as u32),
                ScalarArg::new(ch as u32),
                ScalarArg::new(crop_x0 as u32),
                ScalarArg::new(crop_y0 as u32),
                ScalarArg::new(n as u32),
                ArrayArg::from_raw_parts::<f32>(&depth_gpu, wide_pixels, 1),
            );
        }

        // Stage 3: difference against the tiled reference.
        let diff_gpu = self.client.empty(wide_pixels * std::mem::size_of::<f32>());
        unsafe {
            tile_abs_diff_kernel::launch_unchecked::<f32, CudaRuntime>(
                &self.client,
                Self::cube_count(wide_pixels),
                CubeDim::new(CUBE_DIM, 1, 1),
                ArrayArg::from_raw_parts::<f32>(&depth_gpu, wide_pixels, 1),
                ArrayArg::from_raw_parts::<f32>(&self.reference_gpu, cw * ch, 1),
                ScalarArg::new(cw as u32),
                ScalarArg::new(ch as u32),
                ScalarArg::new(n as u32),
                ArrayArg::from_raw_parts::<f32>(&diff_gpu, wide_pixels, 1),
            );
        }

        // Stage 4: reduction pyramid, one launch per level, down to one
        // value per tile.
        let mut current = diff_gpu;
        let mut w = cw;
        let mut h = ch;
        while w > 1 || h > 1 {
            let fx = reduction_factor(w);
            let fy = reduction_factor(h);
            let out_w = w / fx;
            let out_h = h / fy;
            let out_len = n * out_w * out_h;
            let next = self.client.empty(out_len * std::mem::size_of::<f32>());
            unsafe {
                reduce_tiles_kernel::launch_unchecked::<f32, CudaRuntime>(
                    &self.client,
                    Self::cube_count(out_len),
                    CubeDim::new(CUBE_DIM, 1, 1),
                    ArrayArg::from_raw_parts::<f32>(&current, n * w * h, 1),
                    ScalarArg::new(n as u32),
                    ScalarArg::new(w as u32),
                    ScalarArg::new(fx as u32),
                    ScalarArg::new(fy as u32),
                    ScalarArg::new(out_w as u32),
                    ScalarArg::new(out_h as u32),
                    ScalarArg::new(1.0f32 / (fx * fy) as f32),
                    ArrayArg::from_raw_parts::<f32>(&next, out_len, 1),
                );
            }
            current = next;
            w = out_w;
            h = out_h;
        }

        // The only readback of the generation: N scalars.
        let energies_bytes = self.client.read_one(current);
        let energies = f32::from_bytes(&energies_bytes).to_vec();
        if energies.len() < n {
            return Err(EvaluatorError::ReadbackSizeMismatch {
                expected: n,
                actual: energies.len(),
            }
            .into());
        }
        Ok(energies[..n].to_vec())
    }
}
