//! Depth-only rendering of the rigid mesh.
//!
//! The projection, viewport, and crop geometry live here so the CPU
//! rasterizer and the CUDA kernels agree bit-for-bit on what a candidate
//! pose looks like on screen. Candidates are rendered at the full
//! viewport resolution but only the centered crop window is ever
//! rasterized; energies are computed over that window alone.

pub mod cpu;
#[cfg(feature = "cuda")]
pub mod kernels;

use anyhow::{ensure, Result};
use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

/// Fixed camera and crop geometry shared by every candidate render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Full viewport width in pixels.
    pub width: usize,
    /// Full viewport height in pixels.
    pub height: usize,
    /// Width of the centered crop window the energy is computed over.
    pub crop_width: usize,
    /// Height of the centered crop window.
    pub crop_height: usize,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Viewport aspect ratio (width / height).
    pub aspect: f32,
    /// Near clip plane distance.
    pub z_near: f32,
    /// Far clip plane distance.
    pub z_far: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            crop_width: 200,
            crop_height: 200,
            fov_y: 58.59_f32.to_radians(),
            aspect: 1.778,
            z_near: 0.05,
            z_far: 1.0,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "render target is {}x{}",
            self.width,
            self.height
        );
        ensure!(
            self.crop_width > 0 && self.crop_height > 0,
            "crop window is {}x{}",
            self.crop_width,
            self.crop_height
        );
        ensure!(
            self.crop_width <= self.width && self.crop_height <= self.height,
            "crop {}x{} exceeds viewport {}x{}",
            self.crop_width,
            self.crop_height,
            self.width,
            self.height
        );
        ensure!(
            self.z_near > 0.0 && self.z_near < self.z_far,
            "invalid clip planes near={} far={}",
            self.z_near,
            self.z_far
        );
        Ok(())
    }

    /// Perspective projection with OpenGL clip conventions (NDC z in
    /// [-1, 1]), matching the reference depth maps.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov_y, self.z_near, self.z_far)
    }

    /// Viewport coordinates of the crop window's lower-left corner.
    pub fn crop_origin(&self) -> (usize, usize) {
        (
            (self.width - self.crop_width) / 2,
            (self.height - self.crop_height) / 2,
        )
    }
}

/// A vertex after projection and viewport mapping. `clip_w <= 0` marks a
/// vertex behind the camera; its screen fields are then meaningless.
#[derive(Debug, Clone, Copy)]
pub struct ScreenVertex {
    /// Viewport x in pixels (0 at the left edge).
    pub x: f32,
    /// Viewport y in pixels (0 at the bottom edge).
    pub y: f32,
    /// Window-space depth in [0, 1].
    pub depth: f32,
    /// Clip-space w, kept for the behind-camera test.
    pub clip_w: f32,
}

/// Project a model-space vertex through `mvp` onto the full viewport.
pub fn project_vertex(mvp: &Matrix4<f32>, v: [f32; 3], config: &RenderConfig) -> ScreenVertex {
    let clip = mvp * Vector4::new(v[0], v[1], v[2], 1.0);
    if clip.w <= 0.0 {
        return ScreenVertex {
            x: 0.0,
            y: 0.0,
            depth: 0.0,
            clip_w: clip.w,
        };
    }
    let inv_w = 1.0 / clip.w;
    ScreenVertex {
        x: (clip.x * inv_w + 1.0) * 0.5 * config.width as f32,
        y: (clip.y * inv_w + 1.0) * 0.5 * config.height as f32,
        depth: (clip.z * inv_w + 1.0) * 0.5,
        clip_w: clip.w,
    }
}
