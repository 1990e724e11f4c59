//! 6-DoF pose parameterization used as the swarm's search space.
//!
//! A pose is three world-space translations plus three Euler angles in
//! radians. Poses form a plain vector space (componentwise add/sub and
//! scalar scaling) so the swarm can combine them freely; no validation or
//! angle wraparound is applied, and physically implausible poses are
//! allowed on purpose — the render step prices them with a high energy.

use nalgebra::{Matrix4, Rotation3, Translation3, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A rigid 6-DoF pose: translation in world units, rotation as Euler
/// angles in radians applied about the fixed X, then Y, then Z axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseParameters {
    pub x_translation: f32,
    pub y_translation: f32,
    pub z_translation: f32,
    pub x_rotation: f32,
    pub y_rotation: f32,
    pub z_rotation: f32,
}

impl PoseParameters {
    /// The zero pose (identity placement, zero velocity seed).
    pub const ZERO: Self = Self {
        x_translation: 0.0,
        y_translation: 0.0,
        z_translation: 0.0,
        x_rotation: 0.0,
        y_rotation: 0.0,
        z_rotation: 0.0,
    };

    pub fn new(tx: f32, ty: f32, tz: f32, rx: f32, ry: f32, rz: f32) -> Self {
        Self {
            x_translation: tx,
            y_translation: ty,
            z_translation: tz,
            x_rotation: rx,
            y_rotation: ry,
            z_rotation: rz,
        }
    }

    /// Model transform for this pose: translate, then rotate about the
    /// fixed X, Y, Z axes in that order (`M = T · Rx · Ry · Rz`).
    ///
    /// Rotation composition is non-commutative, so this order is part of
    /// the energy definition and must match the reference renders.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        let t = Translation3::new(self.x_translation, self.y_translation, self.z_translation)
            .to_homogeneous();
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), self.x_rotation).to_homogeneous();
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), self.y_rotation).to_homogeneous();
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), self.z_rotation).to_homogeneous();
        t * rx * ry * rz
    }

    /// Clamp each component into `[-limit, limit]` of the corresponding
    /// component of `limit`. Used for the optional velocity clamp.
    pub fn abs_clamp(&self, limit: &PoseParameters) -> Self {
        fn clamp(v: f32, l: f32) -> f32 {
            let l = l.abs();
            v.clamp(-l, l)
        }
        Self {
            x_translation: clamp(self.x_translation, limit.x_translation),
            y_translation: clamp(self.y_translation, limit.y_translation),
            z_translation: clamp(self.z_translation, limit.z_translation),
            x_rotation: clamp(self.x_rotation, limit.x_rotation),
            y_rotation: clamp(self.y_rotation, limit.y_rotation),
            z_rotation: clamp(self.z_rotation, limit.z_rotation),
        }
    }

    /// Euclidean norm over all six components. Diagnostic only; the
    /// optimizer itself never mixes translation and rotation units.
    pub fn norm(&self) -> f32 {
        (self.x_translation * self.x_translation
            + self.y_translation * self.y_translation
            + self.z_translation * self.z_translation
            + self.x_rotation * self.x_rotation
            + self.y_rotation * self.y_rotation
            + self.z_rotation * self.z_rotation)
            .sqrt()
    }
}

impl Add for PoseParameters {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x_translation: self.x_translation + rhs.x_translation,
            y_translation: self.y_translation + rhs.y_translation,
            z_translation: self.z_translation + rhs.z_translation,
            x_rotation: self.x_rotation + rhs.x_rotation,
            y_rotation: self.y_rotation + rhs.y_rotation,
            z_rotation: self.z_rotation + rhs.z_rotation,
        }
    }
}

impl Sub for PoseParameters {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x_translation: self.x_translation - rhs.x_translation,
            y_translation: self.y_translation - rhs.y_translation,
            z_translation: self.z_translation - rhs.z_translation,
            x_rotation: self.x_rotation - rhs.x_rotation,
            y_rotation: self.y_rotation - rhs.y_rotation,
            z_rotation: self.z_rotation - rhs.z_rotation,
        }
    }
}

impl Mul<f32> for PoseParameters {
    type Output = Self;

    fn mul(self, c: f32) -> Self {
        Self {
            x_translation: c * self.x_translation,
            y_translation: c * self.y_translation,
            z_translation: c * self.z_translation,
            x_rotation: c * self.x_rotation,
            y_rotation: c * self.y_rotation,
            z_rotation: c * self.z_rotation,
        }
    }
}
