//! Transform component for the ECS system
//!
//! Position, Euler rotation in degrees, and scale. The model matrix is derived
//! on demand and is what mesh batches store per instance.

use crate::foundation::math::{euler_degrees_trs, Mat4, Vec3};
use crate::ecs::Component;
use serde::{Serialize, Deserialize};

/// ECS Transform component
///
/// Pure data component representing spatial transformation in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformComponent {
    /// World space position
    pub position: Vec3,

    /// Euler angles in degrees, applied X then Y then Z
    pub rotation: Vec3,

    /// Scale factors
    pub scale: Vec3,
}

impl Component for TransformComponent {}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Model matrix: translate * rotX * rotY * rotZ * scale
    pub fn to_matrix(&self) -> Mat4 {
        euler_degrees_trs(&self.position, &self.rotation, &self.scale)
    }

    /// Builder pattern: Set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Builder pattern: Set rotation from Euler angles in degrees
    pub fn with_rotation_degrees(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = Vec3::new(x, y, z);
        self
    }

    /// Builder pattern: Set scale (uniform)
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Builder pattern: Set scale (non-uniform)
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }
}
