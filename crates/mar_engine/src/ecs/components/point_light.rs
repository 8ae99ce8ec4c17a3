//! Point light component
//!
//! Light parameters are opaque data for the shaders. The position is taken from
//! the entity's transform when the light is written into the light batch.

use crate::ecs::Component;
use crate::render::batch::LightSlot;
use serde::{Serialize, Deserialize};

/// GPU layout of one point light (std430, 80 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    /// World position, w = 1
    pub position: [f32; 4],
    /// Ambient color
    pub ambient: [f32; 4],
    /// Diffuse color
    pub diffuse: [f32; 4],
    /// Specular color
    pub specular: [f32; 4],
    /// Constant attenuation term
    pub constant: f32,
    /// Linear attenuation term
    pub linear: f32,
    /// Quadratic attenuation term
    pub quadratic: f32,
    /// Intensity multiplier
    pub intensity: f32,
}

unsafe impl bytemuck::Zeroable for PointLight {}
unsafe impl bytemuck::Pod for PointLight {}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0, 1.0],
            ambient: [0.5, 0.5, 0.5, 1.0],
            diffuse: [0.9, 0.9, 0.9, 1.0],
            specular: [0.5, 0.5, 0.5, 1.0],
            constant: 1.0,
            linear: 0.045,
            quadratic: 0.0075,
            intensity: 1.0,
        }
    }
}

/// Point light attached to an entity
///
/// Clones start detached, like renderables.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointLightComponent {
    /// Light parameters
    pub light: PointLight,

    #[serde(skip)]
    slot: Option<LightSlot>,
}

impl Clone for PointLightComponent {
    fn clone(&self) -> Self {
        Self::new(self.light)
    }
}

impl PointLightComponent {
    /// Create a light with the given parameters
    pub fn new(light: PointLight) -> Self {
        Self { light, slot: None }
    }

    /// Slot in the light batch, `None` while detached
    pub const fn slot(&self) -> Option<LightSlot> {
        self.slot
    }

    pub(crate) fn set_slot(&mut self, slot: Option<LightSlot>) {
        self.slot = slot;
    }
}

impl Component for PointLightComponent {}
