//! Renderable component for entities that can be rendered
//!
//! Holds what the entity should look like (mesh, material, flat color) and the
//! opaque reference to the batch slot it currently occupies. Only the batch
//! manager writes that reference.

use crate::ecs::Component;
use crate::foundation::math::Vec4;
use crate::render::batch::BatchRef;
use crate::render::material::MaterialType;
use crate::render::mesh::MeshType;
use serde::{Serialize, Deserialize};

/// Which mesh the entity draws
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshInfo {
    /// Source path for external meshes, built-in name otherwise
    pub path: String,
    /// Origin of the mesh
    pub mesh_type: MeshType,
    /// Index into the external mesh list; `None` for built-ins
    pub index: Option<usize>,
}

/// Which material the entity draws with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialInfo {
    /// Texture path for 2D materials
    pub path: String,
    /// Material kind
    pub material_type: MaterialType,
    /// Index into the material storage
    pub index: Option<usize>,
}

impl MaterialInfo {
    /// Material selection is complete
    pub const fn is_valid(&self) -> bool {
        self.index.is_some() && !matches!(self.material_type, MaterialType::None)
    }
}

/// Component for entities that can be rendered
///
/// Cloning copies the look but never the slot: a slot belongs to one renderable.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderableComponent {
    /// Flat color, used whenever no texture is bound
    pub color: Vec4,

    /// Mesh selection
    pub mesh: MeshInfo,

    /// Material selection
    pub material: MaterialInfo,

    #[serde(skip)]
    batch: Option<BatchRef>,
}

impl Default for RenderableComponent {
    fn default() -> Self {
        Self {
            color: Vec4::new(0.5, 0.5, 0.5, 1.0),
            mesh: MeshInfo::default(),
            material: MaterialInfo::default(),
            batch: None,
        }
    }
}

impl Clone for RenderableComponent {
    fn clone(&self) -> Self {
        Self {
            color: self.color,
            mesh: self.mesh.clone(),
            material: self.material.clone(),
            batch: None,
        }
    }
}

impl RenderableComponent {
    /// Create an empty renderable: default grey, no mesh, not batched
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set color
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    /// Builder pattern: select a built-in mesh
    pub fn with_builtin_mesh(mut self, mesh_type: MeshType) -> Self {
        self.mesh = MeshInfo {
            path: mesh_type.name().to_string(),
            mesh_type,
            index: None,
        };
        self
    }

    /// A mesh has been selected
    pub fn has_mesh(&self) -> bool {
        self.mesh.mesh_type != MeshType::None
    }

    /// Slot this renderable occupies, `None` while detached
    pub const fn batch(&self) -> Option<BatchRef> {
        self.batch
    }

    /// Attached to a batch slot
    pub const fn is_attached(&self) -> bool {
        self.batch.is_some()
    }

    pub(crate) fn set_batch(&mut self, batch: Option<BatchRef>) {
        self.batch = batch;
    }
}

impl Component for RenderableComponent {}
