//! Batch management
//!
//! Renderables sharing a mesh and a material are packed into fixed-capacity
//! batches. Each batch holds `capacity` copies of the mesh geometry, one per
//! slot, with the slot baked into every vertex as `shape_index`; the shaders
//! use it to look up the slot's transform and color. One draw call covers a
//! whole batch.
//!
//! Components hold only an opaque [`BatchRef`] / [`LightSlot`]. The
//! [`BatchManager`] is the sole owner of slots and the only writer of those
//! references.

pub mod slots;
pub mod dirty;
pub mod mesh_batch;
pub mod light_batch;
pub mod manager;

pub use slots::{SlotHandle, SlotPool};
pub use dirty::{DirtyFlags, DirtyRanges};
pub use mesh_batch::MeshBatch;
pub use light_batch::PointLightBatch;
pub use manager::{BatchManager, BatchStats};

use crate::render::material::MaterialType;
use crate::render::mesh::MeshType;

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while assigning batch slots
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// No batch could be created to hold the renderable
    #[error("Batch allocation exhausted: {0}")]
    Exhausted(String),

    /// Handle does not refer to a slot reserved by its holder
    #[error("Stale batch slot handle: {0:?}")]
    StaleHandle(SlotHandle),
}

/// Shader family a batch is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchType {
    /// Static mesh, flat per-instance color
    MeshStaticColor,
    /// Static mesh sampling a 2D texture
    MeshStaticTexture2D,
}

/// Mesh half of a batch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKey {
    /// Built-in cube
    Cube,
    /// Built-in pyramid
    Pyramid,
    /// Built-in surface
    Surface,
    /// External mesh by storage index
    External(usize),
}

impl MeshKey {
    /// Key for a mesh selection; `None` when nothing drawable is selected
    pub const fn from_selection(mesh_type: MeshType, index: Option<usize>) -> Option<Self> {
        match (mesh_type, index) {
            (MeshType::Cube, _) => Some(Self::Cube),
            (MeshType::Pyramid, _) => Some(Self::Pyramid),
            (MeshType::Surface, _) => Some(Self::Surface),
            (MeshType::External, Some(i)) => Some(Self::External(i)),
            (MeshType::External, None) | (MeshType::None, _) => None,
        }
    }
}

/// Material half of a batch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKey {
    /// Flat color from the renderable
    Color,
    /// 2D texture by storage index
    Texture2D(usize),
}

impl MaterialKey {
    /// Material kind of the key
    pub const fn material_type(self) -> MaterialType {
        match self {
            Self::Color => MaterialType::None,
            Self::Texture2D(_) => MaterialType::Texture2D,
        }
    }
}

/// What every renderable in a batch shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    /// Mesh geometry
    pub mesh: MeshKey,
    /// Material
    pub material: MaterialKey,
}

impl BatchKey {
    /// Shader family for this key
    pub const fn batch_type(&self) -> BatchType {
        match self.material {
            MaterialKey::Color => BatchType::MeshStaticColor,
            MaterialKey::Texture2D(_) => BatchType::MeshStaticTexture2D,
        }
    }
}

/// Opaque link from a renderable to its reserved slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchRef {
    /// Shader family of the batch
    pub batch_type: BatchType,
    /// Batch index inside the manager
    pub batch: usize,
    /// Reserved slot
    pub slot: SlotHandle,
}

impl BatchRef {
    /// Index into the batch's transform array
    pub const fn transform_slot(&self) -> usize {
        self.slot.slot()
    }

    /// Index into the batch's material array
    pub const fn material_slot(&self) -> usize {
        self.slot.slot()
    }
}

/// Opaque link from a point light to its slot in the light batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightSlot(pub(crate) SlotHandle);

impl LightSlot {
    /// Index into the light array
    pub const fn index(&self) -> usize {
        self.0.slot()
    }
}
