//! Mesh representation for batched rendering
//!
//! Vertex layout shared by every pipeline, the immutable mesh proxy that
//! renderables reference, and the literal geometry of the built-in primitives.

use serde::{Serialize, Deserialize};

/// Number of floats in one [`Vertex`]
pub const VERTEX_FLOATS: usize = 9;

/// 3D vertex data structure for rendering
///
/// `shape_index` is baked per instance when a mesh is copied into a batch, so a
/// single draw call can look up the owning instance's transform and material.
///
/// # Memory Layout
/// `#[repr(C)]` keeps the layout identical to the vertex attribute setup:
/// location 0 position, 1 normal, 2 uv, 3 shape index.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Texture coordinates
    pub uv: [f32; 2],

    /// Instance slot inside a batch
    pub shape_index: f32,
}

unsafe impl bytemuck::Zeroable for Vertex {}
unsafe impl bytemuck::Pod for Vertex {}

impl Vertex {
    /// Create a new vertex with shape index 0
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            shape_index: 0.0,
        }
    }

    /// Copy of this vertex tagged with a batch slot
    pub const fn with_shape_index(mut self, shape_index: f32) -> Self {
        self.shape_index = shape_index;
        self
    }
}

/// Where a mesh proxy comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MeshType {
    /// No mesh selected
    #[default]
    None,
    /// Built-in cube
    Cube,
    /// Built-in pyramid
    Pyramid,
    /// Built-in ground surface
    Surface,
    /// Loaded from an OBJ file
    External,
}

impl MeshType {
    /// Human-readable name, also used as the retrieval name of built-ins
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Cube => "Cube",
            Self::Pyramid => "Pyramid",
            Self::Surface => "Surface",
            Self::External => "External",
        }
    }
}

impl std::fmt::Display for MeshType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Immutable indexed triangle mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshProxy {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    mesh_type: MeshType,
    name: String,
}

impl MeshProxy {
    /// Create a mesh proxy
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, mesh_type: MeshType, name: impl Into<String>) -> Self {
        Self {
            vertices,
            indices,
            mesh_type,
            name: name.into(),
        }
    }

    /// Vertex data
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Triangle list indices into [`Self::vertices`]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Mesh origin
    pub const fn mesh_type(&self) -> MeshType {
        self.mesh_type
    }

    /// Name (built-in name or source path)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// A mesh with nothing to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Built-in unit cube, 8 shared corners
    pub fn cube() -> Self {
        let vertices = vec![
            Vertex::new([-1.0, -1.0, 1.0], [-1.0, -1.0, 2.0], [0.0, 0.0]),
            Vertex::new([1.0, -1.0, 1.0], [2.0, -2.0, 1.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, 1.0], [1.0, 1.0, 2.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, 1.0], [-2.0, 2.0, 1.0], [0.0, 1.0]),
            Vertex::new([-1.0, -1.0, -1.0], [-2.0, -2.0, -1.0], [0.0, 0.0]),
            Vertex::new([1.0, -1.0, -1.0], [1.0, -1.0, -2.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, -1.0], [2.0, 2.0, -1.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, -1.0], [-1.0, 1.0, -2.0], [0.0, 1.0]),
        ];
        let indices = vec![
            0, 1, 2, 7, 6, 5, 2, 3, 0, 5, 4, 7,
            1, 5, 6, 4, 0, 3, 6, 2, 1, 3, 7, 4,
            4, 5, 1, 3, 2, 6, 1, 0, 4, 6, 7, 3,
        ];
        Self::new(vertices, indices, MeshType::Cube, MeshType::Cube.name())
    }

    /// Built-in square-based pyramid
    pub fn pyramid() -> Self {
        let vertices = vec![
            Vertex::new([-1.0, -1.0, 1.0], [-0.894_427, 2.894_43, 1.894_43], [0.0, 0.0]),
            Vertex::new([1.0, -1.0, 1.0], [0.894_427, 1.894_43, 1.894_43], [0.0, 1.0]),
            Vertex::new([1.0, -1.0, -1.0], [0.894_427, 2.894_43, 0.105_573], [0.0, 0.0]),
            Vertex::new([-1.0, -1.0, -1.0], [-0.894_427, 1.894_43, 0.105_573], [0.0, 1.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 1.788_85, 1.0], [0.5, 0.5]),
        ];
        let indices = vec![
            0, 1, 2, 2, 3, 0,
            0, 1, 4, 1, 2, 4,
            2, 3, 4, 3, 0, 4,
        ];
        Self::new(vertices, indices, MeshType::Pyramid, MeshType::Pyramid.name())
    }

    /// Built-in 30x30 ground quad at y = -1
    pub fn surface() -> Self {
        let vertices = vec![
            Vertex::new([-15.0, -1.0, 15.0], [0.0, 2.0, 1.0], [0.0, 0.0]),
            Vertex::new([15.0, -1.0, 15.0], [0.0, 1.0, 1.0], [0.0, 1.0]),
            Vertex::new([15.0, -1.0, -15.0], [0.0, 2.0, 1.0], [1.0, 1.0]),
            Vertex::new([-15.0, -1.0, -15.0], [0.0, 1.0, 1.0], [1.0, 0.0]),
        ];
        let indices = vec![0, 1, 2, 2, 3, 0];
        Self::new(vertices, indices, MeshType::Surface, MeshType::Surface.name())
    }
}
