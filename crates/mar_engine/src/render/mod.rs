//! # Rendering System
//!
//! Batched draw submission over an abstract graphics backend.
//!
//! ## Architecture
//!
//! - **Mesh / MeshStorage**: built-in primitives and externally loaded meshes
//! - **MaterialStorage**: 2D textures, deduplicated by path
//! - **BatchManager**: groups renderables sharing a (mesh, material) key into
//!   fixed-capacity batches and keeps their CPU mirrors up to date
//! - **Renderer**: uploads dirty ranges and issues one draw per non-empty batch
//! - **Backends**: `OpenGlBackend` (glow) and `HeadlessBackend` (recording)
//!
//! Frame order is strict: component events are dispatched into the batch
//! manager, then dirty ranges are uploaded, then batches are drawn.

pub mod api;
pub mod backends;
pub mod mesh;
pub mod mesh_storage;
pub mod material;
pub mod batch;
pub mod pipeline;
pub mod renderer;

pub use api::{
    GraphicsBackend, BackendResult, BufferKind,
    BufferHandle, VertexArrayHandle, ProgramHandle, TextureHandle,
};
pub use backends::{HeadlessBackend, BackendCall, OpenGlBackend};
pub use mesh::{Vertex, MeshProxy, MeshType, VERTEX_FLOATS};
pub use mesh_storage::MeshStorage;
pub use material::{MaterialStorage, MaterialType, Texture2D};
pub use batch::{
    BatchManager, BatchError, BatchResult, BatchType, BatchKey, BatchRef, BatchStats,
    LightSlot, MeshBatch, PointLightBatch,
};
pub use pipeline::{PipelineKind, Pipeline, PipelineLibrary};
pub use renderer::{Renderer, RenderStatistics};

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Backend could not be created
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A shader stage did not compile
    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompilation {
        /// Stage name ("vertex" or "fragment")
        stage: &'static str,
        /// Driver info log
        log: String,
    },

    /// Program did not link
    #[error("Shader program link failed: {0}")]
    ProgramLink(String),

    /// GPU object creation failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Handle does not refer to a live object
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Other backend failure
    #[error("Backend error: {0}")]
    BackendError(String),
}
