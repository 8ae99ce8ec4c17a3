//! Public rendering API
//!
//! The backend trait and the handle types it hands out.

pub mod render_backend;

pub use render_backend::{
    GraphicsBackend, BackendResult, BufferKind,
    BufferHandle, VertexArrayHandle, ProgramHandle, TextureHandle,
};
