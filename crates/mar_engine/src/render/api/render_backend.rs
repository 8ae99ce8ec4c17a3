//! Backend abstraction traits for the rendering system
//!
//! This module defines the trait that rendering backends must implement so
//! the batch renderer never touches a graphics API directly. Resources are
//! referred to by opaque handles.

use crate::assets::ImageData;
use crate::render::RenderError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Handle to a vertex array (vertex buffer + index buffer + attribute layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayHandle(pub u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

impl ProgramHandle {
    /// Sentinel for a pipeline whose shaders failed to build
    pub const INVALID: Self = Self(u64::MAX);

    /// Not the failure sentinel
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }
}

/// Handle to a 2D texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// What a buffer is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Interleaved [`crate::render::Vertex`] data
    Vertex,
    /// `u32` triangle indices
    Index,
    /// Shader storage buffer (per-instance transforms, materials, lights)
    Storage,
}

/// Main rendering backend trait
///
/// Implementations issue the actual API calls. All methods are called from the
/// render thread, in the order upload then draw, once per frame.
pub trait GraphicsBackend {
    /// Clear the framebuffer and reset per-frame state
    fn begin_frame(&mut self, clear_color: [f32; 4]);

    /// Create a buffer initialized with `data`; its size is fixed to `data.len()`
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle>;

    /// Overwrite `data.len()` bytes of a buffer starting at `offset`
    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> BackendResult<()>;

    /// Bind a vertex and an index buffer under the engine's vertex layout
    fn create_vertex_array(&mut self, vertices: BufferHandle, indices: BufferHandle) -> BackendResult<VertexArrayHandle>;

    /// Compile and link a vertex + fragment program
    ///
    /// Fails with [`RenderError::ShaderCompilation`] or
    /// [`RenderError::ProgramLink`], carrying the driver log.
    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> BackendResult<ProgramHandle>;

    /// Upload an RGBA8 image as a mipmapped 2D texture
    fn create_texture_2d(&mut self, image: &ImageData) -> BackendResult<TextureHandle>;

    /// Make a program current
    fn use_program(&mut self, program: ProgramHandle);

    /// Set a `mat4` uniform on the current program (column-major)
    fn set_uniform_mat4(&mut self, program: ProgramHandle, name: &str, value: &[f32; 16]);

    /// Set an `int` uniform on the current program
    fn set_uniform_i32(&mut self, program: ProgramHandle, name: &str, value: i32);

    /// Bind a storage buffer to an indexed binding point
    fn bind_storage_buffer(&mut self, binding: u32, buffer: BufferHandle);

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Draw `index_count` indices from the start of a vertex array as triangles
    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: usize) -> BackendResult<()>;

    /// Release a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Release a vertex array
    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Release a program
    fn destroy_program(&mut self, program: ProgramHandle);

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);
}
