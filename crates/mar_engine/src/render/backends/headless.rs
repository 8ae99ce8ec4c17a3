//! Headless backend
//!
//! Keeps buffer contents in memory and records every call, so batching and
//! draw submission can be verified without a GPU context.

use crate::assets::ImageData;
use crate::render::api::{
    BackendResult, BufferHandle, BufferKind, GraphicsBackend, ProgramHandle, TextureHandle,
    VertexArrayHandle,
};
use crate::render::RenderError;
use slotmap::{DefaultKey, Key, KeyData, SlotMap};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// Frame started
    BeginFrame,
    /// Buffer created with this many bytes
    CreateBuffer(BufferHandle, BufferKind, usize),
    /// Bytes written at an offset
    UpdateBuffer(BufferHandle, usize, usize),
    /// Vertex array created
    CreateVertexArray(VertexArrayHandle),
    /// Program created
    CreateProgram(ProgramHandle),
    /// Texture created
    CreateTexture(TextureHandle),
    /// Program made current
    UseProgram(ProgramHandle),
    /// Uniform written
    SetUniform(String),
    /// Storage buffer bound
    BindStorageBuffer(u32, BufferHandle),
    /// Texture bound to a unit
    BindTexture(u32, TextureHandle),
    /// Indexed draw
    DrawIndexed(VertexArrayHandle, usize),
}

#[derive(Debug)]
struct HeadlessBuffer {
    kind: BufferKind,
    data: Vec<u8>,
}

/// Recording backend for tests and tools
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    buffers: SlotMap<DefaultKey, HeadlessBuffer>,
    vertex_arrays: SlotMap<DefaultKey, (BufferHandle, BufferHandle)>,
    programs: SlotMap<DefaultKey, ()>,
    textures: SlotMap<DefaultKey, (u32, u32)>,
    calls: Vec<BackendCall>,
    fail_shaders: bool,
    fail_updates: bool,
    buffer_limit: Option<usize>,
}

fn handle_of(key: DefaultKey) -> u64 {
    key.data().as_ffi()
}

fn key_of(handle: u64) -> DefaultKey {
    KeyData::from_ffi(handle).into()
}

impl HeadlessBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose shader compilation always fails
    pub fn with_failing_shaders() -> Self {
        Self {
            fail_shaders: true,
            ..Self::default()
        }
    }

    /// Backend that refuses to hold more than `limit` live buffers
    pub fn with_buffer_limit(limit: usize) -> Self {
        Self {
            buffer_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Make every following buffer update fail, or succeed again
    pub fn set_fail_updates(&mut self, fail: bool) {
        self.fail_updates = fail;
    }

    /// Every call since creation or the last [`Self::clear_calls`]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Forget recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Recorded draws as (vertex array, index count)
    pub fn draws(&self) -> Vec<(VertexArrayHandle, usize)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::DrawIndexed(vao, count) => Some((*vao, *count)),
                _ => None,
            })
            .collect()
    }

    /// Current bytes of a buffer
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(key_of(buffer.0)).map(|b| b.data.as_slice())
    }

    /// Current contents of a buffer as floats
    pub fn buffer_floats(&self, buffer: BufferHandle) -> Option<Vec<f32>> {
        self.buffer_contents(buffer).map(bytemuck::pod_collect_to_vec)
    }

    /// Live buffer count
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Live program count
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn begin_frame(&mut self, _clear_color: [f32; 4]) {
        self.calls.push(BackendCall::BeginFrame);
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        if self.buffer_limit.is_some_and(|limit| self.buffers.len() >= limit) {
            return Err(RenderError::BackendError(format!(
                "{:?} buffer refused, {} buffers live",
                kind,
                self.buffers.len()
            )));
        }
        let key = self.buffers.insert(HeadlessBuffer { kind, data: data.to_vec() });
        let handle = BufferHandle(handle_of(key));
        self.calls.push(BackendCall::CreateBuffer(handle, kind, data.len()));
        Ok(handle)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> BackendResult<()> {
        if self.fail_updates {
            return Err(RenderError::BackendError(format!("update of {:?} refused", buffer)));
        }
        let target = self
            .buffers
            .get_mut(key_of(buffer.0))
            .ok_or_else(|| RenderError::InvalidHandle(format!("{:?}", buffer)))?;
        let end = offset + data.len();
        if end > target.data.len() {
            return Err(RenderError::BackendError(format!(
                "write of {} bytes at {} overflows {:?} buffer of {} bytes",
                data.len(),
                offset,
                target.kind,
                target.data.len()
            )));
        }
        target.data[offset..end].copy_from_slice(data);
        self.calls.push(BackendCall::UpdateBuffer(buffer, offset, data.len()));
        Ok(())
    }

    fn create_vertex_array(&mut self, vertices: BufferHandle, indices: BufferHandle) -> BackendResult<VertexArrayHandle> {
        for buffer in [vertices, indices] {
            if !self.buffers.contains_key(key_of(buffer.0)) {
                return Err(RenderError::InvalidHandle(format!("{:?}", buffer)));
            }
        }
        let handle = VertexArrayHandle(handle_of(self.vertex_arrays.insert((vertices, indices))));
        self.calls.push(BackendCall::CreateVertexArray(handle));
        Ok(handle)
    }

    fn create_program(&mut self, _vertex_source: &str, _fragment_source: &str) -> BackendResult<ProgramHandle> {
        if self.fail_shaders {
            return Err(RenderError::ShaderCompilation {
                stage: "vertex",
                log: "headless backend configured to fail".to_string(),
            });
        }
        let handle = ProgramHandle(handle_of(self.programs.insert(())));
        self.calls.push(BackendCall::CreateProgram(handle));
        Ok(handle)
    }

    fn create_texture_2d(&mut self, image: &ImageData) -> BackendResult<TextureHandle> {
        let handle = TextureHandle(handle_of(self.textures.insert((image.width, image.height))));
        self.calls.push(BackendCall::CreateTexture(handle));
        Ok(handle)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn set_uniform_mat4(&mut self, _program: ProgramHandle, name: &str, _value: &[f32; 16]) {
        self.calls.push(BackendCall::SetUniform(name.to_string()));
    }

    fn set_uniform_i32(&mut self, _program: ProgramHandle, name: &str, _value: i32) {
        self.calls.push(BackendCall::SetUniform(name.to_string()));
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: BufferHandle) {
        self.calls.push(BackendCall::BindStorageBuffer(binding, buffer));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.calls.push(BackendCall::BindTexture(unit, texture));
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: usize) -> BackendResult<()> {
        if !self.vertex_arrays.contains_key(key_of(vertex_array.0)) {
            return Err(RenderError::InvalidHandle(format!("{:?}", vertex_array)));
        }
        self.calls.push(BackendCall::DrawIndexed(vertex_array, index_count));
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(key_of(buffer.0));
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(key_of(vertex_array.0));
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(key_of(program.0));
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(key_of(texture.0));
    }
}
