//! OpenGL 4.3 core backend on top of `glow`
//!
//! GL objects live in slot maps so the renderer only ever sees opaque handles;
//! a stale handle resolves to nothing instead of a reused GL name.

use crate::assets::ImageData;
use crate::render::api::{
    BackendResult, BufferHandle, BufferKind, GraphicsBackend, ProgramHandle, TextureHandle,
    VertexArrayHandle,
};
use crate::render::mesh::Vertex;
use crate::render::RenderError;
use glow::HasContext;
use slotmap::{DefaultKey, Key, KeyData, SlotMap};

const FLOAT_SIZE: i32 = std::mem::size_of::<f32>() as i32;

/// Vertex attributes as (location, float count, float offset)
const VERTEX_ATTRIBUTES: [(u32, i32, i32); 4] = [(0, 3, 0), (1, 3, 3), (2, 2, 6), (3, 1, 8)];

struct GlBuffer {
    raw: glow::Buffer,
    kind: BufferKind,
    size: usize,
}

fn handle_of(key: DefaultKey) -> u64 {
    key.data().as_ffi()
}

fn key_of(handle: u64) -> DefaultKey {
    KeyData::from_ffi(handle).into()
}

const fn target_of(kind: BufferKind) -> u32 {
    match kind {
        BufferKind::Vertex => glow::ARRAY_BUFFER,
        BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
        BufferKind::Storage => glow::SHADER_STORAGE_BUFFER,
    }
}

/// Backend issuing real GL calls
pub struct OpenGlBackend {
    gl: glow::Context,
    buffers: SlotMap<DefaultKey, GlBuffer>,
    vertex_arrays: SlotMap<DefaultKey, glow::VertexArray>,
    programs: SlotMap<DefaultKey, glow::Program>,
    textures: SlotMap<DefaultKey, glow::Texture>,
    wireframe: bool,
}

impl OpenGlBackend {
    /// Wrap a loaded GL context and set the fixed pipeline state
    pub fn new(gl: glow::Context, wireframe: bool) -> Self {
        unsafe {
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LESS);
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            if wireframe {
                gl.polygon_mode(glow::FRONT_AND_BACK, glow::LINE);
            }
        }
        log::info!(
            "OpenGL backend ready: {} ({})",
            unsafe { gl.get_parameter_string(glow::RENDERER) },
            unsafe { gl.get_parameter_string(glow::VERSION) }
        );
        Self {
            gl,
            buffers: SlotMap::new(),
            vertex_arrays: SlotMap::new(),
            programs: SlotMap::new(),
            textures: SlotMap::new(),
            wireframe,
        }
    }

    /// Resize the viewport to the framebuffer size
    pub fn set_viewport(&mut self, width: i32, height: i32) {
        unsafe { self.gl.viewport(0, 0, width, height) };
    }

    /// Toggle line rendering
    pub fn set_wireframe(&mut self, wireframe: bool) {
        let mode = if wireframe { glow::LINE } else { glow::FILL };
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) };
        self.wireframe = wireframe;
    }

    /// Line rendering enabled
    pub const fn wireframe(&self) -> bool {
        self.wireframe
    }

    fn buffer(&self, buffer: BufferHandle) -> BackendResult<&GlBuffer> {
        self.buffers
            .get(key_of(buffer.0))
            .ok_or_else(|| RenderError::InvalidHandle(format!("{:?}", buffer)))
    }

    fn compile_stage(&self, stage: u32, name: &'static str, source: &str) -> BackendResult<glow::Shader> {
        unsafe {
            let shader = self
                .gl
                .create_shader(stage)
                .map_err(RenderError::ResourceCreationFailed)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(RenderError::ShaderCompilation { stage: name, log });
            }
            Ok(shader)
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<glow::UniformLocation> {
        let raw = *self.programs.get(key_of(program.0))?;
        unsafe { self.gl.get_uniform_location(raw, name) }
    }
}

impl GraphicsBackend for OpenGlBackend {
    fn begin_frame(&mut self, clear_color: [f32; 4]) {
        let [r, g, b, a] = clear_color;
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        let target = target_of(kind);
        let usage = match kind {
            BufferKind::Index => glow::STATIC_DRAW,
            BufferKind::Vertex | BufferKind::Storage => glow::DYNAMIC_DRAW,
        };
        let raw = unsafe {
            let raw = self
                .gl
                .create_buffer()
                .map_err(RenderError::ResourceCreationFailed)?;
            // Element buffers must not be bound without a VAO on core profiles.
            let bind_target = if kind == BufferKind::Index { glow::COPY_WRITE_BUFFER } else { target };
            self.gl.bind_buffer(bind_target, Some(raw));
            self.gl.buffer_data_u8_slice(bind_target, data, usage);
            self.gl.bind_buffer(bind_target, None);
            raw
        };
        let key = self.buffers.insert(GlBuffer { raw, kind, size: data.len() });
        log::debug!("Created {:?} buffer of {} bytes", kind, data.len());
        Ok(BufferHandle(handle_of(key)))
    }

    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> BackendResult<()> {
        let target = self.buffer(buffer)?;
        if offset + data.len() > target.size {
            return Err(RenderError::BackendError(format!(
                "write of {} bytes at {} overflows {:?} buffer of {} bytes",
                data.len(),
                offset,
                target.kind,
                target.size
            )));
        }
        let offset = i32::try_from(offset)
            .map_err(|_| RenderError::BackendError(format!("buffer offset {} out of range", offset)))?;
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(target.raw));
            self.gl.buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, offset, data);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        Ok(())
    }

    fn create_vertex_array(&mut self, vertices: BufferHandle, indices: BufferHandle) -> BackendResult<VertexArrayHandle> {
        let vbo = self.buffer(vertices)?.raw;
        let ibo = self.buffer(indices)?.raw;
        let stride = std::mem::size_of::<Vertex>() as i32;
        let vao = unsafe {
            let vao = self
                .gl
                .create_vertex_array()
                .map_err(RenderError::ResourceCreationFailed)?;
            self.gl.bind_vertex_array(Some(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
            for (location, count, offset) in VERTEX_ATTRIBUTES {
                self.gl.enable_vertex_attrib_array(location);
                self.gl.vertex_attrib_pointer_f32(location, count, glow::FLOAT, false, stride, offset * FLOAT_SIZE);
            }
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            vao
        };
        Ok(VertexArrayHandle(handle_of(self.vertex_arrays.insert(vao))))
    }

    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> BackendResult<ProgramHandle> {
        let vertex = self.compile_stage(glow::VERTEX_SHADER, "vertex", vertex_source)?;
        let fragment = match self.compile_stage(glow::FRAGMENT_SHADER, "fragment", fragment_source) {
            Ok(shader) => shader,
            Err(e) => {
                unsafe { self.gl.delete_shader(vertex) };
                return Err(e);
            }
        };
        let program = unsafe {
            let program = self
                .gl
                .create_program()
                .map_err(RenderError::ResourceCreationFailed)?;
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);
            let linked = self.gl.get_program_link_status(program);
            for shader in [vertex, fragment] {
                self.gl.detach_shader(program, shader);
                self.gl.delete_shader(shader);
            }
            if !linked {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(RenderError::ProgramLink(log));
            }
            program
        };
        Ok(ProgramHandle(handle_of(self.programs.insert(program))))
    }

    fn create_texture_2d(&mut self, image: &ImageData) -> BackendResult<TextureHandle> {
        let width = i32::try_from(image.width)
            .map_err(|_| RenderError::ResourceCreationFailed(format!("texture width {}", image.width)))?;
        let height = i32::try_from(image.height)
            .map_err(|_| RenderError::ResourceCreationFailed(format!("texture height {}", image.height)))?;
        let texture = unsafe {
            let texture = self
                .gl
                .create_texture()
                .map_err(RenderError::ResourceCreationFailed)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR_MIPMAP_LINEAR as i32);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(image.data.as_slice()),
            );
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            texture
        };
        Ok(TextureHandle(handle_of(self.textures.insert(texture))))
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let raw = self.programs.get(key_of(program.0)).copied();
        unsafe { self.gl.use_program(raw) };
    }

    fn set_uniform_mat4(&mut self, program: ProgramHandle, name: &str, value: &[f32; 16]) {
        if let Some(location) = self.uniform_location(program, name) {
            unsafe { self.gl.uniform_matrix_4_f32_slice(Some(&location), false, value) };
        }
    }

    fn set_uniform_i32(&mut self, program: ProgramHandle, name: &str, value: i32) {
        if let Some(location) = self.uniform_location(program, name) {
            unsafe { self.gl.uniform_1_i32(Some(&location), value) };
        }
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: BufferHandle) {
        if let Ok(target) = self.buffer(buffer) {
            let raw = target.raw;
            unsafe { self.gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, binding, Some(raw)) };
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        if let Some(raw) = self.textures.get(key_of(texture.0)).copied() {
            unsafe {
                self.gl.active_texture(glow::TEXTURE0 + unit);
                self.gl.bind_texture(glow::TEXTURE_2D, Some(raw));
            }
        }
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: usize) -> BackendResult<()> {
        let vao = *self
            .vertex_arrays
            .get(key_of(vertex_array.0))
            .ok_or_else(|| RenderError::InvalidHandle(format!("{:?}", vertex_array)))?;
        let count = i32::try_from(index_count)
            .map_err(|_| RenderError::BackendError(format!("index count {} out of range", index_count)))?;
        unsafe {
            self.gl.bind_vertex_array(Some(vao));
            self.gl.draw_elements(glow::TRIANGLES, count, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(target) = self.buffers.remove(key_of(buffer.0)) {
            unsafe { self.gl.delete_buffer(target.raw) };
        }
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if let Some(raw) = self.vertex_arrays.remove(key_of(vertex_array.0)) {
            unsafe { self.gl.delete_vertex_array(raw) };
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if let Some(raw) = self.programs.remove(key_of(program.0)) {
            unsafe { self.gl.delete_program(raw) };
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(raw) = self.textures.remove(key_of(texture.0)) {
            unsafe { self.gl.delete_texture(raw) };
        }
    }
}

impl Drop for OpenGlBackend {
    fn drop(&mut self) {
        unsafe {
            for (_, buffer) in self.buffers.drain() {
                self.gl.delete_buffer(buffer.raw);
            }
            for (_, vao) in self.vertex_arrays.drain() {
                self.gl.delete_vertex_array(vao);
            }
            for (_, program) in self.programs.drain() {
                self.gl.delete_program(program);
            }
            for (_, texture) in self.textures.drain() {
                self.gl.delete_texture(texture);
            }
        }
        log::debug!("OpenGL backend resources released");
    }
}
