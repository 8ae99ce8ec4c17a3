//! Shader pipelines for batch rendering
//!
//! One pipeline per [`BatchType`]. A pipeline whose program fails to build is
//! kept with [`ProgramHandle::INVALID`] and refuses to bind, so only the
//! batches that need it are skipped.

pub mod shaders;

use crate::render::api::{GraphicsBackend, ProgramHandle};
use crate::render::batch::BatchType;

/// Pipeline variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Flat per-instance color
    MeshColor,
    /// Sampled 2D texture
    MeshTexture2D,
}

impl PipelineKind {
    /// Pipeline drawing a batch type
    pub const fn for_batch(batch_type: BatchType) -> Self {
        match batch_type {
            BatchType::MeshStaticColor => Self::MeshColor,
            BatchType::MeshStaticTexture2D => Self::MeshTexture2D,
        }
    }

    fn sources(self) -> (&'static str, String) {
        match self {
            Self::MeshColor => (shaders::MESH_VERTEX, shaders::color_fragment()),
            Self::MeshTexture2D => (shaders::MESH_VERTEX, shaders::texture_fragment()),
        }
    }
}

/// A compiled program and its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    kind: PipelineKind,
    program: ProgramHandle,
}

impl Pipeline {
    /// Compile and link; failure is logged and yields an unusable pipeline
    pub fn create<B: GraphicsBackend>(backend: &mut B, kind: PipelineKind) -> Self {
        let (vertex, fragment) = kind.sources();
        let program = match backend.create_program(vertex, &fragment) {
            Ok(program) => {
                log::info!("{:?} pipeline created", kind);
                program
            }
            Err(e) => {
                log::error!("{:?} pipeline unavailable: {}", kind, e);
                ProgramHandle::INVALID
            }
        };
        Self { kind, program }
    }

    /// Pipeline variant
    pub const fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Program handle, possibly the invalid sentinel
    pub const fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Program built successfully
    pub const fn is_valid(&self) -> bool {
        self.program.is_valid()
    }

    /// Make the program current; `false` without touching the backend if invalid
    pub fn bind<B: GraphicsBackend>(&self, backend: &mut B) -> bool {
        if !self.is_valid() {
            return false;
        }
        backend.use_program(self.program);
        true
    }

    /// Release the program
    pub fn destroy<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if self.is_valid() {
            backend.destroy_program(self.program);
            self.program = ProgramHandle::INVALID;
        }
    }
}

/// Every pipeline the renderer draws with
#[derive(Debug)]
pub struct PipelineLibrary {
    color: Pipeline,
    texture: Pipeline,
}

impl PipelineLibrary {
    /// Build all pipelines
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> Self {
        Self {
            color: Pipeline::create(backend, PipelineKind::MeshColor),
            texture: Pipeline::create(backend, PipelineKind::MeshTexture2D),
        }
    }

    /// Pipeline of a kind
    pub const fn get(&self, kind: PipelineKind) -> &Pipeline {
        match kind {
            PipelineKind::MeshColor => &self.color,
            PipelineKind::MeshTexture2D => &self.texture,
        }
    }

    /// Release all programs
    pub fn destroy<B: GraphicsBackend>(&mut self, backend: &mut B) {
        self.color.destroy(backend);
        self.texture.destroy(backend);
    }
}
