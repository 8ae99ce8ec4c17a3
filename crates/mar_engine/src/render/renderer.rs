//! Batch renderer
//!
//! Each frame runs in a fixed order: clear, upload every pending dirty range,
//! then one indexed draw per batch that has at least one reserved slot.

use crate::config::RendererConfig;
use crate::ecs::components::PointLight;
use crate::foundation::math::{mat4_to_cols, Mat4};
use crate::render::api::{
    BackendResult, BufferHandle, BufferKind, GraphicsBackend, TextureHandle, VertexArrayHandle,
};
use crate::render::batch::{BatchManager, MaterialKey, MeshBatch};
use crate::render::material::MaterialStorage;
use crate::render::pipeline::shaders::{
    COLORS_BINDING, LIGHTS_BINDING, LIGHT_COUNT_UNIFORM, TEXTURE_UNIFORM, TRANSFORMS_BINDING,
    VIEW_PROJECTION_UNIFORM,
};
use crate::render::pipeline::{PipelineKind, PipelineLibrary};
use std::ops::Range;

const MAT4_BYTES: usize = 16 * std::mem::size_of::<f32>();
const VEC4_BYTES: usize = 4 * std::mem::size_of::<f32>();
const POINT_LIGHT_BYTES: usize = std::mem::size_of::<PointLight>();

/// Per-frame counters, reset by every [`Renderer::render_frame`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatistics {
    /// Draw calls issued
    pub draw_calls: usize,
    /// Vertices covered by the draw ranges
    pub vertices: usize,
    /// Indices drawn
    pub indices: usize,
    /// Triangles drawn
    pub triangles: usize,
    /// Renderables in drawn batches
    pub entities: usize,
    /// Non-empty batches not drawn because their pipeline is unusable
    pub batches_skipped: usize,
}

/// GPU copies of one mesh batch
#[derive(Debug, Clone, Copy)]
struct GpuBatch {
    vertices: BufferHandle,
    indices: BufferHandle,
    vertex_array: VertexArrayHandle,
    transforms: BufferHandle,
    colors: BufferHandle,
}

impl GpuBatch {
    /// Create every GPU object of a batch, releasing the partial set on failure
    fn create<B: GraphicsBackend>(backend: &mut B, batch: &MeshBatch) -> BackendResult<Self> {
        let mut created = Vec::with_capacity(4);
        let result = Self::create_tracked(backend, batch, &mut created);
        if result.is_err() {
            for buffer in created {
                backend.destroy_buffer(buffer);
            }
        }
        result
    }

    fn create_tracked<B: GraphicsBackend>(
        backend: &mut B,
        batch: &MeshBatch,
        created: &mut Vec<BufferHandle>,
    ) -> BackendResult<Self> {
        let vertices = tracked_buffer(backend, created, BufferKind::Vertex, bytemuck::cast_slice(batch.vertices()))?;
        let indices = tracked_buffer(backend, created, BufferKind::Index, bytemuck::cast_slice(batch.indices()))?;
        let transforms = tracked_buffer(backend, created, BufferKind::Storage, bytemuck::cast_slice(batch.transforms()))?;
        let colors = tracked_buffer(backend, created, BufferKind::Storage, bytemuck::cast_slice(batch.colors()))?;
        // Last, so a failure above never leaves a vertex array behind
        let vertex_array = backend.create_vertex_array(vertices, indices)?;
        Ok(Self {
            vertices,
            indices,
            vertex_array,
            transforms,
            colors,
        })
    }

    fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_vertex_array(self.vertex_array);
        for buffer in [self.vertices, self.indices, self.transforms, self.colors] {
            backend.destroy_buffer(buffer);
        }
    }
}

fn tracked_buffer<B: GraphicsBackend>(
    backend: &mut B,
    created: &mut Vec<BufferHandle>,
    kind: BufferKind,
    data: &[u8],
) -> BackendResult<BufferHandle> {
    let handle = backend.create_buffer(kind, data)?;
    created.push(handle);
    Ok(handle)
}

/// Upload a slice of a mirror for each dirty slot range
///
/// Ranges stay pending until the caller drains them after a successful upload.
fn upload_ranges<B: GraphicsBackend, T: bytemuck::Pod>(
    backend: &mut B,
    buffer: BufferHandle,
    mirror: &[T],
    stride: usize,
    ranges: &[Range<usize>],
) -> BackendResult<()> {
    for range in ranges {
        let offset = range.start * stride;
        backend.update_buffer(buffer, offset, bytemuck::cast_slice(&mirror[range.clone()]))?;
    }
    Ok(())
}

/// Draws the batches of a [`BatchManager`]
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    config: RendererConfig,
    pipelines: PipelineLibrary,
    gpu_batches: Vec<GpuBatch>,
    light_buffer: Option<BufferHandle>,
    textures: Vec<Option<TextureHandle>>,
    epoch: u64,
    view_projection: Mat4,
    stats: RenderStatistics,
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Build the pipelines on `backend`
    pub fn new(mut backend: B, config: RendererConfig) -> Self {
        let pipelines = PipelineLibrary::new(&mut backend);
        Self {
            backend,
            config,
            pipelines,
            gpu_batches: Vec::new(),
            light_buffer: None,
            textures: Vec::new(),
            epoch: 0,
            view_projection: Mat4::identity(),
            stats: RenderStatistics::default(),
        }
    }

    /// Backend in use
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend, e.g. for viewport changes
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Loaded pipelines
    pub const fn pipelines(&self) -> &PipelineLibrary {
        &self.pipelines
    }

    /// Counters of the last frame
    pub const fn statistics(&self) -> &RenderStatistics {
        &self.stats
    }

    /// Camera matrix used by the next frame
    pub fn set_view_projection(&mut self, view_projection: Mat4) {
        self.view_projection = view_projection;
    }

    /// Change the clear color
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.config.clear_color = color;
    }

    /// Clear, upload and draw one frame
    pub fn render_frame(&mut self, batches: &mut BatchManager, materials: &MaterialStorage) -> BackendResult<()> {
        self.stats = RenderStatistics::default();
        self.backend.begin_frame(self.config.clear_color);
        self.upload(batches, materials)?;
        self.draw(batches)
    }

    /// Synchronize GPU buffers with the batch mirrors
    ///
    /// New batches are created with their full mirrors; existing ones receive
    /// only their dirty ranges.
    pub fn upload(&mut self, batches: &mut BatchManager, materials: &MaterialStorage) -> BackendResult<()> {
        if batches.epoch() != self.epoch {
            log::debug!("Batch epoch changed, dropping {} GPU batches", self.gpu_batches.len());
            self.release_batches();
            self.epoch = batches.epoch();
        }

        self.upload_textures(materials);

        for (index, batch) in batches.batches_mut().iter_mut().enumerate() {
            if let Some(gpu) = self.gpu_batches.get(index).copied() {
                upload_ranges(&mut self.backend, gpu.transforms, batch.transforms(), MAT4_BYTES, batch.transform_ranges())?;
                batch.take_transform_ranges();
                upload_ranges(&mut self.backend, gpu.colors, batch.colors(), VEC4_BYTES, batch.color_ranges())?;
                batch.take_color_ranges();
            } else {
                self.gpu_batches.push(GpuBatch::create(&mut self.backend, batch)?);
                batch.mark_clean();
                log::debug!("Uploaded batch {} ({} slots)", index, batch.capacity());
            }
        }

        let lights = batches.light_batch_mut();
        match self.light_buffer {
            Some(buffer) => {
                upload_ranges(&mut self.backend, buffer, lights.lights(), POINT_LIGHT_BYTES, lights.dirty_ranges())?;
                lights.take_dirty();
            }
            None => {
                let buffer = self.backend.create_buffer(BufferKind::Storage, bytemuck::cast_slice(lights.lights()))?;
                self.light_buffer = Some(buffer);
                lights.mark_clean();
            }
        }
        Ok(())
    }

    fn upload_textures(&mut self, materials: &MaterialStorage) {
        while self.textures.len() < materials.count() {
            let index = self.textures.len();
            let handle = materials.texture(index).and_then(|texture| {
                match self.backend.create_texture_2d(texture.image()) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        log::error!("Texture {} could not be uploaded: {}", texture.path(), e);
                        None
                    }
                }
            });
            self.textures.push(handle);
        }
    }

    /// Issue one draw per non-empty batch
    pub fn draw(&mut self, batches: &BatchManager) -> BackendResult<()> {
        let view_projection = mat4_to_cols(&self.view_projection);
        let light_count = i32::try_from(batches.light_batch().active_count()).unwrap_or(i32::MAX);
        if let Some(buffer) = self.light_buffer {
            self.backend.bind_storage_buffer(LIGHTS_BINDING, buffer);
        }

        for (index, batch) in batches.batches().iter().enumerate() {
            let index_count = batch.draw_index_count();
            if index_count == 0 {
                continue;
            }
            let Some(gpu) = self.gpu_batches.get(index).copied() else {
                log::warn!("Batch {} was never uploaded, skipping", index);
                continue;
            };

            let texture = match batch.key().material {
                MaterialKey::Texture2D(i) => self.textures.get(i).copied().flatten(),
                MaterialKey::Color => None,
            };
            let kind = match (PipelineKind::for_batch(batch.batch_type()), texture) {
                (PipelineKind::MeshTexture2D, None) => PipelineKind::MeshColor,
                (kind, _) => kind,
            };

            let pipeline = self.pipelines.get(kind);
            if !pipeline.bind(&mut self.backend) {
                self.stats.batches_skipped += 1;
                continue;
            }
            let program = pipeline.program();
            self.backend.set_uniform_mat4(program, VIEW_PROJECTION_UNIFORM, &view_projection);
            self.backend.set_uniform_i32(program, LIGHT_COUNT_UNIFORM, light_count);
            if let (PipelineKind::MeshTexture2D, Some(texture)) = (kind, texture) {
                self.backend.bind_texture(0, texture);
                self.backend.set_uniform_i32(program, TEXTURE_UNIFORM, 0);
            }
            self.backend.bind_storage_buffer(TRANSFORMS_BINDING, gpu.transforms);
            self.backend.bind_storage_buffer(COLORS_BINDING, gpu.colors);
            self.backend.draw_indexed(gpu.vertex_array, index_count)?;

            self.stats.draw_calls += 1;
            self.stats.indices += index_count;
            self.stats.triangles += index_count / 3;
            self.stats.vertices += batch.draw_vertex_count();
            self.stats.entities += batch.occupied();
        }

        log::trace!("Frame drawn: {:?}", self.stats);
        Ok(())
    }

    fn release_batches(&mut self) {
        for gpu in self.gpu_batches.drain(..) {
            gpu.destroy(&mut self.backend);
        }
        if let Some(buffer) = self.light_buffer.take() {
            self.backend.destroy_buffer(buffer);
        }
    }
}

impl<B: GraphicsBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.release_batches();
        for texture in self.textures.drain(..).flatten() {
            self.backend.destroy_texture(texture);
        }
        self.pipelines.destroy(&mut self.backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ImageData;
    use crate::ecs::components::{RenderableComponent, TransformComponent};
    use crate::ecs::{Entity, World};
    use crate::foundation::math::Vec3;
    use crate::render::backends::{BackendCall, HeadlessBackend};
    use crate::render::mesh::MeshType;
    use crate::render::mesh_storage::MeshStorage;

    struct Fixture {
        world: World,
        meshes: MeshStorage,
        materials: MaterialStorage,
        manager: BatchManager,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                world: World::new(),
                meshes: MeshStorage::new(),
                materials: MaterialStorage::new(),
                manager: BatchManager::new(&RendererConfig::default()),
            }
        }

        fn spawn(&mut self, mesh_type: MeshType) -> Entity {
            let entity = self.world.create_entity();
            let transform = TransformComponent::identity();
            let mut renderable = RenderableComponent::new().with_builtin_mesh(mesh_type);
            self.manager
                .attach(entity, &transform, &mut renderable, &self.meshes, &self.materials)
                .unwrap();
            self.world.add_component(entity, transform);
            self.world.add_component(entity, renderable);
            entity
        }
    }

    fn renderer() -> Renderer<HeadlessBackend> {
        Renderer::new(HeadlessBackend::new(), RendererConfig::default())
    }

    #[test]
    fn test_one_draw_per_non_empty_batch() {
        let mut fx = Fixture::new();
        for _ in 0..3 {
            fx.spawn(MeshType::Cube);
        }
        fx.spawn(MeshType::Pyramid);
        let mut renderer = renderer();

        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();

        let draws = renderer.backend().draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].1, 3 * 36);
        assert_eq!(draws[1].1, 18);
        let stats = renderer.statistics();
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.entities, 4);
        assert_eq!(stats.triangles, 36 + 6);
        assert_eq!(stats.vertices, 3 * 8 + 5);
    }

    #[test]
    fn test_empty_batch_issues_no_draw() {
        let mut fx = Fixture::new();
        let entity = fx.spawn(MeshType::Surface);
        let renderable = fx.world.get_component_mut::<RenderableComponent>(entity).unwrap();
        fx.manager.detach(renderable).unwrap();
        let mut renderer = renderer();

        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();

        assert_eq!(fx.manager.batches().len(), 1);
        assert!(renderer.backend().draws().is_empty());
        assert_eq!(renderer.statistics().draw_calls, 0);
    }

    #[test]
    fn test_only_dirty_ranges_are_uploaded() {
        let mut fx = Fixture::new();
        let entities: Vec<_> = (0..4).map(|_| fx.spawn(MeshType::Cube)).collect();
        let mut renderer = renderer();
        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();
        renderer.backend_mut().clear_calls();

        let moved = TransformComponent::from_position(Vec3::new(0.0, 7.0, 0.0));
        let renderable = fx.world.get_component::<RenderableComponent>(entities[2]).unwrap();
        fx.manager.on_transform_updated(&moved, renderable).unwrap();
        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();

        let updates: Vec<_> = renderer
            .backend()
            .calls()
            .iter()
            .filter_map(|c| match c {
                BackendCall::UpdateBuffer(_, offset, len) => Some((*offset, *len)),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec![(2 * MAT4_BYTES, MAT4_BYTES)]);

        let gpu = renderer.gpu_batches[0];
        let floats = renderer.backend().buffer_floats(gpu.transforms).unwrap();
        assert_eq!(floats[2 * 16 + 13], 7.0);
    }

    #[test]
    fn test_failed_upload_keeps_ranges_pending() {
        let mut fx = Fixture::new();
        let entities: Vec<_> = (0..2).map(|_| fx.spawn(MeshType::Cube)).collect();
        let mut renderer = renderer();
        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();

        let moved = TransformComponent::from_position(Vec3::new(0.0, 7.0, 0.0));
        let renderable = fx.world.get_component::<RenderableComponent>(entities[1]).unwrap();
        fx.manager.on_transform_updated(&moved, renderable).unwrap();

        renderer.backend_mut().set_fail_updates(true);
        assert!(renderer.render_frame(&mut fx.manager, &fx.materials).is_err());
        assert_eq!(fx.manager.batches()[0].transform_ranges(), &[1..2]);

        renderer.backend_mut().set_fail_updates(false);
        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();
        assert_eq!(fx.manager.batches()[0].pending_ranges(), 0);
        let gpu = renderer.gpu_batches[0];
        let floats = renderer.backend().buffer_floats(gpu.transforms).unwrap();
        assert_eq!(floats[16 + 13], 7.0);
    }

    #[test]
    fn test_failed_batch_creation_releases_buffers() {
        let mut fx = Fixture::new();
        fx.spawn(MeshType::Cube);
        let mut renderer = Renderer::new(HeadlessBackend::with_buffer_limit(3), RendererConfig::default());

        assert!(renderer.render_frame(&mut fx.manager, &fx.materials).is_err());
        assert_eq!(renderer.backend().buffer_count(), 0);
        assert!(renderer.gpu_batches.is_empty());
    }

    #[test]
    fn test_upload_precedes_draw() {
        let mut fx = Fixture::new();
        let entity = fx.spawn(MeshType::Cube);
        let mut renderer = renderer();
        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();
        renderer.backend_mut().clear_calls();

        let renderable = fx.world.get_component_mut::<RenderableComponent>(entity).unwrap();
        renderable.color = crate::foundation::math::Vec4::new(1.0, 0.0, 0.0, 1.0);
        fx.manager.on_color_updated(renderable).unwrap();
        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();

        let calls = renderer.backend().calls();
        let upload = calls.iter().position(|c| matches!(c, BackendCall::UpdateBuffer(..))).unwrap();
        let draw = calls.iter().position(|c| matches!(c, BackendCall::DrawIndexed(..))).unwrap();
        assert!(upload < draw);
    }

    #[test]
    fn test_failed_pipeline_skips_batches() {
        let mut fx = Fixture::new();
        fx.spawn(MeshType::Cube);
        let mut renderer = Renderer::new(HeadlessBackend::with_failing_shaders(), RendererConfig::default());

        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();

        assert!(renderer.backend().draws().is_empty());
        assert_eq!(renderer.statistics().batches_skipped, 1);
    }

    #[test]
    fn test_textured_batch_binds_its_texture() {
        let mut fx = Fixture::new();
        fx.materials.insert_texture("checker.png", ImageData::solid_color(2, 2, [200; 4]));
        let entity = fx.world.create_entity();
        let transform = TransformComponent::identity();
        let mut renderable = RenderableComponent::new().with_builtin_mesh(MeshType::Cube);
        fx.materials.assign(&mut renderable, "checker.png").unwrap();
        fx.manager
            .attach(entity, &transform, &mut renderable, &fx.meshes, &fx.materials)
            .unwrap();
        let mut renderer = renderer();

        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();

        let calls = renderer.backend().calls();
        assert!(calls.iter().any(|c| matches!(c, BackendCall::BindTexture(0, _))));
        assert_eq!(renderer.backend().draws().len(), 1);
    }

    #[test]
    fn test_reset_recreates_gpu_batches() {
        let mut fx = Fixture::new();
        fx.spawn(MeshType::Cube);
        let mut renderer = renderer();
        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();
        // 4 per batch plus the light buffer
        assert_eq!(renderer.backend().buffer_count(), 5);

        fx.manager.reset(&mut fx.world);
        renderer.backend_mut().clear_calls();
        renderer.render_frame(&mut fx.manager, &fx.materials).unwrap();
        assert_eq!(renderer.backend().buffer_count(), 1);
        assert!(renderer.backend().draws().is_empty());
    }
}
