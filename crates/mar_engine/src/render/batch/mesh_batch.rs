//! Mesh batch: one draw call worth of instances of one mesh

use super::{BatchError, BatchKey, BatchResult, BatchType, DirtyFlags, DirtyRanges, SlotHandle, SlotPool};
use crate::config::GraphicLimits;
use crate::ecs::Entity;
use crate::foundation::math::{mat4_to_cols, Mat4, Vec4};
use crate::render::mesh::{MeshProxy, Vertex};
use std::ops::Range;

/// Column-major matrix of a free slot; collapses its copy of the mesh to a point
const ZERO_TRANSFORM: [f32; 16] = [0.0; 16];

/// Fixed-capacity batch with CPU mirrors of every GPU buffer
#[derive(Debug, Clone)]
pub struct MeshBatch {
    key: BatchKey,
    mesh_vertex_count: usize,
    mesh_index_count: usize,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    transforms: Vec<[f32; 16]>,
    colors: Vec<[f32; 4]>,
    slots: SlotPool,
    transforms_dirty: DirtyRanges,
    colors_dirty: DirtyRanges,
}

impl MeshBatch {
    /// Instances of `mesh` one batch can hold under `limits`
    pub fn capacity_for(mesh: &MeshProxy, limits: &GraphicLimits) -> usize {
        if mesh.is_empty() {
            return 0;
        }
        limits
            .max_transforms
            .min(limits.max_vertices() / mesh.vertex_count())
            .min(limits.max_indices() / mesh.index_count())
    }

    /// Build a batch holding `capacity` copies of `mesh`
    ///
    /// Copy `n` has every vertex tagged with shape index `n` and its indices
    /// offset by `n * vertex_count`. All slots start free with a zero transform.
    pub fn new(key: BatchKey, mesh: &MeshProxy, capacity: usize) -> Self {
        let vertex_count = mesh.vertex_count();
        let mut vertices = Vec::with_capacity(vertex_count * capacity);
        let mut indices = Vec::with_capacity(mesh.index_count() * capacity);

        for slot in 0..capacity {
            let shape_index = slot as f32;
            vertices.extend(mesh.vertices().iter().map(|v| v.with_shape_index(shape_index)));
            let base = (slot * vertex_count) as u32;
            indices.extend(mesh.indices().iter().map(|&i| i + base));
        }

        Self {
            key,
            mesh_vertex_count: vertex_count,
            mesh_index_count: mesh.index_count(),
            vertices,
            indices,
            transforms: vec![ZERO_TRANSFORM; capacity],
            colors: vec![[0.0; 4]; capacity],
            slots: SlotPool::new(capacity),
            transforms_dirty: DirtyRanges::new(),
            colors_dirty: DirtyRanges::new(),
        }
    }

    /// Key shared by every instance
    pub const fn key(&self) -> BatchKey {
        self.key
    }

    /// Shader family
    pub const fn batch_type(&self) -> BatchType {
        self.key.batch_type()
    }

    /// Reserve a slot and write its initial data
    pub fn allocate(&mut self, owner: Entity, transform: &Mat4, color: &Vec4) -> Option<SlotHandle> {
        let handle = self.slots.allocate(owner)?;
        let slot = handle.slot();
        self.transforms[slot] = mat4_to_cols(transform);
        self.colors[slot] = [color.x, color.y, color.z, color.w];
        self.transforms_dirty.mark(slot);
        self.colors_dirty.mark(slot);
        Some(handle)
    }

    /// Free a slot; its transform is zeroed so the slot draws nothing
    pub fn release(&mut self, handle: SlotHandle) -> BatchResult<Entity> {
        let owner = self.slots.release(handle)?;
        let slot = handle.slot();
        self.transforms[slot] = ZERO_TRANSFORM;
        self.colors[slot] = [0.0; 4];
        self.transforms_dirty.mark(slot);
        self.colors_dirty.mark(slot);
        Ok(owner)
    }

    /// Overwrite one slot's transform
    pub fn write_transform(&mut self, handle: SlotHandle, transform: &Mat4) -> BatchResult<()> {
        self.check(handle)?;
        self.transforms[handle.slot()] = mat4_to_cols(transform);
        self.transforms_dirty.mark(handle.slot());
        Ok(())
    }

    /// Overwrite one slot's color
    pub fn write_color(&mut self, handle: SlotHandle, color: &Vec4) -> BatchResult<()> {
        self.check(handle)?;
        self.colors[handle.slot()] = [color.x, color.y, color.z, color.w];
        self.colors_dirty.mark(handle.slot());
        Ok(())
    }

    fn check(&self, handle: SlotHandle) -> BatchResult<()> {
        if self.slots.is_live(handle) {
            Ok(())
        } else {
            Err(BatchError::StaleHandle(handle))
        }
    }

    /// Owner of a reserved slot
    pub fn owner(&self, handle: SlotHandle) -> Option<Entity> {
        self.slots.owner(handle)
    }

    /// Reserved slots and owners
    pub fn occupants(&self) -> impl Iterator<Item = (usize, Entity)> + '_ {
        self.slots.occupants()
    }

    /// Vertex mirror, `capacity` mesh copies
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Index mirror, `capacity` mesh copies
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Transform mirror, one column-major matrix per slot
    pub fn transforms(&self) -> &[[f32; 16]] {
        &self.transforms
    }

    /// Color mirror, one RGBA per slot
    pub fn colors(&self) -> &[[f32; 4]] {
        &self.colors
    }

    /// Slot count
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Reserved slot count
    pub fn occupied(&self) -> usize {
        self.slots.occupied()
    }

    /// No free slot
    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// No reserved slot
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index count of one mesh copy
    pub const fn mesh_index_count(&self) -> usize {
        self.mesh_index_count
    }

    /// Indices to draw: every copy up to the highest reserved slot, 0 if empty
    pub fn draw_index_count(&self) -> usize {
        self.slots
            .highest_occupied()
            .map_or(0, |slot| (slot + 1) * self.mesh_index_count)
    }

    /// Vertices referenced by the draw range
    pub fn draw_vertex_count(&self) -> usize {
        self.slots
            .highest_occupied()
            .map_or(0, |slot| (slot + 1) * self.mesh_vertex_count)
    }

    /// Mirrors with pending uploads
    pub fn dirty(&self) -> DirtyFlags {
        let mut flags = DirtyFlags::empty();
        flags.set(DirtyFlags::TRANSFORMS, !self.transforms_dirty.is_empty());
        flags.set(DirtyFlags::MATERIALS, !self.colors_dirty.is_empty());
        flags
    }

    /// Number of pending dirty ranges
    pub fn pending_ranges(&self) -> usize {
        self.transforms_dirty.len() + self.colors_dirty.len()
    }

    /// Pending transform slot ranges
    pub fn transform_ranges(&self) -> &[Range<usize>] {
        self.transforms_dirty.ranges()
    }

    /// Pending color slot ranges
    pub fn color_ranges(&self) -> &[Range<usize>] {
        self.colors_dirty.ranges()
    }

    /// Drain dirty transform slot ranges
    pub fn take_transform_ranges(&mut self) -> Vec<Range<usize>> {
        self.transforms_dirty.take()
    }

    /// Drain dirty color slot ranges
    pub fn take_color_ranges(&mut self) -> Vec<Range<usize>> {
        self.colors_dirty.take()
    }

    /// Forget pending ranges after a full upload
    pub fn mark_clean(&mut self) {
        self.transforms_dirty.clear();
        self.colors_dirty.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;
    use crate::foundation::math::Vec3;
    use crate::render::batch::{MaterialKey, MeshKey};

    const KEY: BatchKey = BatchKey {
        mesh: MeshKey::Pyramid,
        material: MaterialKey::Color,
    };

    fn translation(x: f32) -> Mat4 {
        Mat4::new_translation(&Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_geometry_copies_are_tagged_and_offset() {
        let mesh = MeshProxy::pyramid();
        let batch = MeshBatch::new(KEY, &mesh, 3);

        assert_eq!(batch.vertices().len(), 15);
        assert_eq!(batch.indices().len(), 54);
        assert_eq!(batch.vertices()[5].shape_index, 1.0);
        assert_eq!(batch.vertices()[14].shape_index, 2.0);
        assert_eq!(batch.indices()[18], mesh.indices()[0] + 5);
        assert!(batch.indices().iter().all(|&i| (i as usize) < 15));
    }

    #[test]
    fn test_capacity_respects_every_limit() {
        let cube = MeshProxy::cube();
        let limits = GraphicLimits::default();
        assert_eq!(MeshBatch::capacity_for(&cube, &limits), 32);

        let tight = GraphicLimits { max_triangles: 30, ..GraphicLimits::default() };
        // 90 indices / 36 per cube
        assert_eq!(MeshBatch::capacity_for(&cube, &tight), 2);

        let empty = MeshProxy::new(Vec::new(), Vec::new(), crate::render::MeshType::External, "empty");
        assert_eq!(MeshBatch::capacity_for(&empty, &limits), 0);
    }

    #[test]
    fn test_transform_write_touches_one_slot() {
        let mut world = World::new();
        let mut batch = MeshBatch::new(KEY, &MeshProxy::pyramid(), 4);
        let color = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let handles: Vec<_> = (0..3)
            .map(|i| batch.allocate(world.create_entity(), &translation(i as f32), &color).unwrap())
            .collect();
        batch.mark_clean();
        let before = batch.transforms().to_vec();

        batch.write_transform(handles[1], &translation(10.0)).unwrap();

        let after = batch.transforms();
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_eq!(after[1][12], 10.0);
        assert_eq!(batch.take_transform_ranges(), vec![1..2]);
        assert!(batch.take_color_ranges().is_empty());
    }

    #[test]
    fn test_draw_range_covers_highest_slot() {
        let mut world = World::new();
        let mut batch = MeshBatch::new(KEY, &MeshProxy::pyramid(), 4);
        let color = Vec4::new(1.0, 1.0, 1.0, 1.0);
        assert_eq!(batch.draw_index_count(), 0);

        let a = batch.allocate(world.create_entity(), &Mat4::identity(), &color).unwrap();
        let b = batch.allocate(world.create_entity(), &Mat4::identity(), &color).unwrap();
        assert_eq!(batch.draw_index_count(), 36);

        batch.release(a).unwrap();
        // Slot 0 is inside the range but collapsed
        assert_eq!(batch.draw_index_count(), 36);
        assert_eq!(batch.transforms()[0], ZERO_TRANSFORM);

        batch.release(b).unwrap();
        assert_eq!(batch.draw_index_count(), 0);
        assert_eq!(batch.draw_vertex_count(), 0);
    }

    #[test]
    fn test_stale_write_rejected() {
        let mut world = World::new();
        let mut batch = MeshBatch::new(KEY, &MeshProxy::pyramid(), 1);
        let color = Vec4::new(1.0, 1.0, 1.0, 1.0);
        let handle = batch.allocate(world.create_entity(), &Mat4::identity(), &color).unwrap();
        batch.release(handle).unwrap();
        assert!(matches!(
            batch.write_color(handle, &color),
            Err(BatchError::StaleHandle(_))
        ));
    }
}
