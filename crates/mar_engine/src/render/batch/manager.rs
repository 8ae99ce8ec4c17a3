//! Batch manager
//!
//! Maps (mesh, material) keys to batches and renderables to slots. Batches are
//! only ever appended; an emptied batch is kept so `BatchRef::batch` indices
//! held by other renderables stay valid until [`BatchManager::reset`].

use super::{
    BatchError, BatchKey, BatchRef, BatchResult, LightSlot, MaterialKey, MeshBatch, MeshKey,
    PointLightBatch,
};
use crate::config::{GraphicLimits, RendererConfig};
use crate::ecs::components::{PointLightComponent, RenderableComponent, TransformComponent};
use crate::ecs::{Entity, World};
use crate::render::material::{MaterialStorage, MaterialType};
use crate::render::mesh_storage::MeshStorage;
use std::collections::HashMap;

/// Snapshot of batch occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Mesh batches, including empty ones
    pub batches: usize,
    /// Reserved mesh slots across all batches
    pub occupied_slots: usize,
    /// Reserved light slots
    pub lights: usize,
    /// Dirty ranges waiting for upload
    pub pending_ranges: usize,
}

/// Owner of every mesh batch and the point light batch
#[derive(Debug)]
pub struct BatchManager {
    limits: GraphicLimits,
    max_batches: usize,
    batches: Vec<MeshBatch>,
    by_key: HashMap<BatchKey, Vec<usize>>,
    lights: PointLightBatch,
    epoch: u64,
}

impl BatchManager {
    /// Create an empty manager for the given limits
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            limits: config.limits,
            max_batches: config.max_batches,
            batches: Vec::new(),
            by_key: HashMap::new(),
            lights: PointLightBatch::new(config.limits.max_lights),
            epoch: 0,
        }
    }

    /// Reserve a slot for a renderable
    ///
    /// A renderable that is already attached is detached first. Returns
    /// `Ok(None)` when no drawable mesh is selected; the renderable then stays
    /// detached. A texture that cannot be resolved degrades to the flat color
    /// batch.
    pub fn attach(
        &mut self,
        entity: Entity,
        transform: &TransformComponent,
        renderable: &mut RenderableComponent,
        meshes: &MeshStorage,
        materials: &MaterialStorage,
    ) -> BatchResult<Option<BatchRef>> {
        if renderable.is_attached() {
            self.detach(renderable)?;
        }

        let mesh = match meshes.retrieve(renderable) {
            Some(mesh) if !mesh.is_empty() => mesh,
            _ => {
                log::debug!("{} has no drawable mesh, left detached", entity);
                return Ok(None);
            }
        };
        let Some(mesh_key) = MeshKey::from_selection(renderable.mesh.mesh_type, renderable.mesh.index) else {
            return Ok(None);
        };
        let key = BatchKey {
            mesh: mesh_key,
            material: Self::material_key(entity, renderable, materials),
        };

        let batch = match self.batch_with_room(key) {
            Some(batch) => batch,
            None => {
                if self.batches.len() >= self.max_batches {
                    return Err(BatchError::Exhausted(format!(
                        "batch limit of {} reached while attaching {}",
                        self.max_batches, entity
                    )));
                }
                let capacity = MeshBatch::capacity_for(mesh, &self.limits);
                if capacity == 0 {
                    return Err(BatchError::Exhausted(format!(
                        "mesh {} ({} triangles) exceeds the per-batch limit of {} triangles",
                        mesh.name(),
                        mesh.triangle_count(),
                        self.limits.max_triangles
                    )));
                }
                self.batches.push(MeshBatch::new(key, mesh, capacity));
                let index = self.batches.len() - 1;
                self.by_key.entry(key).or_default().push(index);
                log::debug!("Created batch {} for {:?} with {} slots", index, key, capacity);
                index
            }
        };

        let slot = self.batches[batch]
            .allocate(entity, &transform.to_matrix(), &renderable.color)
            .ok_or_else(|| BatchError::Exhausted(format!("batch {} has no free slot", batch)))?;
        let batch_ref = BatchRef {
            batch_type: key.batch_type(),
            batch,
            slot,
        };
        renderable.set_batch(Some(batch_ref));
        log::debug!("Attached {} to batch {} slot {}", entity, batch, slot.index);
        Ok(Some(batch_ref))
    }

    fn material_key(entity: Entity, renderable: &RenderableComponent, materials: &MaterialStorage) -> MaterialKey {
        if renderable.material.material_type != MaterialType::Texture2D {
            return MaterialKey::Color;
        }
        match materials.resolve(renderable) {
            Some(texture) => MaterialKey::Texture2D(texture),
            None => {
                log::warn!(
                    "{} references missing texture {:?}, drawing flat color",
                    entity,
                    renderable.material.path
                );
                MaterialKey::Color
            }
        }
    }

    fn batch_with_room(&self, key: BatchKey) -> Option<usize> {
        self.by_key
            .get(&key)?
            .iter()
            .copied()
            .find(|&i| !self.batches[i].is_full())
    }

    /// Release a renderable's slot; a detached renderable is left as is
    pub fn detach(&mut self, renderable: &mut RenderableComponent) -> BatchResult<()> {
        let Some(batch_ref) = renderable.batch() else {
            return Ok(());
        };
        renderable.set_batch(None);
        let batch = self
            .batches
            .get_mut(batch_ref.batch)
            .ok_or(BatchError::StaleHandle(batch_ref.slot))?;
        let owner = batch.release(batch_ref.slot)?;
        log::debug!("Detached {} from batch {} slot {}", owner, batch_ref.batch, batch_ref.slot.index);
        Ok(())
    }

    fn batch_of(&mut self, renderable: &RenderableComponent) -> Option<(&mut MeshBatch, BatchRef)> {
        let batch_ref = renderable.batch()?;
        self.batches.get_mut(batch_ref.batch).map(|b| (b, batch_ref))
    }

    /// Rewrite the slot's transform; no-op for detached renderables
    pub fn on_transform_updated(&mut self, transform: &TransformComponent, renderable: &RenderableComponent) -> BatchResult<()> {
        match self.batch_of(renderable) {
            Some((batch, batch_ref)) => batch.write_transform(batch_ref.slot, &transform.to_matrix()),
            None => Ok(()),
        }
    }

    /// Rewrite the slot's color; no-op for detached renderables
    pub fn on_color_updated(&mut self, renderable: &RenderableComponent) -> BatchResult<()> {
        match self.batch_of(renderable) {
            Some((batch, batch_ref)) => batch.write_color(batch_ref.slot, &renderable.color),
            None => Ok(()),
        }
    }

    /// Move a renderable to the batch matching its new mesh
    pub fn on_mesh_changed(
        &mut self,
        entity: Entity,
        transform: &TransformComponent,
        renderable: &mut RenderableComponent,
        meshes: &MeshStorage,
        materials: &MaterialStorage,
    ) -> BatchResult<Option<BatchRef>> {
        self.attach(entity, transform, renderable, meshes, materials)
    }

    /// Move a renderable to the batch matching its new material
    pub fn on_material_changed(
        &mut self,
        entity: Entity,
        transform: &TransformComponent,
        renderable: &mut RenderableComponent,
        meshes: &MeshStorage,
        materials: &MaterialStorage,
    ) -> BatchResult<Option<BatchRef>> {
        self.attach(entity, transform, renderable, meshes, materials)
    }

    /// Reserve a light slot, positioned at the entity's transform
    pub fn attach_light(
        &mut self,
        entity: Entity,
        transform: &TransformComponent,
        light: &mut PointLightComponent,
    ) -> BatchResult<LightSlot> {
        self.detach_light(light)?;
        let slot = self.lights.attach(entity, &light.light, &transform.position)?;
        light.set_slot(Some(slot));
        log::debug!("Attached light {} to slot {}", entity, slot.index());
        Ok(slot)
    }

    /// Rewrite a light's parameters and position
    pub fn on_light_updated(&mut self, transform: &TransformComponent, light: &PointLightComponent) -> BatchResult<()> {
        match light.slot() {
            Some(slot) => self.lights.update(slot, &light.light, &transform.position),
            None => Ok(()),
        }
    }

    /// Release a light slot
    pub fn detach_light(&mut self, light: &mut PointLightComponent) -> BatchResult<()> {
        if let Some(slot) = light.slot() {
            light.set_slot(None);
            self.lights.detach(slot)?;
        }
        Ok(())
    }

    /// Drop every batch and detach every component in `world`
    pub fn reset(&mut self, world: &mut World) {
        for entity in world.entities_with::<RenderableComponent>() {
            if let Some(renderable) = world.get_component_mut::<RenderableComponent>(entity) {
                renderable.set_batch(None);
            }
        }
        for entity in world.entities_with::<PointLightComponent>() {
            if let Some(light) = world.get_component_mut::<PointLightComponent>(entity) {
                light.set_slot(None);
            }
        }
        self.batches.clear();
        self.by_key.clear();
        self.lights = PointLightBatch::new(self.limits.max_lights);
        self.epoch += 1;
        log::debug!("Batch manager reset (epoch {})", self.epoch);
    }

    /// Rebuild all batches from the components in `world`
    ///
    /// Used after a scene is loaded; entities are attached in id order.
    /// Returns the number of renderables that ended up attached.
    pub fn push_scene(&mut self, world: &mut World, meshes: &MeshStorage, materials: &MaterialStorage) -> BatchResult<usize> {
        self.reset(world);

        let mut renderables = world.entities_with::<RenderableComponent>();
        renderables.sort_unstable();
        let mut attached = 0;
        for entity in renderables {
            let transform = world
                .get_component::<TransformComponent>(entity)
                .copied()
                .unwrap_or_default();
            if let Some(renderable) = world.get_component_mut::<RenderableComponent>(entity) {
                if self.attach(entity, &transform, renderable, meshes, materials)?.is_some() {
                    attached += 1;
                }
            }
        }

        let mut lights = world.entities_with::<PointLightComponent>();
        lights.sort_unstable();
        for entity in lights {
            let transform = world
                .get_component::<TransformComponent>(entity)
                .copied()
                .unwrap_or_default();
            if let Some(light) = world.get_component_mut::<PointLightComponent>(entity) {
                self.attach_light(entity, &transform, light)?;
            }
        }

        log::info!(
            "Scene pushed: {} renderables in {} batches, {} lights",
            attached,
            self.batches.len(),
            self.lights.occupied()
        );
        Ok(attached)
    }

    /// Mesh batches in creation order
    pub fn batches(&self) -> &[MeshBatch] {
        &self.batches
    }

    /// Mutable access for draining dirty ranges
    pub fn batches_mut(&mut self) -> &mut [MeshBatch] {
        &mut self.batches
    }

    /// Batch by index
    pub fn batch(&self, index: usize) -> Option<&MeshBatch> {
        self.batches.get(index)
    }

    /// Point light batch
    pub const fn light_batch(&self) -> &PointLightBatch {
        &self.lights
    }

    /// Mutable point light batch for draining dirty ranges
    pub fn light_batch_mut(&mut self) -> &mut PointLightBatch {
        &mut self.lights
    }

    /// Bumped by every [`Self::reset`]; batch indices from older epochs are void
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Limits batches are sized with
    pub const fn limits(&self) -> &GraphicLimits {
        &self.limits
    }

    /// Occupancy snapshot
    pub fn stats(&self) -> BatchStats {
        BatchStats {
            batches: self.batches.len(),
            occupied_slots: self.batches.iter().map(MeshBatch::occupied).sum(),
            lights: self.lights.occupied(),
            pending_ranges: self.batches.iter().map(MeshBatch::pending_ranges).sum::<usize>()
                + self.lights.pending_ranges(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ImageData;
    use crate::ecs::components::PointLight;
    use crate::foundation::math::{Vec3, Vec4};
    use crate::render::batch::BatchType;
    use crate::render::mesh::MeshType;

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
            self.world.add_component(entity, TransformComponent::identity());
            self.world
                .add_component(entity, RenderableComponent::new().with_builtin_mesh(mesh_type));
            entity
        }

        fn attach(&mut self, entity: Entity) -> BatchResult<Option<BatchRef>> {
            let transform = *self.world.get_component::<TransformComponent>(entity).unwrap();
            let renderable = self.world.get_component_mut::<RenderableComponent>(entity).unwrap();
            self.manager
                .attach(entity, &transform, renderable, &self.meshes, &self.materials)
        }

        fn renderable(&mut self, entity: Entity) -> &mut RenderableComponent {
            self.world.get_component_mut::<RenderableComponent>(entity).unwrap()
        }
    }

    #[test]
    fn test_same_key_fills_one_batch_then_opens_another() {
        let mut fx = Fixture::new();
        let capacity = fx.manager.limits().max_transforms;

        for _ in 0..capacity {
            let entity = fx.spawn(MeshType::Cube);
            assert_eq!(fx.attach(entity).unwrap().unwrap().batch, 0);
        }
        assert_eq!(fx.manager.batches().len(), 1);
        assert!(fx.manager.batches()[0].is_full());

        let overflow = fx.spawn(MeshType::Cube);
        let batch_ref = fx.attach(overflow).unwrap().unwrap();
        assert_eq!(batch_ref.batch, 1);
        assert_eq!(batch_ref.transform_slot(), 0);
        assert_eq!(fx.manager.batches()[1].key(), fx.manager.batches()[0].key());
    }

    #[test]
    fn test_freed_slot_reused_by_next_entity() {
        let mut fx = Fixture::new();
        let entities: Vec<_> = (0..4).map(|_| fx.spawn(MeshType::Pyramid)).collect();
        for &entity in &entities {
            fx.attach(entity).unwrap();
        }
        let freed = fx.renderable(entities[2]).batch().unwrap();
        let renderable = fx.world.get_component_mut::<RenderableComponent>(entities[2]).unwrap();
        fx.manager.detach(renderable).unwrap();
        assert!(!fx.renderable(entities[2]).is_attached());

        let newcomer = fx.spawn(MeshType::Pyramid);
        let reused = fx.attach(newcomer).unwrap().unwrap();
        assert_eq!(reused.batch, freed.batch);
        assert_eq!(reused.transform_slot(), freed.transform_slot());
        assert_eq!(fx.manager.stats().occupied_slots, 4);
    }

    #[test]
    fn test_transform_update_only_touches_own_slot() {
        let mut fx = Fixture::new();
        let entities: Vec<_> = (0..3).map(|_| fx.spawn(MeshType::Cube)).collect();
        for &entity in &entities {
            fx.attach(entity).unwrap();
        }
        let snapshot = fx.manager.batches()[0].transforms().to_vec();

        let moved = TransformComponent::from_position(Vec3::new(4.0, 5.0, 6.0));
        fx.world.add_component(entities[1], moved);
        let renderable = fx.world.get_component::<RenderableComponent>(entities[1]).unwrap();
        fx.manager.on_transform_updated(&moved, renderable).unwrap();

        let transforms = fx.manager.batches()[0].transforms();
        let changed: Vec<usize> = (0..3).filter(|&i| transforms[i] != snapshot[i]).collect();
        assert_eq!(changed, vec![1]);
        assert_eq!(&transforms[1][12..15], &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_different_meshes_use_different_batches() {
        let mut fx = Fixture::new();
        let cube = fx.spawn(MeshType::Cube);
        let surface = fx.spawn(MeshType::Surface);
        let a = fx.attach(cube).unwrap().unwrap();
        let b = fx.attach(surface).unwrap().unwrap();
        assert_ne!(a.batch, b.batch);
        assert_eq!(a.batch_type, BatchType::MeshStaticColor);
    }

    #[test]
    fn test_mesh_change_moves_between_batches() {
        let mut fx = Fixture::new();
        let entity = fx.spawn(MeshType::Cube);
        let before = fx.attach(entity).unwrap().unwrap();

        let transform = TransformComponent::identity();
        let renderable = fx.world.get_component_mut::<RenderableComponent>(entity).unwrap();
        fx.meshes.assign(renderable, "Pyramid").unwrap();
        let after = fx
            .manager
            .on_mesh_changed(entity, &transform, renderable, &fx.meshes, &fx.materials)
            .unwrap()
            .unwrap();

        assert_ne!(before.batch, after.batch);
        assert!(fx.manager.batches()[before.batch].is_empty());
        assert_eq!(fx.manager.batches()[before.batch].draw_index_count(), 0);
        assert_eq!(fx.manager.batches().len(), 2);
    }

    #[test]
    fn test_undrawable_mesh_stays_detached() {
        let mut fx = Fixture::new();
        let entity = fx.world.create_entity();
        fx.world.add_component(entity, TransformComponent::identity());
        let mut renderable = RenderableComponent::new();
        assert!(fx.meshes.assign(&mut renderable, "/missing/model.obj").is_err());
        fx.world.add_component(entity, renderable);

        assert_eq!(fx.attach(entity).unwrap(), None);
        assert!(!fx.renderable(entity).is_attached());
        assert_eq!(fx.manager.stats().batches, 0);
    }

    #[test]
    fn test_texture_keys_split_batches_and_missing_texture_degrades() {
        let mut fx = Fixture::new();
        let index = fx.materials.insert_texture("checker.png", ImageData::solid_color(2, 2, [255; 4]));

        let textured = fx.spawn(MeshType::Cube);
        let renderable = fx.world.get_component_mut::<RenderableComponent>(textured).unwrap();
        fx.materials.assign(renderable, "checker.png").unwrap();
        let textured_ref = fx.attach(textured).unwrap().unwrap();
        assert_eq!(textured_ref.batch_type, BatchType::MeshStaticTexture2D);
        assert_eq!(
            fx.manager.batches()[textured_ref.batch].key().material,
            MaterialKey::Texture2D(index)
        );

        let broken = fx.spawn(MeshType::Cube);
        let renderable = fx.renderable(broken);
        renderable.material.material_type = MaterialType::Texture2D;
        renderable.material.index = Some(42);
        let broken_ref = fx.attach(broken).unwrap().unwrap();
        assert_eq!(broken_ref.batch_type, BatchType::MeshStaticColor);
    }

    #[test]
    fn test_batch_limit_is_exhaustion() {
        let config = RendererConfig::default().with_max_batches(1);
        let mut fx = Fixture::new();
        fx.manager = BatchManager::new(&config);
        let cube = fx.spawn(MeshType::Cube);
        let pyramid = fx.spawn(MeshType::Pyramid);
        fx.attach(cube).unwrap();
        assert!(matches!(fx.attach(pyramid), Err(BatchError::Exhausted(_))));
        assert!(!fx.renderable(pyramid).is_attached());
    }

    #[test]
    fn test_oversized_mesh_is_exhaustion() {
        let limits = GraphicLimits { max_triangles: 4, ..GraphicLimits::default() };
        let mut fx = Fixture::new();
        fx.manager = BatchManager::new(&RendererConfig::default().with_limits(limits));
        let cube = fx.spawn(MeshType::Cube);
        assert!(matches!(fx.attach(cube), Err(BatchError::Exhausted(_))));
    }

    #[test]
    fn test_color_update_marks_material_only() {
        let mut fx = Fixture::new();
        let entity = fx.spawn(MeshType::Surface);
        let batch_ref = fx.attach(entity).unwrap().unwrap();
        fx.manager.batches_mut()[batch_ref.batch].mark_clean();

        fx.renderable(entity).color = Vec4::new(0.0, 1.0, 0.0, 1.0);
        let renderable = fx.world.get_component::<RenderableComponent>(entity).unwrap();
        fx.manager.on_color_updated(renderable).unwrap();

        let batch = &mut fx.manager.batches_mut()[batch_ref.batch];
        assert_eq!(batch.colors()[0], [0.0, 1.0, 0.0, 1.0]);
        assert!(batch.take_transform_ranges().is_empty());
        assert_eq!(batch.take_color_ranges(), vec![0..1]);
    }

    #[test]
    fn test_push_scene_rebuilds_consistently() {
        let mut fx = Fixture::new();
        let entities: Vec<_> = (0..3).map(|_| fx.spawn(MeshType::Cube)).collect();
        let lamp = fx.world.create_entity();
        fx.world
            .add_component(lamp, TransformComponent::from_position(Vec3::new(0.0, 3.0, 0.0)));
        fx.world.add_component(lamp, PointLightComponent::new(PointLight::default()));

        let attached = fx
            .manager
            .push_scene(&mut fx.world, &fx.meshes, &fx.materials)
            .unwrap();
        assert_eq!(attached, 3);
        let epoch = fx.manager.epoch();

        let slots: Vec<usize> = entities
            .iter()
            .map(|&e| fx.renderable(e).batch().unwrap().transform_slot())
            .collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert_eq!(fx.manager.light_batch().lights()[0].position, [0.0, 3.0, 0.0, 1.0]);

        // A second push starts from scratch instead of stacking slots
        fx.manager
            .push_scene(&mut fx.world, &fx.meshes, &fx.materials)
            .unwrap();
        assert!(fx.manager.epoch() > epoch);
        let stats = fx.manager.stats();
        assert_eq!((stats.batches, stats.occupied_slots, stats.lights), (1, 3, 1));
    }

    #[test]
    fn test_light_detach_is_idempotent() {
        let mut fx = Fixture::new();
        let lamp = fx.world.create_entity();
        let mut light = PointLightComponent::new(PointLight::default());
        fx.manager
            .attach_light(lamp, &TransformComponent::identity(), &mut light)
            .unwrap();
        fx.manager.detach_light(&mut light).unwrap();
        fx.manager.detach_light(&mut light).unwrap();
        assert!(light.slot().is_none());
        assert_eq!(fx.manager.stats().lights, 0);
    }
}
