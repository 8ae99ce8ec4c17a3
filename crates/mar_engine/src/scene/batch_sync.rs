//! Applies component events to the batch manager

use crate::ecs::components::{PointLightComponent, RenderableComponent, TransformComponent};
use crate::ecs::{Entity, World};
use crate::events::{ComponentEvent, ComponentEventHandler, ComponentKind, EventKind, UpdateKind};
use crate::render::batch::{BatchError, BatchManager, BatchResult};
use crate::render::material::MaterialStorage;
use crate::render::mesh_storage::MeshStorage;

/// Borrowed view of the scene used while dispatching
pub(super) struct BatchSync<'a> {
    pub world: &'a mut World,
    pub meshes: &'a MeshStorage,
    pub materials: &'a MaterialStorage,
    pub batches: &'a mut BatchManager,
}

impl BatchSync<'_> {
    fn transform(&self, entity: Entity) -> TransformComponent {
        self.world
            .get_component::<TransformComponent>(entity)
            .copied()
            .unwrap_or_default()
    }

    fn attach_renderable(&mut self, entity: Entity) -> BatchResult<()> {
        let transform = self.transform(entity);
        if let Some(renderable) = self.world.get_component_mut::<RenderableComponent>(entity) {
            self.batches
                .attach(entity, &transform, renderable, self.meshes, self.materials)?;
        }
        Ok(())
    }

    fn sync_transform(&mut self, entity: Entity) -> BatchResult<()> {
        let transform = self.transform(entity);
        if let Some(renderable) = self.world.get_component::<RenderableComponent>(entity) {
            self.batches.on_transform_updated(&transform, renderable)?;
        }
        if let Some(light) = self.world.get_component::<PointLightComponent>(entity) {
            self.batches.on_light_updated(&transform, light)?;
        }
        Ok(())
    }
}

impl ComponentEventHandler for BatchSync<'_> {
    type Error = BatchError;

    fn on_component_event(&mut self, event: &ComponentEvent) -> BatchResult<()> {
        let entity = event.entity;
        match (event.kind, event.component) {
            (EventKind::Added, ComponentKind::Renderable)
            | (EventKind::Updated(UpdateKind::RenderableMesh | UpdateKind::RenderableMaterial), _) => {
                self.attach_renderable(entity)
            }
            (EventKind::Updated(UpdateKind::RenderableColor), _) => {
                match self.world.get_component::<RenderableComponent>(entity) {
                    Some(renderable) => self.batches.on_color_updated(renderable),
                    None => Ok(()),
                }
            }
            (EventKind::Added, ComponentKind::Transform) | (EventKind::Updated(UpdateKind::Transform), _) => {
                self.sync_transform(entity)
            }
            (EventKind::Added, ComponentKind::PointLight) => {
                let transform = self.transform(entity);
                match self.world.get_component_mut::<PointLightComponent>(entity) {
                    Some(light) => self.batches.attach_light(entity, &transform, light).map(|_| ()),
                    None => Ok(()),
                }
            }
            (EventKind::Updated(UpdateKind::PointLight), _) => {
                let transform = self.transform(entity);
                match self.world.get_component::<PointLightComponent>(entity) {
                    Some(light) => self.batches.on_light_updated(&transform, light),
                    None => Ok(()),
                }
            }
            (EventKind::Removed, ComponentKind::Renderable) => {
                match self.world.remove_component::<RenderableComponent>(entity) {
                    Some(mut renderable) => self.batches.detach(&mut renderable),
                    None => Ok(()),
                }
            }
            (EventKind::Removed, ComponentKind::PointLight) => {
                match self.world.remove_component::<PointLightComponent>(entity) {
                    Some(mut light) => self.batches.detach_light(&mut light),
                    None => Ok(()),
                }
            }
            (EventKind::Removed, ComponentKind::Transform) => {
                self.world.remove_component::<TransformComponent>(entity);
                self.sync_transform(entity)
            }
        }
    }
}
