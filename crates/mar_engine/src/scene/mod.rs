//! Scene context
//!
//! A [`Scene`] owns the world, the mesh and material storages, the batch
//! manager and the event queue. Every edit goes through it so that a matching
//! [`ComponentEvent`] is queued; [`Scene::render`] dispatches those events
//! before the renderer uploads and draws.

mod batch_sync;

use crate::assets::{ImageError, LoadError};
use crate::config::RendererConfig;
use crate::ecs::components::{
    PointLight, PointLightComponent, RenderableComponent, TagComponent, TransformComponent,
};
use crate::ecs::{Entity, World};
use crate::events::{ComponentEvent, ComponentKind, EventQueue, UpdateKind};
use crate::foundation::math::Vec4;
use crate::render::api::GraphicsBackend;
use crate::render::batch::{BatchError, BatchManager};
use crate::render::material::MaterialStorage;
use crate::render::mesh_storage::MeshStorage;
use crate::render::{RenderError, Renderer};
use batch_sync::BatchSync;
use thiserror::Error;

/// Failures surfaced by scene edits
#[derive(Error, Debug)]
pub enum SceneError {
    /// Mesh could not be loaded
    #[error(transparent)]
    Mesh(#[from] LoadError),

    /// Texture could not be loaded
    #[error(transparent)]
    Texture(#[from] ImageError),

    /// Batch slot could not be reserved
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Backend failure while drawing
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Entity is not alive
    #[error("{0} does not exist")]
    UnknownEntity(Entity),
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Scene state and its render-side mirrors
#[derive(Debug)]
pub struct Scene {
    world: World,
    meshes: MeshStorage,
    materials: MaterialStorage,
    batches: BatchManager,
    events: EventQueue,
    pending_destroy: Vec<Entity>,
}

impl Scene {
    /// Empty scene sized by the renderer limits
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            world: World::new(),
            meshes: MeshStorage::new(),
            materials: MaterialStorage::new(),
            batches: BatchManager::new(config),
            events: EventQueue::new(),
            pending_destroy: Vec::new(),
        }
    }

    fn ensure_alive(&self, entity: Entity) -> SceneResult<()> {
        if self.world.contains(entity) {
            Ok(())
        } else {
            Err(SceneError::UnknownEntity(entity))
        }
    }

    /// Create an entity with a tag and an identity transform
    pub fn spawn(&mut self, tag: impl Into<String>) -> Entity {
        let entity = self.world.create_entity();
        self.world.add_component(entity, TagComponent::new(tag));
        self.world.add_component(entity, TransformComponent::identity());
        self.events.send(ComponentEvent::added(entity, ComponentKind::Transform));
        entity
    }

    /// Queue `update` for an existing renderable, or add a new one
    fn edit_renderable<R>(
        &mut self,
        entity: Entity,
        update: UpdateKind,
        edit: impl FnOnce(&mut Self, &mut RenderableComponent) -> R,
    ) -> SceneResult<R> {
        self.ensure_alive(entity)?;
        match self.world.remove_component::<RenderableComponent>(entity) {
            Some(mut renderable) => {
                let result = edit(self, &mut renderable);
                self.world.add_component(entity, renderable);
                self.events.send(ComponentEvent::updated(entity, update));
                Ok(result)
            }
            None => {
                let mut renderable = RenderableComponent::new();
                let result = edit(self, &mut renderable);
                self.world.add_component(entity, renderable);
                self.events.send(ComponentEvent::added(entity, ComponentKind::Renderable));
                Ok(result)
            }
        }
    }

    /// Select a built-in mesh by name or load an OBJ file
    ///
    /// The entity gets a renderable if it has none. When loading fails the
    /// entity stays editable but is not drawn.
    pub fn set_mesh(&mut self, entity: Entity, path: &str) -> SceneResult<()> {
        let loaded = self.edit_renderable(entity, UpdateKind::RenderableMesh, |scene, renderable| {
            scene.meshes.assign(renderable, path)
        })?;
        Ok(loaded?)
    }

    /// Draw the entity with a 2D texture; a failed load keeps the flat color
    pub fn set_texture(&mut self, entity: Entity, path: &str) -> SceneResult<()> {
        let loaded = self.edit_renderable(entity, UpdateKind::RenderableMaterial, |scene, renderable| {
            scene.materials.assign(renderable, path).map(|_| ())
        })?;
        Ok(loaded?)
    }

    /// Go back to flat color rendering
    pub fn clear_texture(&mut self, entity: Entity) -> SceneResult<()> {
        self.edit_renderable(entity, UpdateKind::RenderableMaterial, |_, renderable| {
            renderable.material = Default::default();
        })
    }

    /// Change the flat color
    pub fn set_color(&mut self, entity: Entity, color: Vec4) -> SceneResult<()> {
        self.edit_renderable(entity, UpdateKind::RenderableColor, |_, renderable| {
            renderable.color = color;
        })
    }

    /// Replace the transform
    pub fn set_transform(&mut self, entity: Entity, transform: TransformComponent) -> SceneResult<()> {
        self.ensure_alive(entity)?;
        let existed = self.world.has_component::<TransformComponent>(entity);
        self.world.add_component(entity, transform);
        self.events.send(if existed {
            ComponentEvent::updated(entity, UpdateKind::Transform)
        } else {
            ComponentEvent::added(entity, ComponentKind::Transform)
        });
        Ok(())
    }

    /// Attach or replace a point light
    pub fn add_point_light(&mut self, entity: Entity, light: PointLight) -> SceneResult<()> {
        self.ensure_alive(entity)?;
        match self.world.get_component_mut::<PointLightComponent>(entity) {
            Some(existing) => {
                existing.light = light;
                self.events.send(ComponentEvent::updated(entity, UpdateKind::PointLight));
            }
            None => {
                self.world.add_component(entity, PointLightComponent::new(light));
                self.events.send(ComponentEvent::added(entity, ComponentKind::PointLight));
            }
        }
        Ok(())
    }

    /// Remove the renderable at the next dispatch
    pub fn remove_renderable(&mut self, entity: Entity) -> SceneResult<()> {
        self.ensure_alive(entity)?;
        self.events.send(ComponentEvent::removed(entity, ComponentKind::Renderable));
        Ok(())
    }

    /// Remove the point light at the next dispatch
    pub fn remove_point_light(&mut self, entity: Entity) -> SceneResult<()> {
        self.ensure_alive(entity)?;
        self.events.send(ComponentEvent::removed(entity, ComponentKind::PointLight));
        Ok(())
    }

    /// Destroy an entity at the next dispatch, releasing its slots first
    pub fn despawn(&mut self, entity: Entity) -> SceneResult<()> {
        self.ensure_alive(entity)?;
        if self.world.has_component::<RenderableComponent>(entity) {
            self.events.send(ComponentEvent::removed(entity, ComponentKind::Renderable));
        }
        if self.world.has_component::<PointLightComponent>(entity) {
            self.events.send(ComponentEvent::removed(entity, ComponentKind::PointLight));
        }
        self.pending_destroy.push(entity);
        Ok(())
    }

    /// Apply every queued event to the batch manager in submission order
    ///
    /// All events are applied even if some fail; the first failure is returned.
    /// Returns the number of events applied.
    pub fn dispatch_events(&mut self) -> SceneResult<usize> {
        let queued = self.events.len();
        let mut sync = BatchSync {
            world: &mut self.world,
            meshes: &self.meshes,
            materials: &self.materials,
            batches: &mut self.batches,
        };
        let failures = self.events.dispatch(&mut sync);

        for entity in self.pending_destroy.drain(..) {
            self.world.destroy_entity(entity);
        }

        let mut first = None;
        for (event, error) in failures {
            log::error!("{:?} failed: {}", event, error);
            first.get_or_insert(error);
        }
        match first {
            Some(error) => Err(error.into()),
            None => Ok(queued),
        }
    }

    /// Rebuild every batch from the current components
    ///
    /// Used after components were populated directly, e.g. by a scene loader.
    pub fn push_scene(&mut self) -> SceneResult<usize> {
        self.events.clear();
        for entity in self.pending_destroy.drain(..) {
            self.world.destroy_entity(entity);
        }
        Ok(self.batches.push_scene(&mut self.world, &self.meshes, &self.materials)?)
    }

    /// Dispatch pending events, then upload and draw
    ///
    /// The frame is drawn even when an event failed; that failure is returned
    /// afterwards.
    pub fn render<B: GraphicsBackend>(&mut self, renderer: &mut Renderer<B>) -> SceneResult<()> {
        let dispatched = self.dispatch_events();
        renderer.render_frame(&mut self.batches, &self.materials)?;
        dispatched.map(|_| ())
    }

    /// ECS storage
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable ECS storage; edits made here need [`Self::push_scene`]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Mesh storage
    pub const fn meshes(&self) -> &MeshStorage {
        &self.meshes
    }

    /// Material storage
    pub const fn materials(&self) -> &MaterialStorage {
        &self.materials
    }

    /// Batch manager
    pub const fn batches(&self) -> &BatchManager {
        &self.batches
    }

    /// Transform of an entity
    pub fn transform(&self, entity: Entity) -> Option<&TransformComponent> {
        self.world.get_component(entity)
    }

    /// Renderable of an entity
    pub fn renderable(&self, entity: Entity) -> Option<&RenderableComponent> {
        self.world.get_component(entity)
    }

    /// Events waiting for dispatch
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}
