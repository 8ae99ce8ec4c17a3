//! ECS World implementation
//!
//! One hash map per component type, keyed by entity. The world only stores
//! data; keeping GPU batches in sync is the job of the scene that owns it.

use super::{Entity, Component};
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Type-erased view of one component store
trait ComponentStore: Any {
    fn remove_entity(&mut self, entity: Entity);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ComponentStore for HashMap<Entity, T> {
    fn remove_entity(&mut self, entity: Entity) {
        self.remove(&entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// ECS World containing all entities and components
pub struct World {
    next_entity_id: u32,
    entities: Vec<Entity>,
    component_storages: HashMap<TypeId, Box<dyn ComponentStore>>,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            next_entity_id: 0,
            entities: Vec::new(),
            component_storages: HashMap::new(),
        }
    }

    /// Create a new entity
    pub fn create_entity(&mut self) -> Entity {
        let entity = Entity::new(self.next_entity_id);
        self.next_entity_id += 1;
        self.entities.push(entity);
        entity
    }

    /// Destroy an entity and all of its components
    ///
    /// Returns false when the entity was not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        let Some(position) = self.entities.iter().position(|e| *e == entity) else {
            return false;
        };
        self.entities.remove(position);
        for storage in self.component_storages.values_mut() {
            storage.remove_entity(entity);
        }
        true
    }

    /// Whether the entity is alive
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    fn storage<T: Component>(&self) -> Option<&HashMap<Entity, T>> {
        self.component_storages
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref())
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut HashMap<Entity, T>> {
        self.component_storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut())
    }

    /// Add a component to an entity, replacing any previous one of the same type
    ///
    /// Ignored for entities that are not alive.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        if !self.contains(entity) {
            log::warn!("add_component on dead {}", entity);
            return;
        }
        let storage = self
            .component_storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(HashMap::<Entity, T>::new()));
        if let Some(map) = storage.as_any_mut().downcast_mut::<HashMap<Entity, T>>() {
            map.insert(entity, component);
        }
    }

    /// Remove a component from an entity, returning it
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.storage_mut::<T>()?.remove(&entity)
    }

    /// Get a component from an entity
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(&entity)
    }

    /// Get a mutable component from an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(&entity)
    }

    /// Whether the entity has a component of type `T`
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.get_component::<T>(entity).is_some()
    }

    /// Entities that carry a component of type `T`, in creation order
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .copied()
            .filter(|e| self.has_component::<T>(*e))
            .collect()
    }

    /// Get an iterator over all entities
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("component_types", &self.component_storages.len())
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
