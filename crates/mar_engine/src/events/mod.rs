//! Component update protocol
//!
//! Edits to render-relevant components are queued as [`ComponentEvent`]s during
//! the frame and dispatched in submission order before any upload happens, so
//! every edit is reflected on the GPU in the same frame's draw.

use crate::ecs::Entity;
use std::collections::VecDeque;

/// Components the batch manager mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// `TransformComponent`
    Transform,
    /// `RenderableComponent`
    Renderable,
    /// `PointLightComponent`
    PointLight,
}

/// What part of a component changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// Position, rotation or scale
    Transform,
    /// Flat color only
    RenderableColor,
    /// Mesh selection; moves the renderable to another batch
    RenderableMesh,
    /// Material selection; moves the renderable to another batch
    RenderableMaterial,
    /// Light parameters
    PointLight,
}

impl UpdateKind {
    /// Component the update applies to
    pub const fn component(self) -> ComponentKind {
        match self {
            Self::Transform => ComponentKind::Transform,
            Self::RenderableColor | Self::RenderableMesh | Self::RenderableMaterial => ComponentKind::Renderable,
            Self::PointLight => ComponentKind::PointLight,
        }
    }
}

/// Lifecycle step of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Component attached to the entity
    Added,
    /// Component data changed
    Updated(UpdateKind),
    /// Component about to be removed
    Removed,
}

/// One component lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentEvent {
    /// Entity owning the component
    pub entity: Entity,
    /// Lifecycle step
    pub kind: EventKind,
    /// Component affected
    pub component: ComponentKind,
}

impl ComponentEvent {
    /// Component was added
    pub const fn added(entity: Entity, component: ComponentKind) -> Self {
        Self { entity, kind: EventKind::Added, component }
    }

    /// Component was updated
    pub const fn updated(entity: Entity, update: UpdateKind) -> Self {
        Self {
            entity,
            kind: EventKind::Updated(update),
            component: update.component(),
        }
    }

    /// Component is being removed
    pub const fn removed(entity: Entity, component: ComponentKind) -> Self {
        Self { entity, kind: EventKind::Removed, component }
    }
}

/// Receiver of dispatched component events
pub trait ComponentEventHandler {
    /// Failure reported for a single event
    type Error;

    /// Apply one event
    fn on_component_event(&mut self, event: &ComponentEvent) -> Result<(), Self::Error>;
}

/// FIFO of pending component events
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<ComponentEvent>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for this frame's dispatch
    pub fn send(&mut self, event: ComponentEvent) {
        log::trace!("Queued {:?}", event);
        self.pending.push_back(event);
    }

    /// Take every pending event in submission order
    pub fn drain(&mut self) -> impl Iterator<Item = ComponentEvent> + '_ {
        self.pending.drain(..)
    }

    /// Deliver every pending event to `handler` in submission order
    ///
    /// A failing event does not stop the ones after it; failures are returned
    /// with the event that caused them.
    pub fn dispatch<H: ComponentEventHandler>(&mut self, handler: &mut H) -> Vec<(ComponentEvent, H::Error)> {
        let mut failures = Vec::new();
        for event in self.pending.drain(..) {
            if let Err(e) = handler.on_component_event(&event) {
                failures.push((event, e));
            }
        }
        failures
    }

    /// Events waiting
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Nothing waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop all pending events
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
