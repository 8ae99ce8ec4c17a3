//! Entity-Component-System implementation
//!
//! Minimal storage for the components the renderer consumes.

pub mod world;
pub mod entity;
pub mod component;
pub mod components;

pub use world::World;
pub use entity::Entity;
pub use component::Component;
pub use components::{
    TagComponent, TransformComponent, RenderableComponent, PointLightComponent, PointLight,
};
