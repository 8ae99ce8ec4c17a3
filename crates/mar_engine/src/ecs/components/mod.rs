//! ECS Components module
//!
//! Components that drive rendering: where an entity is, what it draws, and
//! which lights it carries.

pub mod tag;
pub mod transform;
pub mod renderable;
pub mod point_light;

pub use tag::TagComponent;
pub use transform::TransformComponent;
pub use renderable::{RenderableComponent, MeshInfo, MaterialInfo};
pub use point_light::{PointLight, PointLightComponent};
