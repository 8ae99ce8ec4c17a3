//! # MAR Engine
//!
//! Batched OpenGL rendering of entity-component scenes.
//!
//! ## Features
//!
//! - **OBJ ingestion**: Wavefront OBJ parsing with polygon triangulation
//! - **Mesh batching**: renderables sharing a mesh and material are drawn with a
//!   single call; per-instance data lives in storage buffers
//! - **Update protocol**: component events keep the GPU mirrors in sync with the
//!   ECS within the same frame
//! - **Backends**: OpenGL 4.3 core through `glow`, plus a headless recorder
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mar_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut scene = Scene::new(&config.renderer);
//!     let mut renderer = Renderer::new(HeadlessBackend::new(), config.renderer.clone());
//!
//!     let cube = scene.spawn("Cube");
//!     scene.set_mesh(cube, "Cube")?;
//!     scene.set_transform(cube, TransformComponent::from_position(Vec3::new(0.0, 0.0, -5.0)))?;
//!
//!     scene.render(&mut renderer)?;
//!     println!("{} draw call(s)", renderer.statistics().draw_calls);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

pub mod foundation;
pub mod config;
pub mod assets;
pub mod ecs;
pub mod events;
pub mod render;
pub mod scene;
pub mod platform;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, EngineConfig, GraphicLimits, RendererConfig, WindowConfig},
        ecs::{
            Entity, World,
            components::{PointLight, PointLightComponent, RenderableComponent, TagComponent, TransformComponent},
        },
        events::{ComponentEvent, ComponentKind, EventKind, UpdateKind},
        foundation::math::{Mat4, Vec2, Vec3, Vec4},
        render::{
            BatchError, BatchManager, GraphicsBackend, HeadlessBackend, MeshStorage, MeshType,
            MaterialStorage, OpenGlBackend, RenderStatistics, Renderer,
        },
        scene::{Scene, SceneError, SceneResult},
        platform::GlWindow,
    };
}
