//! Scene viewer
//!
//! Opens a window and renders a grid of batched cubes plus a pyramid, a ground
//! surface and an optional OBJ model passed as the first argument. Settings are
//! read from `scene_viewer.toml` when present.

use glfw::{Action, Key, WindowEvent};
use mar_engine::config::ConfigError;
use mar_engine::foundation::{logging, math};
use mar_engine::platform::WindowError;
use mar_engine::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_PATH: &str = "scene_viewer.toml";

#[derive(Error, Debug)]
enum ViewerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ViewerConfig {
    engine: EngineConfig,
    /// Cubes per grid side
    grid: u32,
    /// Distance between grid cells
    spacing: f32,
    /// Cube spin in degrees per second
    rotation_speed: f32,
    /// Optional texture applied to every other cube
    texture: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            grid: 8,
            spacing: 2.5,
            rotation_speed: 45.0,
            texture: None,
        }
    }
}

impl Config for ViewerConfig {}

struct Spinner {
    entity: Entity,
    transform: TransformComponent,
    base_height: f32,
    phase: f32,
}

impl Spinner {
    fn new(entity: Entity, transform: TransformComponent, phase: f32) -> Self {
        Self { entity, transform, base_height: transform.position.y, phase }
    }
}

fn main() {
    if let Err(e) = run() {
        log::error!("Viewer failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), ViewerError> {
    let config = ViewerConfig::load_or_default(CONFIG_PATH)?;
    logging::init_with_level(logging::parse_level(&config.engine.log_level));
    config.engine.validate().map_err(ConfigError::Invalid)?;

    let mut window = GlWindow::new(&config.engine.window)?;
    let gl = window.load_gl();
    let mut renderer = Renderer::new(
        OpenGlBackend::new(gl, config.engine.renderer.wireframe),
        config.engine.renderer.clone(),
    );
    let (width, height) = window.framebuffer_size();
    renderer.backend_mut().set_viewport(width, height);

    let mut scene = Scene::new(&config.engine.renderer);
    let mut spinners = build_grid(&mut scene, &config)?;
    build_props(&mut scene, &mut spinners)?;

    let mut aspect = width as f32 / height.max(1) as f32;
    let mut last_time = window.time();
    let mut last_report = last_time;
    let mut frames = 0u32;

    log::info!("Entering main loop with {} animated entities", spinners.len());
    while !window.should_close() {
        window.poll_events();
        let events: Vec<WindowEvent> = window.flush_events().map(|(_, event)| event).collect();
        for event in events {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                    window.set_should_close(true);
                }
                WindowEvent::FramebufferSize(w, h) => {
                    renderer.backend_mut().set_viewport(w, h);
                    aspect = w as f32 / h.max(1) as f32;
                }
                _ => {}
            }
        }

        let now = window.time();
        let elapsed = now as f32;
        let delta = (now - last_time) as f32;
        last_time = now;

        for spinner in &mut spinners {
            let angle = config.rotation_speed * delta;
            spinner.transform.rotation.y = (spinner.transform.rotation.y + angle) % 360.0;
            spinner.transform.position.y = spinner.base_height + (elapsed + spinner.phase).sin() * 0.25;
            scene.set_transform(spinner.entity, spinner.transform)?;
        }

        let extent = config.grid as f32 * config.spacing;
        let eye = Vec3::new(extent * 0.5, extent * 0.6, extent * 1.1);
        renderer.set_view_projection(math::look_at_perspective(
            &eye,
            &Vec3::zeros(),
            aspect,
            60.0,
            0.1,
            extent * 4.0,
        ));

        scene.render(&mut renderer)?;
        window.swap_buffers();

        frames += 1;
        if now - last_report >= 1.0 {
            let stats = renderer.statistics();
            log::info!(
                "{} fps, {} draw calls, {} triangles, {} entities",
                frames,
                stats.draw_calls,
                stats.triangles,
                stats.entities
            );
            frames = 0;
            last_report = now;
        }
    }

    log::info!("Viewer closed");
    Ok(())
}

fn build_grid(scene: &mut Scene, config: &ViewerConfig) -> Result<Vec<Spinner>, ViewerError> {
    let offset = (config.grid.saturating_sub(1)) as f32 * config.spacing * 0.5;
    let mut spinners = Vec::with_capacity((config.grid * config.grid) as usize);

    for row in 0..config.grid {
        for col in 0..config.grid {
            let entity = scene.spawn(format!("Cube {}x{}", row, col));
            scene.set_mesh(entity, "Cube")?;

            let u = row as f32 / config.grid.max(1) as f32;
            let v = col as f32 / config.grid.max(1) as f32;
            scene.set_color(entity, Vec4::new(u, v, 1.0 - u * v, 1.0))?;

            if let Some(texture) = &config.texture {
                if (row + col) % 2 == 0 {
                    if let Err(e) = scene.set_texture(entity, texture) {
                        log::warn!("Texture '{}' not applied: {}", texture, e);
                    }
                }
            }

            let transform = TransformComponent::from_position(Vec3::new(
                row as f32 * config.spacing - offset,
                0.0,
                col as f32 * config.spacing - offset,
            ))
            .with_uniform_scale(0.6);
            scene.set_transform(entity, transform)?;

            spinners.push(Spinner::new(entity, transform, (row * config.grid + col) as f32 * 0.37));
        }
    }

    log::info!("Spawned {} cubes", spinners.len());
    Ok(spinners)
}

fn build_props(scene: &mut Scene, spinners: &mut Vec<Spinner>) -> Result<(), ViewerError> {
    let ground = scene.spawn("Ground");
    scene.set_mesh(ground, "Surface")?;
    scene.set_color(ground, Vec4::new(0.35, 0.35, 0.38, 1.0))?;
    scene.set_transform(
        ground,
        TransformComponent::from_position(Vec3::new(0.0, -1.5, 0.0)).with_uniform_scale(40.0),
    )?;

    let pyramid = scene.spawn("Pyramid");
    scene.set_mesh(pyramid, "Pyramid")?;
    scene.set_color(pyramid, Vec4::new(0.9, 0.6, 0.1, 1.0))?;
    let transform = TransformComponent::from_position(Vec3::new(0.0, 2.5, 0.0)).with_uniform_scale(1.5);
    scene.set_transform(pyramid, transform)?;
    spinners.push(Spinner::new(pyramid, transform, 0.0));

    if let Some(path) = std::env::args().nth(1) {
        let model = scene.spawn(path.clone());
        match scene.set_mesh(model, &path) {
            Ok(()) => {
                let transform = TransformComponent::from_position(Vec3::new(0.0, 5.0, 0.0));
                scene.set_transform(model, transform)?;
                spinners.push(Spinner::new(model, transform, 1.0));
            }
            Err(e) => {
                log::error!("Could not load '{}': {}", path, e);
                scene.despawn(model)?;
            }
        }
    }

    let sun = scene.spawn("Light");
    scene.set_transform(sun, TransformComponent::from_position(Vec3::new(4.0, 8.0, 4.0)))?;
    scene.add_point_light(
        sun,
        PointLight {
            linear: 0.014,
            quadratic: 0.0007,
            ..PointLight::default()
        },
    )?;

    Ok(())
}
