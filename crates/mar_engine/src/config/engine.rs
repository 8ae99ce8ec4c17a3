//! # Engine Configuration
//!
//! Settings for the batch limits, the renderer, and the window the viewer opens.
//! Every struct has working defaults so partial config files are accepted.

use serde::{Serialize, Deserialize};
use super::Config;

/// # Graphic Limits
///
/// Capacity limits shared by all batches. A mesh batch holds at most
/// `max_transforms` instances and never more geometry than `max_vertices()` /
/// `max_indices()`; the point-light batch holds `max_lights` lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicLimits {
    /// Instances per mesh batch (length of the transform and material storage arrays)
    pub max_transforms: usize,
    /// Lights in the point-light batch
    pub max_lights: usize,
    /// Triangles a single batch may reference
    pub max_triangles: usize,
}

impl GraphicLimits {
    /// Vertex budget of one batch
    pub const fn max_vertices(&self) -> usize {
        self.max_triangles * 3
    }

    /// Index budget of one batch
    pub const fn max_indices(&self) -> usize {
        self.max_triangles * 3
    }

    /// Validate the limits
    pub fn validate(&self) -> Result<(), String> {
        if self.max_transforms == 0 {
            return Err("max_transforms must be at least 1".to_string());
        }
        if self.max_lights == 0 {
            return Err("max_lights must be at least 1".to_string());
        }
        if self.max_triangles == 0 {
            return Err("max_triangles must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for GraphicLimits {
    fn default() -> Self {
        Self {
            max_transforms: 32,
            max_lights: 32,
            max_triangles: 100_000,
        }
    }
}

impl Config for GraphicLimits {}

/// # Renderer Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Batch capacity limits
    pub limits: GraphicLimits,
    /// Upper bound on live mesh batches; attaching beyond it fails with exhaustion
    pub max_batches: usize,
    /// Framebuffer clear color (RGBA)
    pub clear_color: [f32; 4],
    /// Draw polygons as lines
    pub wireframe: bool,
}

impl RendererConfig {
    /// Builder pattern: set batch limits
    pub fn with_limits(mut self, limits: GraphicLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Builder pattern: set the batch count ceiling
    pub fn with_max_batches(mut self, max_batches: usize) -> Self {
        self.max_batches = max_batches;
        self
    }

    /// Builder pattern: set clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Validate the renderer settings
    pub fn validate(&self) -> Result<(), String> {
        self.limits.validate()?;
        if self.max_batches == 0 {
            return Err("max_batches must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            limits: GraphicLimits::default(),
            max_batches: 256,
            clear_color: [0.22, 0.69, 0.87, 1.0],
            wireframe: false,
        }
    }
}

/// # Window Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Width in screen coordinates
    pub width: u32,
    /// Height in screen coordinates
    pub height: u32,
    /// Wait for vertical sync on swap
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "MAREngine".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

/// # Engine Configuration
///
/// Top-level settings file for applications built on the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Window settings
    pub window: WindowConfig,
}

impl EngineConfig {
    /// Create default engine configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Builder pattern: set renderer config
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), String> {
        self.renderer.validate()?;
        if self.window.width == 0 || self.window.height == 0 {
            return Err("Window dimensions must be non-zero".to_string());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            renderer: RendererConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = GraphicLimits::default();
        assert_eq!(limits.max_transforms, 32);
        assert_eq!(limits.max_lights, 32);
        assert_eq!(limits.max_vertices(), 300_000);
        assert_eq!(limits.max_indices(), 300_000);
    }

    #[test]
    fn test_validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let zero = GraphicLimits { max_transforms: 0, ..GraphicLimits::default() };
        let config = RendererConfig::default().with_limits(zero);
        assert!(config.validate().is_err());
        assert!(RendererConfig::default().with_max_batches(0).validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("log_level = \"trace\"\n[renderer]\nwireframe = true\n").unwrap();
        assert_eq!(config.log_level, "trace");
        assert!(config.renderer.wireframe);
        assert_eq!(config.renderer.max_batches, 256);
        assert_eq!(config.window.width, 1280);
    }
}
