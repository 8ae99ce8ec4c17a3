//! Material storage
//!
//! Materials are flat colors (carried by the renderable itself) or 2D textures.
//! Textures are decoded once per path and referenced by index.

use crate::assets::{ImageData, ImageError};
use crate::ecs::components::{MaterialInfo, RenderableComponent};
use serde::{Serialize, Deserialize};

/// Material kind of a renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MaterialType {
    /// Flat color only
    #[default]
    None,
    /// Sampled 2D texture
    Texture2D,
}

/// Decoded 2D texture
#[derive(Debug, Clone)]
pub struct Texture2D {
    path: String,
    image: ImageData,
}

impl Texture2D {
    /// Source path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// RGBA8 pixels
    pub const fn image(&self) -> &ImageData {
        &self.image
    }
}

/// Owner of every 2D texture used by the scene
#[derive(Debug, Default)]
pub struct MaterialStorage {
    textures: Vec<Texture2D>,
}

impl MaterialStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of an already loaded texture
    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.textures.iter().position(|t| t.path == path)
    }

    /// Load a texture unless the path is already known
    pub fn emplace_texture(&mut self, path: &str) -> Result<usize, ImageError> {
        if let Some(index) = self.index_of(path) {
            return Ok(index);
        }
        let image = ImageData::from_file(path)?;
        Ok(self.insert_texture(path, image))
    }

    /// Store already decoded pixels under a path
    pub fn insert_texture(&mut self, path: &str, image: ImageData) -> usize {
        if let Some(index) = self.index_of(path) {
            return index;
        }
        self.textures.push(Texture2D {
            path: path.to_string(),
            image,
        });
        log::debug!("Texture {} stored at index {}", path, self.textures.len() - 1);
        self.textures.len() - 1
    }

    /// Texture by index
    pub fn texture(&self, index: usize) -> Option<&Texture2D> {
        self.textures.get(index)
    }

    /// Number of stored textures
    pub fn count(&self) -> usize {
        self.textures.len()
    }

    /// Point a renderable at a texture
    ///
    /// On failure the renderable falls back to its flat color and the error is
    /// returned after being logged.
    pub fn assign(&mut self, renderable: &mut RenderableComponent, path: &str) -> Result<usize, ImageError> {
        match self.emplace_texture(path) {
            Ok(index) => {
                renderable.material = MaterialInfo {
                    path: path.to_string(),
                    material_type: MaterialType::Texture2D,
                    index: Some(index),
                };
                Ok(index)
            }
            Err(e) => {
                log::error!("{}; falling back to flat color", e);
                renderable.material = MaterialInfo::default();
                Err(e)
            }
        }
    }

    /// Texture index a renderable can actually sample, if any
    pub fn resolve(&self, renderable: &RenderableComponent) -> Option<usize> {
        if !renderable.material.is_valid() {
            return None;
        }
        renderable.material.index.filter(|&i| i < self.textures.len())
    }
}
