//! Image loading for 2D material textures
//!
//! Decodes image files to tightly packed RGBA8 ready for a texture upload.

use std::path::Path;
use thiserror::Error;

/// Texture decoding failures
#[derive(Error, Debug)]
pub enum ImageError {
    /// File could not be opened or decoded
    #[error("Failed to load image {path}: {reason}")]
    LoadFailed {
        /// Requested path
        path: String,
        /// Decoder message
        reason: String,
    },
}

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Raw RGBA pixel data, rows top to bottom
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let path_ref = path.as_ref();

        let img = image::open(path_ref).map_err(|e| ImageError::LoadFailed {
            path: path_ref.display().to_string(),
            reason: e.to_string(),
        })?;

        // OpenGL expects the first row at the bottom
        let rgba_img = img.flipv().to_rgba8();
        let (width, height) = rgba_img.dimensions();

        log::info!("Loaded texture {}x{} from {:?}", width, height, path_ref);

        Ok(Self {
            data: rgba_img.into_raw(),
            width,
            height,
        })
    }

    /// Create a solid color image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = (width * height) as usize;
        let data = color.repeat(pixel_count);

        Self {
            data,
            width,
            height,
        }
    }

    /// Size of the pixel data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 2, [255, 0, 0, 255]);
        assert_eq!(img.size_bytes(), 4 * 2 * 4);
        assert_eq!(&img.data[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_missing_file() {
        let result = ImageData::from_file("/no/such/texture.png");
        assert!(matches!(result, Err(ImageError::LoadFailed { .. })));
    }

    #[test]
    fn test_png_round_trip_through_decoder() {
        let path = std::env::temp_dir().join(format!("mar_engine_tex_{}.png", std::process::id()));
        let pixels = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        pixels.save(&path).unwrap();

        let loaded = ImageData::from_file(&path).unwrap();
        assert_eq!((loaded.width, loaded.height), (2, 2));
        assert_eq!(&loaded.data[..4], &[10, 20, 30, 255]);
        let _ = std::fs::remove_file(path);
    }
}
