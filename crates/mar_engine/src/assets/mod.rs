//! Asset ingestion
//!
//! OBJ meshes (with polygon triangulation) and image files for 2D textures.

pub mod obj_loader;
pub mod image_loader;
pub mod triangulation;

pub use obj_loader::{ObjLoader, ObjData, ObjMesh, LoadError, LoadResult, resolve_material_library};
pub use image_loader::{ImageData, ImageError};
pub use triangulation::triangulate;
