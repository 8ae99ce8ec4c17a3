//! Mesh storage
//!
//! Owns the built-in primitives and every externally loaded mesh for the
//! lifetime of a scene. Externals are deduplicated by source path and are
//! never removed, so an index handed to a renderable stays valid.

use crate::assets::{LoadError, LoadResult, ObjLoader};
use crate::ecs::components::{MeshInfo, RenderableComponent};
use crate::render::mesh::{MeshProxy, MeshType};

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Built-in and external meshes
#[derive(Debug)]
pub struct MeshStorage {
    cube: MeshProxy,
    pyramid: MeshProxy,
    surface: MeshProxy,
    externals: Vec<MeshProxy>,
}

impl Default for MeshStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshStorage {
    /// Build the primitives; no externals yet
    pub fn new() -> Self {
        Self {
            cube: MeshProxy::cube(),
            pyramid: MeshProxy::pyramid(),
            surface: MeshProxy::surface(),
            externals: Vec::new(),
        }
    }

    /// Built-in cube
    pub const fn get_cube(&self) -> &MeshProxy {
        &self.cube
    }

    /// Built-in pyramid
    pub const fn get_pyramid(&self) -> &MeshProxy {
        &self.pyramid
    }

    /// Built-in surface
    pub const fn get_surface(&self) -> &MeshProxy {
        &self.surface
    }

    /// Built-in mesh of a type, `None` for `External`/`None`
    pub const fn get_builtin(&self, mesh_type: MeshType) -> Option<&MeshProxy> {
        match mesh_type {
            MeshType::Cube => Some(&self.cube),
            MeshType::Pyramid => Some(&self.pyramid),
            MeshType::Surface => Some(&self.surface),
            MeshType::External | MeshType::None => None,
        }
    }

    /// Index of an external mesh already loaded from `path`
    pub fn external_index(&self, path: &str) -> Option<usize> {
        let path = normalize(path);
        self.externals.iter().position(|m| m.name() == path)
    }

    /// Whether `path` has been loaded before
    pub fn is_already_loaded(&self, path: &str) -> bool {
        self.external_index(path).is_some()
    }

    /// Load an external mesh, or return the index of the earlier load
    ///
    /// A failed load is logged and stores nothing.
    pub fn emplace_external(&mut self, path: &str) -> LoadResult<usize> {
        if let Some(index) = self.external_index(path) {
            log::debug!("Mesh {} already loaded at index {}", path, index);
            return Ok(index);
        }

        match ObjLoader::load_single(normalize(path)) {
            Ok(proxy) => {
                log::info!(
                    "Loaded mesh {} ({} vertices, {} triangles)",
                    proxy.name(),
                    proxy.vertex_count(),
                    proxy.triangle_count()
                );
                self.externals.push(proxy);
                Ok(self.externals.len() - 1)
            }
            Err(e) => {
                log::error!("{}", e);
                Err(e)
            }
        }
    }

    /// External mesh by index
    pub fn get_external(&self, index: usize) -> Option<&MeshProxy> {
        self.externals.get(index)
    }

    /// Number of external meshes
    pub fn count_external(&self) -> usize {
        self.externals.len()
    }

    /// Mesh a renderable points at; `None` if nothing valid is selected
    pub fn retrieve(&self, renderable: &RenderableComponent) -> Option<&MeshProxy> {
        match renderable.mesh.mesh_type {
            MeshType::External => renderable.mesh.index.and_then(|i| self.get_external(i)),
            other => self.get_builtin(other),
        }
    }

    /// Mesh by built-in name or external path
    pub fn retrieve_by_name(&self, name: &str) -> Option<&MeshProxy> {
        match name {
            "Cube" => Some(&self.cube),
            "Pyramid" => Some(&self.pyramid),
            "Surface" => Some(&self.surface),
            path => self.external_index(path).and_then(|i| self.get_external(i)),
        }
    }

    /// Kind of mesh a path selects
    ///
    /// An `.obj` extension always means an external mesh. Otherwise the file
    /// stem must name a built-in exactly.
    pub fn classify(path: &str) -> MeshType {
        let path = std::path::Path::new(path);
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("obj")) {
            return MeshType::External;
        }
        match path.file_stem().and_then(|s| s.to_str()) {
            Some("Cube") => MeshType::Cube,
            Some("Pyramid") => MeshType::Pyramid,
            Some("Surface") => MeshType::Surface,
            _ => MeshType::None,
        }
    }

    /// Select a mesh for a renderable, loading it if needed
    ///
    /// When loading fails the renderable keeps the path but no index, so it
    /// stays editable and is never drawn.
    pub fn assign(&mut self, renderable: &mut RenderableComponent, path: &str) -> LoadResult<()> {
        let mesh_type = Self::classify(path);
        match mesh_type {
            MeshType::None => {
                renderable.mesh = MeshInfo::default();
                Err(LoadError::EmptyOrInvalid {
                    path: path.to_string(),
                    reason: "not a built-in mesh name or .obj path".to_string(),
                })
            }
            MeshType::External => {
                let result = self.emplace_external(path);
                renderable.mesh = MeshInfo {
                    path: normalize(path),
                    mesh_type,
                    index: result.as_ref().ok().copied(),
                };
                result.map(|_| ())
            }
            builtin => {
                renderable.mesh = MeshInfo {
                    path: builtin.name().to_string(),
                    mesh_type: builtin,
                    index: None,
                };
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_fixture(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mar_engine_meshes_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn test_builtin_counts() {
        let storage = MeshStorage::new();
        assert_eq!((storage.get_cube().vertex_count(), storage.get_cube().index_count()), (8, 36));
        assert_eq!((storage.get_pyramid().vertex_count(), storage.get_pyramid().index_count()), (5, 18));
        assert_eq!((storage.get_surface().vertex_count(), storage.get_surface().index_count()), (4, 6));
    }

    #[test]
    fn test_same_path_loads_once() {
        let path = write_fixture("once.obj", TRIANGLE);
        let path = path.to_string_lossy().to_string();
        let mut storage = MeshStorage::new();

        let first = storage.emplace_external(&path).unwrap();
        let second = storage.emplace_external(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(storage.count_external(), 1);
        assert!(std::ptr::eq(
            storage.get_external(first).unwrap(),
            storage.retrieve_by_name(&path).unwrap()
        ));
    }

    #[test]
    fn test_missing_file_leaves_storage_unchanged() {
        let mut storage = MeshStorage::new();
        let result = storage.emplace_external("/no/such/mesh.obj");
        assert!(matches!(result, Err(LoadError::NotFound { .. })));
        assert_eq!(storage.count_external(), 0);
    }

    #[test]
    fn test_failed_assign_is_not_drawable() {
        let mut storage = MeshStorage::new();
        let mut renderable = RenderableComponent::new();
        assert!(storage.assign(&mut renderable, "/no/such/mesh.obj").is_err());
        assert!(renderable.has_mesh());
        assert_eq!(renderable.mesh.index, None);
        assert!(storage.retrieve(&renderable).is_none());
    }

    #[test]
    fn test_classify() {
        assert_eq!(MeshStorage::classify("Cube"), MeshType::Cube);
        assert_eq!(MeshStorage::classify("assets/Pyramid"), MeshType::Pyramid);
        assert_eq!(MeshStorage::classify("Surface"), MeshType::Surface);
        assert_eq!(MeshStorage::classify("models/teapot.OBJ"), MeshType::External);
        assert_eq!(MeshStorage::classify("models/teapot.fbx"), MeshType::None);
        assert_eq!(MeshStorage::classify("models/CubeCrate.obj"), MeshType::External);
        assert_eq!(MeshStorage::classify("CubeCrate"), MeshType::None);
    }

    #[test]
    fn test_obj_path_naming_a_builtin_loads_the_file() {
        let dir = std::env::temp_dir().join(format!("mar_engine_Surface_assets_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ship.obj");
        std::fs::write(&path, TRIANGLE).unwrap();
        let path = path.to_string_lossy().to_string();

        let mut storage = MeshStorage::new();
        let mut renderable = RenderableComponent::new();
        storage.assign(&mut renderable, &path).unwrap();
        assert_eq!(renderable.mesh.mesh_type, MeshType::External);
        assert_eq!(storage.count_external(), 1);
        assert_eq!(storage.retrieve(&renderable).unwrap().index_count(), 3);
    }

    #[test]
    fn test_assign_builtin_and_retrieve() {
        let mut storage = MeshStorage::new();
        let mut renderable = RenderableComponent::new();
        storage.assign(&mut renderable, "Pyramid").unwrap();
        assert_eq!(renderable.mesh.mesh_type, MeshType::Pyramid);
        assert_eq!(storage.retrieve(&renderable).unwrap().index_count(), 18);
    }

    #[test]
    fn test_out_of_range_external_is_none() {
        let storage = MeshStorage::new();
        let mut renderable = RenderableComponent::new();
        renderable.mesh = MeshInfo {
            path: "gone.obj".to_string(),
            mesh_type: MeshType::External,
            index: Some(7),
        };
        assert!(storage.retrieve(&renderable).is_none());
        assert!(storage.retrieve_by_name("gone.obj").is_none());
    }
}
