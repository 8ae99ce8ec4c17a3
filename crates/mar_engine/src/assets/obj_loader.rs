//! OBJ file loader for 3D models
//!
//! Reads positions, texture coordinates, normals and polygon faces, splits the
//! file into sub-meshes on `o`/`g`/`usemtl`, and triangulates every face. Each
//! face gets its own copy of its corner vertices, so indices inside a sub-mesh
//! are face-local offsets into that sub-mesh's vertex list.
//!
//! `mtllib` paths are resolved relative to the OBJ file and recorded; the
//! material library itself is not parsed here.

use crate::assets::triangulation::triangulate;
use crate::foundation::math::{Vec2, Vec3};
use crate::render::mesh::{MeshProxy, MeshType, Vertex};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Mesh ingestion failures
#[derive(Error, Debug)]
pub enum LoadError {
    /// File does not exist
    #[error("Mesh file not found: {path}")]
    NotFound {
        /// Requested path
        path: String,
    },

    /// File parsed but produced no usable geometry, or is not an OBJ file
    #[error("No mesh data in {path}: {reason}")]
    EmptyOrInvalid {
        /// Requested path
        path: String,
        /// What was wrong
        reason: String,
    },

    /// File holds several meshes where exactly one is required
    #[error("Loaded Meshes > 1 are not supported! {path} contains {count} meshes")]
    UnsupportedMultiMesh {
        /// Requested path
        path: String,
        /// Number of sub-meshes found
        count: usize,
    },

    /// Any other read failure
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Requested path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for mesh loading
pub type LoadResult<T> = Result<T, LoadError>;

/// One sub-mesh of an OBJ file
#[derive(Debug, Clone, Default)]
pub struct ObjMesh {
    /// Name from the `o`/`g` line, "unnamed" otherwise
    pub name: String,
    /// Vertices, one per face corner
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
    /// Material selected by `usemtl` while this mesh was read
    pub material_name: Option<String>,
}

/// Everything read from one OBJ file
#[derive(Debug, Clone, Default)]
pub struct ObjData {
    /// Sub-meshes in file order
    pub meshes: Vec<ObjMesh>,
    /// Resolved `mtllib` paths
    pub material_libraries: Vec<String>,
    /// Every `usemtl` name in file order
    pub material_names: Vec<String>,
}

impl ObjData {
    /// Total vertex count across sub-meshes
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }
}

/// Resolve an `mtllib` value against the directory of the OBJ file
///
/// The OBJ path is split on `/` and every segment but the last is kept.
pub fn resolve_material_library(obj_path: &str, library: &str) -> String {
    let segments: Vec<&str> = obj_path.split('/').collect();
    let mut resolved = String::new();
    if segments.len() > 1 {
        for segment in &segments[..segments.len() - 1] {
            resolved.push_str(segment);
            resolved.push('/');
        }
    }
    resolved.push_str(library);
    resolved
}

/// Text after the first token, trimmed
fn tail(line: &str) -> &str {
    let trimmed = line.trim();
    trimmed
        .find(char::is_whitespace)
        .map_or("", |at| trimmed[at..].trim())
}

/// Convert a 1-based or negative OBJ index into a 0-based one
fn resolve_index(token: &str, len: usize) -> Option<usize> {
    let raw: i64 = token.parse().ok()?;
    let len = i64::try_from(len).ok()?;
    let resolved = match raw {
        0 => return None,
        r if r < 0 => len + r,
        r => r - 1,
    };
    (0..len).contains(&resolved).then(|| resolved as usize)
}

fn parse_floats<const N: usize>(line: &str) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    let mut parts = tail(line).split_whitespace();
    for value in &mut out {
        *value = parts.next()?.parse().ok().filter(|v: &f32| v.is_finite())?;
    }
    Some(out)
}

/// Parser state while walking the file
#[derive(Default)]
struct ObjParser {
    positions: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    normals: Vec<Vec3>,
    current: ObjMesh,
    object_name: String,
    material_splits: usize,
    listening: bool,
    current_material: Option<String>,
    data: ObjData,
}

impl ObjParser {
    fn has_geometry(&self) -> bool {
        !self.current.vertices.is_empty() && !self.current.indices.is_empty()
    }

    fn finish_mesh(&mut self, next_name: String) {
        let mut mesh = std::mem::take(&mut self.current);
        mesh.material_name.clone_from(&self.current_material);
        self.data.meshes.push(mesh);
        self.current.name = next_name;
    }

    fn begin_object(&mut self, line: &str, named: bool) {
        let name = if named { tail(line).to_string() } else { "unnamed".to_string() };
        self.object_name.clone_from(&name);
        self.material_splits = 0;
        if self.listening && self.has_geometry() {
            self.finish_mesh(name);
        } else {
            self.listening = true;
            self.current.name = name;
        }
    }

    fn use_material(&mut self, name: &str) {
        self.data.material_names.push(name.to_string());
        if self.has_geometry() {
            // Parts of one object are numbered from 2: "hull", "hull_2", "hull_3"
            self.material_splits += 1;
            let name = format!("{}_{}", self.object_name, self.material_splits + 1);
            self.finish_mesh(name);
        }
        self.current_material = Some(name.to_string());
    }

    /// Build the corner vertices of one face
    fn face_vertices(&self, line: &str) -> Vec<Vertex> {
        let mut vertices = Vec::new();
        let mut missing_normal = false;

        for corner in tail(line).split_whitespace() {
            let parts: Vec<&str> = corner.split('/').collect();
            let position = parts.first().and_then(|p| resolve_index(p, self.positions.len()));
            let Some(position) = position.map(|i| self.positions[i]) else {
                log::warn!("Skipping face corner '{}': position index out of range", corner);
                continue;
            };

            let (uv, normal) = match parts.as_slice() {
                [_] => (None, None),
                [_, t] => (Some(*t), None),
                [_, t, n] => ((!t.is_empty()).then_some(*t), Some(*n)),
                _ => {
                    log::warn!("Skipping face corner with unrecognized shape '{}'", corner);
                    continue;
                }
            };

            let uv = uv
                .and_then(|t| resolve_index(t, self.tex_coords.len()))
                .map_or(Vec2::zeros(), |i| self.tex_coords[i]);
            let normal = normal
                .and_then(|n| resolve_index(n, self.normals.len()))
                .map(|i| self.normals[i]);
            if normal.is_none() {
                missing_normal = true;
            }
            let normal = normal.unwrap_or_else(Vec3::zeros);

            vertices.push(Vertex::new(position.into(), normal.into(), uv.into()));
        }

        if missing_normal && vertices.len() >= 3 {
            let v0 = Vec3::from(vertices[0].position);
            let v1 = Vec3::from(vertices[1].position);
            let v2 = Vec3::from(vertices[2].position);
            let flat: [f32; 3] = (v0 - v1).cross(&(v2 - v1)).into();
            for vertex in &mut vertices {
                vertex.normal = flat;
            }
        }

        vertices
    }

    fn add_face(&mut self, line: &str) {
        let corners = self.face_vertices(line);
        let positions: Vec<Vec3> = corners.iter().map(|v| Vec3::from(v.position)).collect();
        let local = triangulate(&positions);
        if local.is_empty() {
            log::debug!("Dropping face with {} corners that produced no triangles", corners.len());
            return;
        }

        let base = self.current.vertices.len() as u32;
        self.current.vertices.extend(corners);
        self.current.indices.extend(local.into_iter().map(|i| base + i));
    }

    fn parse_line(&mut self, line: &str, obj_path: &str) {
        let first = line.split_whitespace().next().unwrap_or("");
        match first {
            "" => {}
            token if token.starts_with('#') => {}
            "o" | "g" => self.begin_object(line, true),
            _ if line.starts_with('g') => self.begin_object(line, false),
            "v" => match parse_floats::<3>(line) {
                Some(p) => self.positions.push(Vec3::from(p)),
                None => log::warn!("Skipping malformed position line '{}'", line),
            },
            "vt" => match parse_floats::<2>(line) {
                Some(t) => self.tex_coords.push(Vec2::from(t)),
                None => log::warn!("Skipping malformed texture coordinate line '{}'", line),
            },
            "vn" => match parse_floats::<3>(line) {
                Some(n) => self.normals.push(Vec3::from(n)),
                None => log::warn!("Skipping malformed normal line '{}'", line),
            },
            "f" => self.add_face(line),
            "usemtl" => self.use_material(tail(line)),
            "mtllib" => {
                let library = resolve_material_library(obj_path, tail(line));
                log::debug!("Material library referenced: {}", library);
                self.data.material_libraries.push(library);
            }
            _ => {}
        }
    }

    fn finish(mut self) -> ObjData {
        if self.has_geometry() {
            self.finish_mesh(String::new());
        }
        self.data
    }
}

/// Wavefront OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    /// Parse an OBJ file into all of its sub-meshes
    pub fn load_file<P: AsRef<Path>>(path: P) -> LoadResult<ObjData> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().replace('\\', "/");

        let file = File::open(path_ref).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound { path: path_str.clone() },
            _ => LoadError::Io { path: path_str.clone(), source },
        })?;

        if !path_ref.extension().is_some_and(|e| e.eq_ignore_ascii_case("obj")) {
            return Err(LoadError::EmptyOrInvalid {
                path: path_str,
                reason: "not an .obj file".to_string(),
            });
        }

        let mut parser = ObjParser::default();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| LoadError::Io { path: path_str.clone(), source })?;
            parser.parse_line(&line, &path_str);
        }

        let data = parser.finish();
        if data.meshes.is_empty() {
            return Err(LoadError::EmptyOrInvalid {
                path: path_str,
                reason: "no faces produced any triangles".to_string(),
            });
        }

        log::debug!(
            "Parsed {}: {} mesh(es), {} vertices",
            path_str,
            data.meshes.len(),
            data.vertex_count()
        );
        Ok(data)
    }

    /// Load an OBJ file that must contain exactly one mesh
    pub fn load_single<P: AsRef<Path>>(path: P) -> LoadResult<MeshProxy> {
        let path_str = path.as_ref().to_string_lossy().replace('\\', "/");
        let mut data = Self::load_file(path)?;

        if data.meshes.len() > 1 {
            return Err(LoadError::UnsupportedMultiMesh {
                path: path_str,
                count: data.meshes.len(),
            });
        }

        let mesh = data.meshes.remove(0);
        Ok(MeshProxy::new(mesh.vertices, mesh.indices, MeshType::External, path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_fixture(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mar_engine_obj_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    const QUAD: &str = "\
# a single quad
mtllib quad.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
usemtl red
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn test_quad_triangulates_to_two_triangles() {
        let path = write_fixture("quad.obj", QUAD);
        let mesh = ObjLoader::load_single(&path).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.mesh_type(), MeshType::External);
        assert!(mesh.indices().iter().all(|&i| i < 4));
        let positions: Vec<[f32; 3]> = mesh.vertices().iter().map(|v| v.position).collect();
        assert_eq!(positions[2], [1.0, 1.0, 0.0]);
        assert!(mesh.vertices().iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_material_references_recorded() {
        let path = write_fixture("quad_mtl.obj", QUAD);
        let data = ObjLoader::load_file(&path).unwrap();

        assert_eq!(data.material_names, vec!["red".to_string()]);
        assert_eq!(data.meshes[0].material_name.as_deref(), Some("red"));
        assert_eq!(data.material_libraries.len(), 1);
        assert!(data.material_libraries[0].ends_with("/quad.mtl"));
    }

    #[test]
    fn test_negative_indices_resolve_from_end() {
        let source = "v 0 0 0\nv 5 0 0\nv 0 5 0\nf -3 -2 -1\nv 9 9 9\nf 1 2 -1\n";
        let path = write_fixture("negative.obj", source);
        let data = ObjLoader::load_file(&path).unwrap();
        let vertices = &data.meshes[0].vertices;

        assert_eq!(vertices[2].position, [0.0, 5.0, 0.0]);
        // -1 in the second face is the fourth position, parsed after the first face
        assert_eq!(vertices[5].position, [9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_missing_normals_use_flat_face_normal() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.5 0.5\nf 1/1 2/1 3/1\n";
        let path = write_fixture("flat.obj", source);
        let data = ObjLoader::load_file(&path).unwrap();
        let mesh = &data.meshes[0];

        // (v0 - v1) x (v2 - v1) = (-1,0,0) x (-1,1,0)
        for vertex in &mesh.vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, -1.0]);
            assert_eq!(vertex.uv, [0.5, 0.5]);
        }
    }

    #[test]
    fn test_unrecognized_corner_skipped() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 1 2 3/1/1/1 3\n";
        let path = write_fixture("bad_corner.obj", source);
        let data = ObjLoader::load_file(&path).unwrap();

        assert_eq!(data.meshes[0].vertices.len(), 3);
        assert_eq!(data.meshes[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_groups_split_meshes() {
        let source = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o second
f 1 3 2
";
        let path = write_fixture("two_objects.obj", source);
        let data = ObjLoader::load_file(&path).unwrap();
        assert_eq!(data.meshes.len(), 2);
        assert_eq!(data.meshes[0].name, "first");
        assert_eq!(data.meshes[1].name, "second");

        let result = ObjLoader::load_single(&path);
        assert!(matches!(result, Err(LoadError::UnsupportedMultiMesh { count: 2, .. })));
    }

    #[test]
    fn test_usemtl_splits_filled_mesh() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl a\nf 1 2 3\nusemtl b\nf 1 3 2\n";
        let path = write_fixture("two_materials.obj", source);
        let data = ObjLoader::load_file(&path).unwrap();

        assert_eq!(data.meshes.len(), 2);
        assert_eq!(data.meshes[0].material_name.as_deref(), Some("a"));
        assert_eq!(data.meshes[1].material_name.as_deref(), Some("b"));
    }

    #[test]
    fn test_usemtl_parts_are_numbered() {
        let source = "o hull\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl a\nf 1 2 3\nusemtl b\nf 1 3 2\nusemtl c\nf 2 1 3\n\
                      o fin\nf 1 2 3\nusemtl d\nf 1 3 2\n";
        let path = write_fixture("numbered_parts.obj", source);
        let data = ObjLoader::load_file(&path).unwrap();

        let names: Vec<&str> = data.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["hull", "hull_2", "hull_3", "fin", "fin_2"]);
    }

    #[test]
    fn test_unusable_faces_leave_no_vertices() {
        let source = "v 0 0 0\nv 1 0 0\nv 2 0 0\nv 3 0 0\nv 4 0 0\nv 0 1 0\n\
                      f 1 2 3 4 5\nf 1 2\nf 1 2 6\n";
        let path = write_fixture("collinear_face.obj", source);
        let data = ObjLoader::load_file(&path).unwrap();

        assert_eq!(data.meshes.len(), 1);
        assert_eq!(data.meshes[0].vertices.len(), 3);
        assert_eq!(data.meshes[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_file() {
        let result = ObjLoader::load_file("/definitely/not/here/model.obj");
        assert!(matches!(result, Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn test_empty_file() {
        let path = write_fixture("empty.obj", "# nothing\nv 0 0 0\n");
        let result = ObjLoader::load_file(&path);
        assert!(matches!(result, Err(LoadError::EmptyOrInvalid { .. })));
    }

    #[test]
    fn test_wrong_extension() {
        let path = write_fixture("model.txt", QUAD);
        let result = ObjLoader::load_file(&path);
        assert!(matches!(result, Err(LoadError::EmptyOrInvalid { .. })));
    }

    #[test]
    fn test_resolve_material_library() {
        assert_eq!(resolve_material_library("assets/models/ship.obj", "ship.mtl"), "assets/models/ship.mtl");
        assert_eq!(resolve_material_library("ship.obj", "ship.mtl"), "ship.mtl");
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index("1", 3), Some(0));
        assert_eq!(resolve_index("-1", 3), Some(2));
        assert_eq!(resolve_index("0", 3), None);
        assert_eq!(resolve_index("4", 3), None);
        assert_eq!(resolve_index("-4", 3), None);
        assert_eq!(resolve_index("x", 3), None);
    }
}
