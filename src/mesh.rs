//! Rigid triangle meshes and Wavefront OBJ loading.
//!
//! The optimizer treats the mesh as opaque render input; only vertex
//! positions and triangle indices are kept. Texture and normal records in
//! the OBJ are parsed past and dropped.

use anyhow::{bail, ensure, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Vertex positions plus triangle indices into them.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Load a mesh from a Wavefront OBJ file. Faces with more than three
    /// vertices are fan-triangulated.
    pub fn load_obj(path: impl AsRef<Path>) -> Result<TriangleMesh> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("failed to open mesh {}", path.display()))?;
        Self::parse_obj(BufReader::new(file))
            .with_context(|| format!("failed to parse mesh {}", path.display()))
    }

    /// Parse OBJ records from a reader. Only `v` and `f` records are used.
    pub fn parse_obj(reader: impl BufRead) -> Result<TriangleMesh> {
        let mut mesh = TriangleMesh::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.context("read error")?;
            let line = line.trim();
            let mut fields = line.split_whitespace();
            match fields.next() {
                Some("v") => {
                    let mut coord = [0.0f32; 3];
                    for c in coord.iter_mut() {
                        let token = fields
                            .next()
                            .with_context(|| format!("line {}: truncated vertex", line_no + 1))?;
                        *c = token.parse().with_context(|| {
                            format!("line {}: bad vertex coordinate {:?}", line_no + 1, token)
                        })?;
                    }
                    mesh.vertices.push(coord);
                }
                Some("f") => {
                    let corners: Vec<u32> = fields
                        .map(|token| parse_face_index(token, mesh.vertices.len(), line_no + 1))
                        .collect::<Result<_>>()?;
                    ensure!(
                        corners.len() >= 3,
                        "line {}: face with {} vertices",
                        line_no + 1,
                        corners.len()
                    );
                    for i in 1..corners.len() - 1 {
                        mesh.indices.push([corners[0], corners[i], corners[i + 1]]);
                    }
                }
                // Comments, normals, texcoords, groups, materials.
                _ => {}
            }
        }

        ensure!(!mesh.indices.is_empty(), "mesh contains no faces");
        Ok(mesh)
    }
}

/// Parse one face corner (`v`, `v/vt`, `v/vt/vn`, or `v//vn`) into a
/// zero-based vertex index.
fn parse_face_index(token: &str, num_vertices: usize, line_no: usize) -> Result<u32> {
    let index_part = token.split('/').next().unwrap_or("");
    let index: i64 = index_part
        .parse()
        .with_context(|| format!("line {}: bad face index {:?}", line_no, token))?;
    if index < 1 {
        // Negative (relative) OBJ indices are not produced by the scan
        // tooling this crate consumes.
        bail!("line {}: unsupported face index {}", line_no, index);
    }
    let zero_based = (index - 1) as usize;
    ensure!(
        zero_based < num_vertices,
        "line {}: face index {} out of range ({} vertices)",
        line_no,
        index,
        num_vertices
    );
    Ok(zero_based as u32)
}
