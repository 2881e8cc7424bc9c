//! Captured meshes and their material textures.

pub mod obj;

use std::sync::Arc;

use glam::{Mat4, Vec3};
use shared::TextureRole;

use crate::gl::DrawMode;

pub use obj::{build_mtl, build_obj};

/// Image referenced by a material.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// File stem; the exported file is `<filename>.png`
    pub filename: String,
    /// `data:image/png;base64,...` or any URL the sink can fetch
    pub url: String,
    pub role: TextureRole,
}

impl Texture {
    pub fn new(filename: impl Into<String>, url: impl Into<String>, role: TextureRole) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            role,
        }
    }

    /// MTL line referencing this texture.
    pub fn mtl_line(&self) -> String {
        format!("{} {}.png", self.role.mtl_directive(), self.filename)
    }
}

/// Draw mode plus the vertex indices it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub mode: DrawMode,
    pub indices: Vec<u32>,
}

/// Where captured positions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionSource {
    /// Decoded from the position attribute's buffer
    #[default]
    RawAttributes,
    /// Captured from the vertex stage output of the real draw
    VertexStageReadback,
}

/// One captured draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    /// Flattened xyz triples
    pub positions: Vec<f32>,
    /// Flattened xyz triples, empty when the draw had no normal attribute
    pub normals: Vec<f32>,
    /// Flattened uv pairs, empty when the draw had no texcoord attribute
    pub uvs: Vec<f32>,
    pub primitive: Primitive,
    pub textures: Vec<Arc<Texture>>,
    pub position_source: PositionSource,
    transformed: bool,
}

impl Mesh {
    pub fn new(name: impl Into<String>, positions: Vec<f32>, primitive: Primitive) -> Self {
        Self {
            name: name.into(),
            positions,
            normals: Vec::new(),
            uvs: Vec::new(),
            primitive,
            textures: Vec::new(),
            position_source: PositionSource::RawAttributes,
            transformed: false,
        }
    }

    pub fn with_normals(mut self, normals: Vec<f32>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<f32>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn with_textures(mut self, textures: Vec<Arc<Texture>>) -> Self {
        self.textures = textures;
        self
    }

    pub fn with_position_source(mut self, source: PositionSource) -> Self {
        self.position_source = source;
        self
    }

    /// Number of complete position triples.
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    pub fn is_transformed(&self) -> bool {
        self.transformed
    }

    /// Multiply every position by `matrix` (16 floats in GL uniform order,
    /// translation in elements 12..14). The homogeneous component is dropped,
    /// so only affine matrices give meaningful results.
    ///
    /// Returns `false` without touching the mesh if it was already transformed.
    pub fn transform(&mut self, matrix: &[f32; 16]) -> bool {
        if self.transformed {
            return false;
        }
        let m = Mat4::from_cols_array(matrix);
        for p in self.positions.chunks_exact_mut(3) {
            let out = m.transform_point3(Vec3::new(p[0], p[1], p[2]));
            p[0] = out.x;
            p[1] = out.y;
            p[2] = out.z;
        }
        self.transformed = true;
        true
    }
}
