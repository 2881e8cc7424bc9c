//! Factory functions for meshes, programs and call sequences used in tests.

use std::sync::Arc;

use shared::TextureRole;

use crate::backend::ActiveAttribute;
use crate::gl::{
    BufferId, DrawMode, ProgramId, TextureId, ARRAY_BUFFER, ELEMENT_ARRAY_BUFFER, FLOAT,
    TEXTURE0, TEXTURE_2D, TRIANGLES, UNSIGNED_SHORT,
};
use crate::intercept::GlCall;
use crate::mesh::{Mesh, Primitive, Texture};
use crate::shadow::BufferPayload;
use crate::trace::{ProgramScript, UniformScript};

// ── Meshes ───────────────────────────────────────────────────

/// Single triangle in the XY plane.
pub fn triangle(name: &str) -> Mesh {
    Mesh::new(
        name,
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        Primitive {
            mode: DrawMode::Triangles,
            indices: vec![0, 1, 2],
        },
    )
}

/// Diffuse texture descriptor.
pub fn texture(filename: &str, url: &str) -> Arc<Texture> {
    Arc::new(Texture::new(filename, url, TextureRole::Diffuse))
}

/// Unit quad corners, 4 position triples.
pub fn quad_positions() -> Vec<f32> {
    vec![
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        1.0, 1.0, 0.0, //
        0.0, 1.0, 0.0,
    ]
}

/// Two triangles covering the quad.
pub fn quad_indices() -> Vec<u16> {
    vec![0, 1, 2, 0, 2, 3]
}

pub fn quad_uvs() -> Vec<f32> {
    vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]
}

// ── Programs ─────────────────────────────────────────────────

pub fn attribute(name: &str, location: i32) -> ActiveAttribute {
    ActiveAttribute {
        name: name.to_string(),
        location,
    }
}

/// Program with a `position` attribute in slot 0.
pub fn position_program(id: u32) -> ProgramScript {
    ProgramScript {
        id: ProgramId(id),
        attributes: vec![attribute("position", 0)],
        uniforms: Vec::new(),
    }
}

/// Program with position (0) and uv (1) attributes and a `map` sampler on unit 0.
pub fn textured_program(id: u32) -> ProgramScript {
    ProgramScript {
        id: ProgramId(id),
        attributes: vec![attribute("position", 0), attribute("uv", 1)],
        uniforms: vec![UniformScript::sampler("map", 0)],
    }
}

// ── Call sequences ───────────────────────────────────────────

/// Create, bind and fill a float vertex buffer, then point `slot` at it.
pub fn float_attribute_calls(buffer: u32, slot: u32, size: u32, data: &[f32]) -> Vec<GlCall> {
    vec![
        GlCall::CreateBuffer {
            buffer: BufferId(buffer),
        },
        GlCall::BindBuffer {
            target: ARRAY_BUFFER,
            buffer: Some(BufferId(buffer)),
        },
        GlCall::BufferData {
            target: ARRAY_BUFFER,
            data: BufferPayload::Floats(data.to_vec()),
            usage: 0,
        },
        GlCall::VertexAttribPointer {
            index: slot,
            size,
            ty: FLOAT,
            normalized: false,
            stride: 0,
            offset: 0,
        },
        GlCall::EnableVertexAttribArray { index: slot },
    ]
}

/// Create, bind and fill an unsigned short element buffer.
pub fn index_buffer_calls(buffer: u32, indices: &[u16]) -> Vec<GlCall> {
    vec![
        GlCall::CreateBuffer {
            buffer: BufferId(buffer),
        },
        GlCall::BindBuffer {
            target: ELEMENT_ARRAY_BUFFER,
            buffer: Some(BufferId(buffer)),
        },
        GlCall::BufferData {
            target: ELEMENT_ARRAY_BUFFER,
            data: BufferPayload::U16(indices.to_vec()),
            usage: 0,
        },
    ]
}

/// Create a texture and bind it to `unit`.
pub fn texture_calls(texture: u32, unit: u32, size: Option<(u32, u32)>) -> Vec<GlCall> {
    vec![
        GlCall::CreateTexture {
            texture: TextureId(texture),
        },
        GlCall::ActiveTexture {
            texture: TEXTURE0 + unit,
        },
        GlCall::BindTexture {
            target: TEXTURE_2D,
            texture: Some(TextureId(texture)),
        },
        GlCall::TexImage2D {
            target: TEXTURE_2D,
            level: 0,
            width: size.map(|s| s.0),
            height: size.map(|s| s.1),
        },
    ]
}

pub fn draw_triangles(count: i32) -> GlCall {
    GlCall::DrawArrays {
        mode: TRIANGLES,
        first: 0,
        count,
    }
}

pub fn draw_indexed_triangles(count: i32) -> GlCall {
    GlCall::DrawElements {
        mode: TRIANGLES,
        count,
        index_type: UNSIGNED_SHORT,
        offset: 0,
    }
}

pub fn clear() -> GlCall {
    GlCall::Clear { mask: 0x4000 }
}
