//! Wavefront OBJ / MTL text for captured meshes.

use std::fmt::Write;

use super::Mesh;
use crate::gl::DrawMode;

/// Build the OBJ body for a mesh.
///
/// Streams are aligned by position index, so a face corner references the
/// same index for position, uv and normal. Incomplete trailing data emits
/// no record.
pub fn build_obj(mesh: &Mesh) -> String {
    let mut obj = String::new();
    let name = &mesh.name;

    let _ = writeln!(obj, "mtllib {name}.mtl");
    let _ = writeln!(obj, "o {name}");

    for v in mesh.positions.chunks_exact(3) {
        let _ = writeln!(obj, "v {} {} {}", v[0], v[1], v[2]);
    }
    for n in mesh.normals.chunks_exact(3) {
        let _ = writeln!(obj, "vn {} {} {}", n[0], n[1], n[2]);
    }
    for t in mesh.uvs.chunks_exact(2) {
        let _ = writeln!(obj, "vt {} {}", t[0], t[1]);
    }

    let _ = writeln!(obj, "usemtl {name}");
    obj.push_str("s on\n");

    for [a, b, c] in faces(mesh.primitive.mode, &mesh.primitive.indices) {
        obj.push('f');
        for index in [a, b, c] {
            obj.push(' ');
            push_corner(&mut obj, index + 1, mesh.has_uvs(), mesh.has_normals());
        }
        obj.push('\n');
    }

    obj
}

/// Build the MTL body for a mesh: one material, one line per texture.
pub fn build_mtl(mesh: &Mesh) -> String {
    let mut mtl = format!("newmtl {}\n", mesh.name);
    for texture in &mesh.textures {
        mtl.push_str(&texture.mtl_line());
        mtl.push('\n');
    }
    mtl
}

/// Triangles described by `indices` under `mode`, in 0-based indices.
///
/// Strips flip the last two corners on odd steps so every face keeps the
/// winding of the first one.
pub fn faces(mode: DrawMode, indices: &[u32]) -> Vec<[u32; 3]> {
    match mode {
        DrawMode::Triangles => indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect(),
        DrawMode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(j, w)| {
                if j % 2 == 1 {
                    [w[0], w[2], w[1]]
                } else {
                    [w[0], w[1], w[2]]
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn push_corner(obj: &mut String, index: u32, has_uvs: bool, has_normals: bool) {
    let _ = write!(obj, "{index}");
    if !has_uvs && !has_normals {
        return;
    }
    obj.push('/');
    if has_uvs {
        let _ = write!(obj, "{index}");
    }
    if has_normals {
        let _ = write!(obj, "/{index}");
    }
}
