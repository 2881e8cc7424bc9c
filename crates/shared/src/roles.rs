//! Name tables used to guess what a vertex attribute or sampler uniform is for.
//!
//! Shaders do not declare semantics, so the engine classifies bindings by
//! name. The tables cover the conventions of a handful of engines
//! (three.js, PlayCanvas, Raylib, imvu, Babylon-style `s_attribute_N`).
//! They are plain data and can be replaced per table from the settings file.

use serde::{Deserialize, Serialize};

/// Semantic role of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeRole {
    Position,
    Normal,
    TexCoord,
}

/// Material slot a sampler feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureRole {
    Diffuse,
    Normal,
}

impl TextureRole {
    /// MTL directive used for this slot.
    pub fn mtl_directive(&self) -> &'static str {
        match self {
            TextureRole::Diffuse => "map_Kd",
            TextureRole::Normal => "norm",
        }
    }
}

const POSITION_NAMES: &[&str] = &[
    "position",
    "vertex",
    "avertexposition",
    "s_attribute_0",
    "avertex",
    "vertex_position", // PlayCanvas
    "aposition",       // PlayCanvas
    "vposition",       // imvu
    "vertexposition",  // Raylib
];

const NORMAL_NAMES: &[&str] = &[
    "avertexnormal",
    "normal",
    "s_attribute_1",
    "vertex_normal", // PlayCanvas
    "vnormal",       // imvu
    "vertexnormal",  // Raylib
];

const TEXCOORD_NAMES: &[&str] = &[
    "uv",
    "texcoord",
    "texcoords",
    "texcoord0",
    "atexturecoord",
    "vertex_texcoord0", // PlayCanvas
    "vtexcoord",        // imvu
    "vertextexcoord",   // Raylib
];

const DIFFUSE_SAMPLERS: &[&str] = &[
    "map",
    "usampler",
    "texture",
    "bonesampler",
    "bonetexture",
    "source",
];

const NORMAL_SAMPLERS: &[&str] = &["normalmap"];

/// Highest numbered `textureN` sampler name treated as diffuse.
const MAX_NUMBERED_TEXTURE: u32 = 31;

const MODEL_MATRIX_UNIFORMS: &[&str] = &["modelMatrix", "world"];

/// Sampler name → material role entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerName {
    pub name: String,
    pub role: TextureRole,
}

/// All name tables consulted during capture.
///
/// Attribute and sampler lookups are case-insensitive; the model matrix
/// lookup is exact, matching how engines spell those uniforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleTables {
    pub position: Vec<String>,
    pub normal: Vec<String>,
    pub texcoord: Vec<String>,
    pub samplers: Vec<SamplerName>,
    pub model_matrix: Vec<String>,
}

impl Default for RoleTables {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut samplers: Vec<SamplerName> = DIFFUSE_SAMPLERS
            .iter()
            .map(|name| SamplerName {
                name: name.to_string(),
                role: TextureRole::Diffuse,
            })
            .collect();
        for t in 0..=MAX_NUMBERED_TEXTURE {
            samplers.push(SamplerName {
                name: format!("texture{t}"),
                role: TextureRole::Diffuse,
            });
        }
        samplers.extend(NORMAL_SAMPLERS.iter().map(|name| SamplerName {
            name: name.to_string(),
            role: TextureRole::Normal,
        }));

        Self {
            position: owned(POSITION_NAMES),
            normal: owned(NORMAL_NAMES),
            texcoord: owned(TEXCOORD_NAMES),
            samplers,
            model_matrix: owned(MODEL_MATRIX_UNIFORMS),
        }
    }
}

impl RoleTables {
    /// Classify a vertex attribute by its declared name.
    pub fn classify_attribute(&self, name: &str) -> Option<AttributeRole> {
        let hit = |table: &[String]| table.iter().any(|n| n.eq_ignore_ascii_case(name));

        if hit(&self.position) {
            Some(AttributeRole::Position)
        } else if hit(&self.normal) {
            Some(AttributeRole::Normal)
        } else if hit(&self.texcoord) {
            Some(AttributeRole::TexCoord)
        } else {
            None
        }
    }

    /// Classify a 2D sampler uniform by its declared name.
    pub fn classify_sampler(&self, name: &str) -> Option<TextureRole> {
        self.samplers
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.role)
    }

    /// Whether a uniform carries the model matrix.
    pub fn is_model_matrix(&self, name: &str) -> bool {
        self.model_matrix.iter().any(|n| n == name)
    }
}
