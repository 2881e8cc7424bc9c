//! GL enum values and handle types the engine understands.

use serde::{Deserialize, Serialize};

// ── Buffer targets ───────────────────────────────────────────

pub const ARRAY_BUFFER: u32 = 0x8892;
pub const ELEMENT_ARRAY_BUFFER: u32 = 0x8893;

// ── Scalar types ─────────────────────────────────────────────

pub const BYTE: u32 = 0x1400;
pub const UNSIGNED_BYTE: u32 = 0x1401;
pub const SHORT: u32 = 0x1402;
pub const UNSIGNED_SHORT: u32 = 0x1403;
pub const INT: u32 = 0x1404;
pub const UNSIGNED_INT: u32 = 0x1405;
pub const FLOAT: u32 = 0x1406;
pub const HALF_FLOAT: u32 = 0x140B;

// ── Draw modes ───────────────────────────────────────────────

pub const POINTS: u32 = 0x0000;
pub const LINES: u32 = 0x0001;
pub const LINE_LOOP: u32 = 0x0002;
pub const LINE_STRIP: u32 = 0x0003;
pub const TRIANGLES: u32 = 0x0004;
pub const TRIANGLE_STRIP: u32 = 0x0005;
pub const TRIANGLE_FAN: u32 = 0x0006;

// ── Textures / uniforms ──────────────────────────────────────

pub const TEXTURE_2D: u32 = 0x0DE1;
pub const TEXTURE0: u32 = 0x84C0;
pub const SAMPLER_2D: u32 = 0x8B5E;
pub const FLOAT_MAT4: u32 = 0x8B5C;

/// Texture units addressable by a sampler uniform.
pub const MAX_TEXTURE_UNITS: u32 = 32;

// ── Handles ──────────────────────────────────────────────────

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);
    };
}

handle!(
    /// Identity of a host buffer object.
    BufferId
);
handle!(
    /// Identity of a host texture object.
    TextureId
);
handle!(
    /// Identity of a host shader program.
    ProgramId
);
handle!(
    /// Identity of a hooked rendering context.
    ContextId
);

// ── Typed enums ──────────────────────────────────────────────

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl DrawMode {
    pub fn from_gl(mode: u32) -> Option<Self> {
        Some(match mode {
            POINTS => DrawMode::Points,
            LINES => DrawMode::Lines,
            LINE_LOOP => DrawMode::LineLoop,
            LINE_STRIP => DrawMode::LineStrip,
            TRIANGLES => DrawMode::Triangles,
            TRIANGLE_STRIP => DrawMode::TriangleStrip,
            TRIANGLE_FAN => DrawMode::TriangleFan,
            _ => return None,
        })
    }

    pub fn to_gl(self) -> u32 {
        match self {
            DrawMode::Points => POINTS,
            DrawMode::Lines => LINES,
            DrawMode::LineLoop => LINE_LOOP,
            DrawMode::LineStrip => LINE_STRIP,
            DrawMode::Triangles => TRIANGLES,
            DrawMode::TriangleStrip => TRIANGLE_STRIP,
            DrawMode::TriangleFan => TRIANGLE_FAN,
        }
    }

    /// Topologies that can be turned into OBJ faces.
    pub fn is_capturable(self) -> bool {
        matches!(self, DrawMode::Triangles | DrawMode::TriangleStrip)
    }
}

/// Component type of a vertex attribute or index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    HalfFloat,
    Float,
}

impl ScalarType {
    pub fn from_gl(ty: u32) -> Option<Self> {
        Some(match ty {
            BYTE => ScalarType::Byte,
            UNSIGNED_BYTE => ScalarType::UnsignedByte,
            SHORT => ScalarType::Short,
            UNSIGNED_SHORT => ScalarType::UnsignedShort,
            INT => ScalarType::Int,
            UNSIGNED_INT => ScalarType::UnsignedInt,
            HALF_FLOAT => ScalarType::HalfFloat,
            FLOAT => ScalarType::Float,
            _ => return None,
        })
    }

    /// Width of one component in bytes.
    pub fn byte_width(self) -> usize {
        match self {
            ScalarType::Byte | ScalarType::UnsignedByte => 1,
            ScalarType::Short | ScalarType::UnsignedShort | ScalarType::HalfFloat => 2,
            ScalarType::Int | ScalarType::UnsignedInt | ScalarType::Float => 4,
        }
    }

    /// Read one little-endian component and widen it to `f32`.
    ///
    /// `bytes` must hold at least `byte_width()` bytes.
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        match self {
            ScalarType::Byte => bytes[0] as i8 as f32,
            ScalarType::UnsignedByte => bytes[0] as f32,
            ScalarType::Short => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            ScalarType::UnsignedShort => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            ScalarType::HalfFloat => half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32(),
            ScalarType::Int => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            ScalarType::UnsignedInt => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
            }
            ScalarType::Float => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }
}

/// Width in bytes of an index buffer element; unknown types are assumed
/// to be unsigned shorts, by far the most common choice.
pub fn index_width(index_type: u32) -> usize {
    match index_type {
        UNSIGNED_BYTE => 1,
        UNSIGNED_INT => 4,
        _ => 2,
    }
}

/// Read one little-endian index of the given width.
pub fn read_index(bytes: &[u8], width: usize) -> u32 {
    match width {
        1 => bytes[0] as u32,
        4 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        _ => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_mode_roundtrip_gl() {
        for mode in [TRIANGLES, TRIANGLE_STRIP, POINTS, LINES, TRIANGLE_FAN] {
            assert_eq!(DrawMode::from_gl(mode).unwrap().to_gl(), mode);
        }
        assert_eq!(DrawMode::from_gl(0x42), None);
    }

    #[test]
    fn test_capturable_modes() {
        assert!(DrawMode::Triangles.is_capturable());
        assert!(DrawMode::TriangleStrip.is_capturable());
        assert!(!DrawMode::TriangleFan.is_capturable());
        assert!(!DrawMode::Lines.is_capturable());
    }

    #[test]
    fn test_scalar_widths() {
        assert_eq!(ScalarType::from_gl(BYTE).unwrap().byte_width(), 1);
        assert_eq!(ScalarType::from_gl(UNSIGNED_SHORT).unwrap().byte_width(), 2);
        assert_eq!(ScalarType::from_gl(HALF_FLOAT).unwrap().byte_width(), 2);
        assert_eq!(ScalarType::from_gl(FLOAT).unwrap().byte_width(), 4);
        assert_eq!(ScalarType::from_gl(0x1234), None);
    }

    #[test]
    fn test_read_components() {
        assert_eq!(ScalarType::Byte.read_f32(&[0xFF]), -1.0);
        assert_eq!(ScalarType::UnsignedByte.read_f32(&[0xFF]), 255.0);
        assert_eq!(ScalarType::Short.read_f32(&(-300i16).to_le_bytes()), -300.0);
        assert_eq!(ScalarType::Float.read_f32(&1.5f32.to_le_bytes()), 1.5);
        assert_eq!(ScalarType::HalfFloat.read_f32(&half::f16::from_f32(0.5).to_le_bytes()), 0.5);
    }

    #[test]
    fn test_index_width_defaults_to_short() {
        assert_eq!(index_width(UNSIGNED_BYTE), 1);
        assert_eq!(index_width(UNSIGNED_SHORT), 2);
        assert_eq!(index_width(UNSIGNED_INT), 4);
        assert_eq!(index_width(0), 2);
        assert_eq!(read_index(&[7, 1], 2), 263);
    }
}
