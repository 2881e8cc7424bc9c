//! Per-context mirror of pipeline state, fed only by intercepted calls.

pub mod attributes;
pub mod buffers;

use std::collections::HashMap;
use std::sync::Arc;

use shared::{AttributeRole, RoleTables};

use crate::backend::ActiveAttribute;
use crate::gl::{TextureId, TEXTURE0};
use crate::mesh::Texture;

pub use attributes::{AttributeLayout, AttributeSlot, AttributeTable};
pub use buffers::{BufferPayload, BufferRecord, BufferStore, UploadSkip};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// What is known about a texture object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureRecord {
    /// Level 0 size, when an upload revealed it
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Streams decoded for the draw call in flight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexStreams {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    /// Slot the positions came from
    pub position_slot: Option<u32>,
}

impl VertexStreams {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Default)]
pub struct GraphicsContextShadow {
    pub viewport: Viewport,
    pub buffers: BufferStore,
    pub attributes: AttributeTable,
    active_unit: u32,
    units: HashMap<u32, TextureId>,
    textures: HashMap<TextureId, TextureRecord>,
    bound_texture: Option<TextureId>,
    /// Exported descriptors, keyed by texture handle; cleared per batch
    texture_cache: HashMap<TextureId, Arc<Texture>>,
    pub streams: VertexStreams,
}

impl GraphicsContextShadow {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Textures ─────────────────────────────────────────────

    pub fn create_texture(&mut self, texture: TextureId) {
        self.textures.insert(texture, TextureRecord::default());
    }

    /// `activeTexture(TEXTURE0 + n)`.
    pub fn set_active_texture(&mut self, unit_enum: u32) {
        self.active_unit = unit_enum.wrapping_sub(TEXTURE0);
    }

    pub fn active_unit(&self) -> u32 {
        self.active_unit
    }

    /// Bind a 2D texture to the active unit.
    pub fn bind_texture_2d(&mut self, texture: TextureId) {
        self.units.insert(self.active_unit, texture);
        self.textures.entry(texture).or_default();
        self.bound_texture = Some(texture);
    }

    pub fn texture_in_unit(&self, unit: u32) -> Option<TextureId> {
        self.units.get(&unit).copied()
    }

    pub fn texture_record(&self, texture: TextureId) -> Option<&TextureRecord> {
        self.textures.get(&texture)
    }

    /// A 2D image upload to the currently bound texture.
    pub fn record_texture_image(&mut self, level: i32, width: Option<u32>, height: Option<u32>) {
        let Some(texture) = self.bound_texture else {
            return;
        };
        let record = self.textures.entry(texture).or_default();
        if level == 0 {
            if let (Some(w), Some(h)) = (width, height) {
                record.width = Some(w);
                record.height = Some(h);
            }
        }
    }

    pub fn cached_texture(&self, texture: TextureId) -> Option<Arc<Texture>> {
        self.texture_cache.get(&texture).cloned()
    }

    pub fn cache_texture(&mut self, texture: TextureId, descriptor: Arc<Texture>) {
        self.texture_cache.insert(texture, descriptor);
    }

    pub fn clear_texture_cache(&mut self) {
        self.texture_cache.clear();
    }

    pub fn texture_cache_len(&self) -> usize {
        self.texture_cache.len()
    }

    // ── Attributes ───────────────────────────────────────────

    /// Decode an attribute slot into floats.
    ///
    /// Empty when the slot is disabled, has no layout, or its buffer has
    /// no content.
    pub fn decode_attribute(&self, slot: u32) -> Vec<f32> {
        let Some(layout) = self.attributes.active_layout(slot) else {
            return Vec::new();
        };
        let Some(record) = layout.buffer.and_then(|b| self.buffers.record(b)) else {
            return Vec::new();
        };
        if record.is_empty() {
            return Vec::new();
        }
        attributes::decode(layout, record.as_bytes())
    }

    /// Decode the current program's attributes into the per-draw streams.
    pub fn refresh_streams(&mut self, active: &[ActiveAttribute], roles: &RoleTables) {
        for attr in active {
            if attr.location < 0 {
                continue;
            }
            let slot = attr.location as u32;
            if self.attributes.active_layout(slot).is_none() {
                tracing::debug!(name = %attr.name, slot, "attribute slot disabled or undeclared");
                continue;
            }
            let Some(role) = roles.classify_attribute(&attr.name) else {
                tracing::debug!(name = %attr.name, "unknown attribute role");
                continue;
            };
            let decoded = self.decode_attribute(slot);
            if decoded.is_empty() {
                tracing::debug!(name = %attr.name, slot, "attribute buffer empty");
                continue;
            }
            match role {
                AttributeRole::Position => {
                    self.streams.positions = decoded;
                    self.streams.position_slot = Some(slot);
                }
                AttributeRole::Normal => self.streams.normals = decoded,
                AttributeRole::TexCoord => self.streams.uvs = decoded,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{BufferId, ARRAY_BUFFER, FLOAT, TEXTURE0};

    fn floats(values: &[f32]) -> BufferPayload {
        BufferPayload::Floats(values.to_vec())
    }

    fn declare(shadow: &mut GraphicsContextShadow, slot: u32, size: u32) {
        let buffer = shadow.buffers.bound(ARRAY_BUFFER);
        shadow.attributes.declare(
            slot,
            AttributeLayout {
                size,
                ty: FLOAT,
                stride: 0,
                offset: 0,
                normalized: false,
                buffer,
            },
        );
    }

    fn attr(name: &str, location: i32) -> ActiveAttribute {
        ActiveAttribute {
            name: name.to_string(),
            location,
        }
    }

    #[test]
    fn test_decode_uses_buffer_bound_at_declaration() {
        let mut shadow = GraphicsContextShadow::new();
        shadow.buffers.bind(ARRAY_BUFFER, Some(BufferId(1)));
        shadow.buffers.upload(ARRAY_BUFFER, &floats(&[1.0, 2.0, 3.0])).unwrap();
        declare(&mut shadow, 0, 3);

        // rebinding after the declaration does not move the attribute
        shadow.buffers.bind(ARRAY_BUFFER, Some(BufferId(2)));
        shadow.buffers.upload(ARRAY_BUFFER, &floats(&[9.0; 6])).unwrap();

        assert_eq!(shadow.decode_attribute(0), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_decode_skips_disabled_and_missing() {
        let mut shadow = GraphicsContextShadow::new();
        assert!(shadow.decode_attribute(0).is_empty());

        shadow.buffers.bind(ARRAY_BUFFER, Some(BufferId(1)));
        declare(&mut shadow, 0, 3);
        // declared but no content uploaded
        assert!(shadow.decode_attribute(0).is_empty());

        shadow.buffers.upload(ARRAY_BUFFER, &floats(&[1.0, 2.0, 3.0])).unwrap();
        shadow.attributes.set_enabled(0, false);
        assert!(shadow.decode_attribute(0).is_empty());
    }

    #[test]
    fn test_refresh_streams_by_role() {
        let mut shadow = GraphicsContextShadow::new();
        shadow.buffers.bind(ARRAY_BUFFER, Some(BufferId(1)));
        shadow.buffers.upload(ARRAY_BUFFER, &floats(&[0.0; 9])).unwrap();
        declare(&mut shadow, 0, 3);
        shadow.buffers.bind(ARRAY_BUFFER, Some(BufferId(2)));
        shadow.buffers.upload(ARRAY_BUFFER, &floats(&[0.5; 6])).unwrap();
        declare(&mut shadow, 1, 2);
        shadow.buffers.bind(ARRAY_BUFFER, Some(BufferId(3)));
        shadow.buffers.upload(ARRAY_BUFFER, &floats(&[1.0; 4])).unwrap();
        declare(&mut shadow, 2, 4);

        let active = [
            attr("aPosition", 0),
            attr("uv", 1),
            attr("skinWeight", 2),
            attr("normal", -1),
        ];
        shadow.refresh_streams(&active, &RoleTables::default());

        assert_eq!(shadow.streams.positions.len(), 9);
        assert_eq!(shadow.streams.uvs.len(), 6);
        assert!(shadow.streams.normals.is_empty());
        assert_eq!(shadow.streams.position_slot, Some(0));
    }

    #[test]
    fn test_texture_units() {
        let mut shadow = GraphicsContextShadow::new();
        shadow.set_active_texture(TEXTURE0 + 3);
        shadow.bind_texture_2d(TextureId(7));
        assert_eq!(shadow.active_unit(), 3);
        assert_eq!(shadow.texture_in_unit(3), Some(TextureId(7)));
        assert_eq!(shadow.texture_in_unit(0), None);
    }

    #[test]
    fn test_texture_image_records_level0_size() {
        let mut shadow = GraphicsContextShadow::new();
        shadow.create_texture(TextureId(1));
        shadow.bind_texture_2d(TextureId(1));
        shadow.record_texture_image(1, Some(8), Some(8));
        shadow.record_texture_image(0, Some(64), Some(32));
        let record = shadow.texture_record(TextureId(1)).unwrap();
        assert_eq!((record.width, record.height), (Some(64), Some(32)));
    }
}
