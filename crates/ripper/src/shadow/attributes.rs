//! Vertex attribute pointer layouts and the strided decode.

use std::collections::HashMap;

use crate::gl::{BufferId, ScalarType};

/// How to read one attribute out of its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLayout {
    /// Components per vertex (1..=4)
    pub size: u32,
    /// Raw GL component type
    pub ty: u32,
    pub stride: u32,
    pub offset: u32,
    pub normalized: bool,
    /// Buffer bound to `ARRAY_BUFFER` when the pointer was declared
    pub buffer: Option<BufferId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeSlot {
    pub layout: Option<AttributeLayout>,
    pub enabled: bool,
}

/// Slot index → layout + enabled flag.
#[derive(Debug, Default)]
pub struct AttributeTable {
    slots: HashMap<u32, AttributeSlot>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pointer declaration; declaring also enables the slot.
    pub fn declare(&mut self, index: u32, layout: AttributeLayout) {
        let slot = self.slots.entry(index).or_default();
        slot.layout = Some(layout);
        slot.enabled = true;
    }

    /// Toggle the enabled flag; the layout survives a disable.
    pub fn set_enabled(&mut self, index: u32, enabled: bool) {
        self.slots.entry(index).or_default().enabled = enabled;
    }

    pub fn slot(&self, index: u32) -> Option<&AttributeSlot> {
        self.slots.get(&index)
    }

    /// Layout of an enabled slot.
    pub fn active_layout(&self, index: u32) -> Option<&AttributeLayout> {
        self.slots
            .get(&index)
            .filter(|s| s.enabled)
            .and_then(|s| s.layout.as_ref())
    }
}

/// Decode every vertex of an attribute from its buffer bytes.
///
/// Walks the buffer from `offset` in steps of the stride (or the packed
/// vertex width when the stride is 0), reading `size` components per step
/// until a full window no longer fits. The output length is always a
/// multiple of `size`. Unknown component types decode to nothing.
pub fn decode(layout: &AttributeLayout, bytes: &[u8]) -> Vec<f32> {
    let Some(scalar) = ScalarType::from_gl(layout.ty) else {
        return Vec::new();
    };
    let size = layout.size as usize;
    if size == 0 {
        return Vec::new();
    }

    let width = scalar.byte_width();
    let window = width * size;
    let stride = if layout.stride == 0 {
        window
    } else {
        layout.stride as usize
    };

    let mut out = Vec::new();
    let mut offset = layout.offset as usize;
    while offset + window <= bytes.len() {
        for c in 0..size {
            let at = offset + c * width;
            out.push(scalar.read_f32(&bytes[at..at + width]));
        }
        offset += stride;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{FLOAT, SHORT, UNSIGNED_BYTE};

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn layout(size: u32, ty: u32, stride: u32, offset: u32) -> AttributeLayout {
        AttributeLayout {
            size,
            ty,
            stride,
            offset,
            normalized: false,
            buffer: Some(BufferId(1)),
        }
    }

    #[test]
    fn test_decode_packed_floats() {
        let bytes = floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(decode(&layout(3, FLOAT, 0, 0), &bytes), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_decode_interleaved() {
        // position(3) + uv(2) per vertex, 20 byte stride
        let bytes = floats(&[1.0, 2.0, 3.0, 0.1, 0.2, 4.0, 5.0, 6.0, 0.3, 0.4]);
        assert_eq!(decode(&layout(3, FLOAT, 20, 0), &bytes), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(decode(&layout(2, FLOAT, 20, 12), &bytes), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_decode_stops_before_partial_window() {
        let bytes = floats(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let out = decode(&layout(3, FLOAT, 0, 0), &bytes);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_decode_length_multiple_of_size() {
        for size in 1..=4u32 {
            for len in 0..40usize {
                let bytes = vec![1u8; len];
                let out = decode(&layout(size, UNSIGNED_BYTE, 0, 1), &bytes);
                assert_eq!(out.len() % size as usize, 0, "size={size} len={len}");
            }
        }
    }

    #[test]
    fn test_decode_shorts() {
        let bytes: Vec<u8> = [-1i16, 2, 3, 4].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(decode(&layout(2, SHORT, 0, 0), &bytes), vec![-1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_decode_unknown_type_is_empty() {
        assert!(decode(&layout(3, 0x9999, 0, 0), &floats(&[1.0, 2.0, 3.0])).is_empty());
    }

    #[test]
    fn test_disable_keeps_layout() {
        let mut table = AttributeTable::new();
        table.declare(0, layout(3, FLOAT, 0, 0));
        table.set_enabled(0, false);
        assert!(table.active_layout(0).is_none());
        assert!(table.slot(0).unwrap().layout.is_some());
        table.set_enabled(0, true);
        assert!(table.active_layout(0).is_some());
    }
}
