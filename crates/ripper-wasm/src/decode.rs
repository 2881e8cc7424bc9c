//! Decoding JS call arguments into [`GlCall`] values.

use glripper::gl::{BufferId, ProgramId, TextureId};
use glripper::shadow::BufferPayload;
use glripper::GlCall;
use js_sys::{Array, ArrayBuffer, Reflect, SharedArrayBuffer, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};

use crate::handles::Handles;

fn number(args: &Array, i: u32) -> Option<f64> {
    args.get(i).as_f64()
}

fn u32_arg(args: &Array, i: u32) -> u32 {
    number(args, i).map(|v| v.max(0.0) as u32).unwrap_or(0)
}

fn i32_arg(args: &Array, i: u32) -> i32 {
    number(args, i).map(|v| v as i32).unwrap_or(0)
}

fn i64_arg(args: &Array, i: u32) -> i64 {
    number(args, i).map(|v| v as i64).unwrap_or(0)
}

fn property(value: &JsValue, name: &str) -> Option<f64> {
    Reflect::get(value, &JsValue::from_str(name)).ok()?.as_f64()
}

/// Bytes of a typed array or `DataView`, optionally narrowed by an element
/// range (the WebGL2 `srcOffset` / `length` arguments).
fn view_bytes(view: &JsValue, elem_offset: Option<u32>, elem_len: Option<u32>) -> Option<Vec<u8>> {
    let buffer = Reflect::get(view, &JsValue::from_str("buffer")).ok()?;
    let byte_offset = property(view, "byteOffset")? as u32;
    let byte_length = property(view, "byteLength")? as u32;
    let elem_size = property(view, "BYTES_PER_ELEMENT").unwrap_or(1.0) as u32;

    let skip = elem_offset.unwrap_or(0).saturating_mul(elem_size).min(byte_length);
    let len = match elem_len {
        Some(n) if n > 0 => n.saturating_mul(elem_size).min(byte_length - skip),
        _ => byte_length - skip,
    };
    Some(Uint8Array::new_with_byte_offset_and_length(&buffer, byte_offset + skip, len).to_vec())
}

/// Data argument of `bufferData` / `bufferSubData`.
fn payload(args: &Array, data_index: u32, range_index: u32) -> BufferPayload {
    let data = args.get(data_index);
    if let Some(size) = data.as_f64() {
        return BufferPayload::Size(size.max(0.0) as usize);
    }
    if data.is_instance_of::<ArrayBuffer>() || data.is_instance_of::<SharedArrayBuffer>() {
        return BufferPayload::Bytes(Uint8Array::new(&data).to_vec());
    }
    if ArrayBuffer::is_view(&data) {
        let offset = number(args, range_index).map(|v| v as u32);
        let len = number(args, range_index + 1).map(|v| v as u32);
        if let Some(bytes) = view_bytes(&data, offset, len) {
            return BufferPayload::Bytes(bytes);
        }
    }
    BufferPayload::Unsupported
}

/// Size of a DOM pixel source (image, canvas, video, bitmap, ImageData).
fn source_size(source: &JsValue) -> Option<(u32, u32)> {
    if !source.is_object() || ArrayBuffer::is_view(source) {
        return None;
    }
    [("naturalWidth", "naturalHeight"), ("videoWidth", "videoHeight"), ("width", "height")]
        .iter()
        .filter_map(|(w, h)| Some((property(source, w)?, property(source, h)?)))
        .find(|(w, h)| *w > 0.0 && *h > 0.0)
        .map(|(w, h)| (w as u32, h as u32))
}

/// Decode one intercepted call. Unknown entry points become `Other`.
///
/// `create*` entry points are decoded from their return value with
/// [`decode_created`] instead.
pub fn decode_call(entry_point: &str, args: &Array, handles: &Handles) -> GlCall {
    match entry_point {
        "clear" => GlCall::Clear {
            mask: u32_arg(args, 0),
        },
        "viewport" => GlCall::Viewport {
            x: i32_arg(args, 0),
            y: i32_arg(args, 1),
            width: i32_arg(args, 2),
            height: i32_arg(args, 3),
        },
        "activeTexture" => GlCall::ActiveTexture {
            texture: u32_arg(args, 0),
        },
        "texImage2D" => {
            let (width, height) = if args.length() >= 8 {
                (Some(u32_arg(args, 3)), Some(u32_arg(args, 4)))
            } else if args.length() == 6 {
                let size = source_size(&args.get(5));
                (size.map(|s| s.0), size.map(|s| s.1))
            } else {
                (None, None)
            };
            GlCall::TexImage2D {
                target: u32_arg(args, 0),
                level: i32_arg(args, 1),
                width: width.filter(|w| *w > 0),
                height: height.filter(|h| *h > 0),
            }
        }
        "shaderSource" => GlCall::ShaderSource {
            shader: handles.id(&args.get(0)).unwrap_or(0),
            source: args.get(1).as_string().unwrap_or_default(),
        },
        "linkProgram" => GlCall::LinkProgram {
            program: ProgramId(handles.retain(&args.get(0)).unwrap_or(0)),
        },
        "bindTexture" => GlCall::BindTexture {
            target: u32_arg(args, 0),
            texture: handles.retain(&args.get(1)).map(TextureId),
        },
        "drawArrays" => GlCall::DrawArrays {
            mode: u32_arg(args, 0),
            first: i32_arg(args, 1),
            count: i32_arg(args, 2),
        },
        "drawElements" => GlCall::DrawElements {
            mode: u32_arg(args, 0),
            count: i32_arg(args, 1),
            index_type: u32_arg(args, 2),
            offset: i64_arg(args, 3),
        },
        "drawElementsInstanced" => GlCall::DrawElementsInstanced {
            mode: u32_arg(args, 0),
            count: i32_arg(args, 1),
            index_type: u32_arg(args, 2),
            offset: i64_arg(args, 3),
            instance_count: i32_arg(args, 4),
        },
        "drawRangeElements" => GlCall::DrawRangeElements {
            mode: u32_arg(args, 0),
            start: u32_arg(args, 1),
            end: u32_arg(args, 2),
            count: i32_arg(args, 3),
            index_type: u32_arg(args, 4),
            offset: i64_arg(args, 5),
        },
        "drawBuffers" => GlCall::DrawBuffers {
            buffers: args
                .get(0)
                .dyn_into::<Array>()
                .map(|list| list.iter().filter_map(|v| v.as_f64()).map(|v| v as u32).collect())
                .unwrap_or_default(),
        },
        "bindBuffer" => GlCall::BindBuffer {
            target: u32_arg(args, 0),
            buffer: handles.id(&args.get(1)).map(BufferId),
        },
        "bufferData" => GlCall::BufferData {
            target: u32_arg(args, 0),
            data: payload(args, 1, 3),
            usage: u32_arg(args, 2),
        },
        "bufferSubData" => GlCall::BufferSubData {
            target: u32_arg(args, 0),
            offset: u32_arg(args, 1) as usize,
            data: payload(args, 2, 3),
        },
        "enableVertexAttribArray" => GlCall::EnableVertexAttribArray {
            index: u32_arg(args, 0),
        },
        "disableVertexAttribArray" => GlCall::DisableVertexAttribArray {
            index: u32_arg(args, 0),
        },
        "vertexAttribPointer" => GlCall::VertexAttribPointer {
            index: u32_arg(args, 0),
            size: u32_arg(args, 1),
            ty: u32_arg(args, 2),
            normalized: args.get(3).is_truthy(),
            stride: u32_arg(args, 4),
            offset: u32_arg(args, 5),
        },
        "vertexAttribIPointer" => GlCall::VertexAttribIPointer {
            index: u32_arg(args, 0),
            size: u32_arg(args, 1),
            ty: u32_arg(args, 2),
            stride: u32_arg(args, 3),
            offset: u32_arg(args, 4),
        },
        "vertexAttribDivisor" | "vertexAttribDivisorANGLE" => GlCall::VertexAttribDivisor {
            index: u32_arg(args, 0),
            divisor: u32_arg(args, 1),
        },
        other => GlCall::Other {
            entry_point: other.to_string(),
        },
    }
}

/// Decode a `create*` call from the object the real function returned.
pub fn decode_created(entry_point: &str, created: &JsValue, handles: &Handles) -> Option<GlCall> {
    match entry_point {
        "createBuffer" => Some(GlCall::CreateBuffer {
            buffer: BufferId(handles.id(created)?),
        }),
        "createTexture" => Some(GlCall::CreateTexture {
            texture: TextureId(handles.retain(created)?),
        }),
        _ => None,
    }
}

/// Entry points whose hook runs after the real call.
pub fn is_create(entry_point: &str) -> bool {
    entry_point.starts_with("create")
}
