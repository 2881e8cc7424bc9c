//! [`GlBackend`] over a live WebGL context.
//!
//! Calls go through the context object itself. While the engine is
//! dispatching, the hooked entry points detect the re-entry and forward
//! straight to the real functions, so nothing here is observed twice.

use std::rc::Rc;

use glripper::backend::{ActiveAttribute, ActiveUniform, GlBackend, ReadbackDraw};
use glripper::gl::{ProgramId, TextureId, ARRAY_BUFFER, TEXTURE_2D, TRIANGLES, UNSIGNED_BYTE};
use js_sys::{Array, Float32Array, Function, Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};

use crate::handles::Handles;

const CURRENT_PROGRAM: u32 = 0x8B8D;
const ACTIVE_UNIFORMS: u32 = 0x8B86;
const ACTIVE_ATTRIBUTES: u32 = 0x8B89;
const FRAMEBUFFER: u32 = 0x8D40;
const FRAMEBUFFER_BINDING: u32 = 0x8CA6;
const FRAMEBUFFER_COMPLETE: u32 = 0x8CD5;
const COLOR_ATTACHMENT0: u32 = 0x8CE0;
const RGBA: u32 = 0x1908;
const ARRAY_BUFFER_BINDING: u32 = 0x8894;
const STATIC_DRAW: u32 = 0x88E4;
const POINTS: u32 = 0x0000;
const RASTERIZER_DISCARD: u32 = 0x8C89;
const TRANSFORM_FEEDBACK: u32 = 0x8E22;
const TRANSFORM_FEEDBACK_BUFFER: u32 = 0x8C8E;
const SEPARATE_ATTRIBS: u32 = 0x8C8D;

pub struct WasmBackend {
    gl: JsValue,
    handles: Rc<Handles>,
}

impl WasmBackend {
    pub fn new(gl: JsValue, handles: Rc<Handles>) -> Self {
        Self { gl, handles }
    }

    /// `gl[method](...args)`; `None` when the method is missing or throws.
    fn call(&self, method: &str, args: &[JsValue]) -> Option<JsValue> {
        let function = Reflect::get(&self.gl, &JsValue::from_str(method))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        let args: Array = args.iter().collect();
        match function.apply(&self.gl, &args) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(method, error = ?e, "context call threw");
                None
            }
        }
    }

    fn num(value: u32) -> JsValue {
        JsValue::from(value)
    }

    fn parameter(&self, pname: u32) -> JsValue {
        self.call("getParameter", &[Self::num(pname)])
            .unwrap_or(JsValue::NULL)
    }

    fn current_program(&self) -> Option<JsValue> {
        let program = self.parameter(CURRENT_PROGRAM);
        (!program.is_null() && !program.is_undefined()).then_some(program)
    }

    /// `{name, type}` records from `getActiveAttrib` / `getActiveUniform`.
    fn active_infos(&self, count_pname: u32, getter: &str) -> Vec<(JsValue, String, u32)> {
        let Some(program) = self.current_program() else {
            return Vec::new();
        };
        let count = self
            .call("getProgramParameter", &[program.clone(), Self::num(count_pname)])
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as u32;

        (0..count)
            .filter_map(|i| {
                let info = self.call(getter, &[program.clone(), Self::num(i)])?;
                if info.is_null() {
                    return None;
                }
                let name = Reflect::get(&info, &JsValue::from_str("name")).ok()?.as_string()?;
                let ty = Reflect::get(&info, &JsValue::from_str("type")).ok()?.as_f64()? as u32;
                Some((program.clone(), name, ty))
            })
            .collect()
    }

    fn uniform_value(&self, name: &str) -> Option<JsValue> {
        let program = self.current_program()?;
        let location = self.call("getUniformLocation", &[program.clone(), JsValue::from_str(name)])?;
        if location.is_null() {
            return None;
        }
        self.call("getUniform", &[program, location])
    }

    /// Transform feedback pass capturing `gl_Position` for `count` vertices.
    fn capture_positions(&self, primitive: u32, draw: &ReadbackDraw, discard: bool) -> Option<Vec<f32>> {
        let byte_len = draw.capacity as u32 * 4;
        let previous = self.parameter(ARRAY_BUFFER_BINDING);

        let buffer = self.call("createBuffer", &[])?;
        self.call("bindBuffer", &[Self::num(ARRAY_BUFFER), buffer.clone()]);
        self.call("bufferData", &[Self::num(ARRAY_BUFFER), Self::num(byte_len), Self::num(STATIC_DRAW)]);
        self.call("bindBuffer", &[Self::num(ARRAY_BUFFER), JsValue::NULL]);

        let feedback = self.call("createTransformFeedback", &[])?;
        self.call("bindTransformFeedback", &[Self::num(TRANSFORM_FEEDBACK), feedback.clone()]);
        self.call("bindBufferBase", &[Self::num(TRANSFORM_FEEDBACK_BUFFER), Self::num(0), buffer.clone()]);
        if discard {
            self.call("enable", &[Self::num(RASTERIZER_DISCARD)]);
        }

        self.call("beginTransformFeedback", &[Self::num(primitive)]);
        self.call(
            "drawArrays",
            &[Self::num(primitive), JsValue::from(draw.first), JsValue::from(draw.count)],
        );
        self.call("endTransformFeedback", &[]);

        if discard {
            self.call("disable", &[Self::num(RASTERIZER_DISCARD)]);
        }
        self.call("bindBufferBase", &[Self::num(TRANSFORM_FEEDBACK_BUFFER), Self::num(0), JsValue::NULL]);
        self.call("bindTransformFeedback", &[Self::num(TRANSFORM_FEEDBACK), JsValue::NULL]);

        let out = Float32Array::new_with_length(draw.capacity as u32);
        self.call("bindBuffer", &[Self::num(ARRAY_BUFFER), buffer.clone()]);
        let read = self.call("getBufferSubData", &[Self::num(ARRAY_BUFFER), Self::num(0), out.clone().into()]);
        self.call("bindBuffer", &[Self::num(ARRAY_BUFFER), previous]);

        self.call("deleteTransformFeedback", &[feedback]);
        self.call("deleteBuffer", &[buffer]);

        // The draw has run at this point, so a failed read still reports Some.
        if read.is_none() {
            tracing::warn!("transform feedback buffer could not be read");
        }
        Some(out.to_vec())
    }
}

impl GlBackend for WasmBackend {
    fn active_attributes(&self) -> Vec<ActiveAttribute> {
        self.active_infos(ACTIVE_ATTRIBUTES, "getActiveAttrib")
            .into_iter()
            .map(|(program, name, _)| {
                let location = self
                    .call("getAttribLocation", &[program, JsValue::from_str(&name)])
                    .and_then(|v| v.as_f64())
                    .unwrap_or(-1.0) as i32;
                ActiveAttribute { name, location }
            })
            .collect()
    }

    fn active_uniforms(&self) -> Vec<ActiveUniform> {
        self.active_infos(ACTIVE_UNIFORMS, "getActiveUniform")
            .into_iter()
            .map(|(_, name, ty)| ActiveUniform { name, ty })
            .collect()
    }

    fn uniform_int(&self, name: &str) -> Option<i32> {
        self.uniform_value(name)?.as_f64().map(|v| v as i32)
    }

    fn uniform_mat4(&self, name: &str) -> Option<[f32; 16]> {
        let value = self.uniform_value(name)?.dyn_into::<Float32Array>().ok()?;
        value.to_vec().try_into().ok()
    }

    fn read_texture_rgba(&mut self, texture: TextureId, width: u32, height: u32) -> Option<Vec<u8>> {
        let object = self.handles.object(texture.0)?;
        let previous = self.parameter(FRAMEBUFFER_BINDING);
        let framebuffer = self.call("createFramebuffer", &[])?;

        self.call("bindFramebuffer", &[Self::num(FRAMEBUFFER), framebuffer.clone()]);
        self.call(
            "framebufferTexture2D",
            &[
                Self::num(FRAMEBUFFER),
                Self::num(COLOR_ATTACHMENT0),
                Self::num(TEXTURE_2D),
                object,
                Self::num(0),
            ],
        );
        let complete = self
            .call("checkFramebufferStatus", &[Self::num(FRAMEBUFFER)])
            .and_then(|v| v.as_f64())
            .map(|status| status as u32 == FRAMEBUFFER_COMPLETE)
            .unwrap_or(false);

        let pixels = complete.then(|| {
            let pixels = Uint8Array::new_with_length(width * height * 4);
            self.call(
                "readPixels",
                &[
                    Self::num(0),
                    Self::num(0),
                    Self::num(width),
                    Self::num(height),
                    Self::num(RGBA),
                    Self::num(UNSIGNED_BYTE),
                    pixels.clone().into(),
                ],
            )
            .map(|_| pixels.to_vec())
        });

        self.call("bindFramebuffer", &[Self::num(FRAMEBUFFER), previous]);
        self.call("deleteFramebuffer", &[framebuffer]);
        pixels.flatten()
    }

    fn prepare_readback(&mut self, program: ProgramId) {
        let Some(object) = self.handles.object(program.0) else {
            return;
        };
        let varyings: Array = std::iter::once(JsValue::from_str("gl_Position")).collect();
        if self
            .call(
                "transformFeedbackVaryings",
                &[object, varyings.into(), Self::num(SEPARATE_ATTRIBS)],
            )
            .is_none()
        {
            tracing::warn!(?program, "transform feedback unavailable on this context");
        }
    }

    fn readback_positions(&mut self, draw: ReadbackDraw) -> Option<Vec<f32>> {
        if (draw.count.max(0) as usize) * 4 > draw.capacity {
            tracing::debug!(count = draw.count, capacity = draw.capacity, "readback larger than vertex data");
            return None;
        }
        if draw.mode == TRIANGLES {
            // The capturing draw is the real draw.
            return self.capture_positions(TRIANGLES, &draw, false);
        }

        // Feedback needs the draw mode to match its primitive, so other
        // topologies capture as points with rasterization off, then draw for real.
        let positions = self.capture_positions(POINTS, &draw, true);
        positions.as_ref()?;
        self.call(
            "drawArrays",
            &[Self::num(draw.mode), JsValue::from(draw.first), JsValue::from(draw.count)],
        );
        positions
    }
}
