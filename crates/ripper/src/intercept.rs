//! Intercepted entry points and the hooks that keep shadow state in sync.
//!
//! The host adapter turns each call on a wrapped context into a [`GlCall`],
//! dispatches it through the [`HookTable`], then calls the real function
//! unless the hook returned [`HookOutcome::Suppress`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared::CaptureSettings;

use crate::backend::GlBackend;
use crate::capture::FrameCapture;
use crate::export::BatchExporter;
use crate::gl::{BufferId, ContextId, ProgramId, TextureId, ARRAY_BUFFER, TEXTURE_2D};
use crate::shadow::{AttributeLayout, BufferPayload, GraphicsContextShadow, Viewport};

/// Entry points the host adapter wraps on every recognized context.
pub const HOOKED_ENTRY_POINTS: &[&str] = &[
    "clear",
    "viewport",
    "bindBuffer",
    "bufferData",
    "bufferSubData",
    "createBuffer",
    "drawArrays",
    "drawElements",
    "drawElementsInstanced",
    "drawRangeElements",
    "drawBuffers",
    "linkProgram",
    "shaderSource",
    "vertexAttribPointer",
    "vertexAttribIPointer",
    "enableVertexAttribArray",
    "disableVertexAttribArray",
    "vertexAttribDivisor",
    "vertexAttribDivisorANGLE",
    "activeTexture",
    "bindTexture",
    "texImage2D",
    "createTexture",
];

/// One intercepted call with its decoded arguments.
///
/// `create*` calls carry the handle the real function returned; the
/// adapter forwards them first and dispatches afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum GlCall {
    Viewport {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    ActiveTexture {
        texture: u32,
    },
    #[serde(rename = "tex_image_2d")]
    TexImage2D {
        target: u32,
        #[serde(default)]
        level: i32,
        /// Known only when the upload revealed it
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
    },
    ShaderSource {
        shader: u32,
        source: String,
    },
    LinkProgram {
        program: ProgramId,
    },
    BindTexture {
        target: u32,
        texture: Option<TextureId>,
    },
    DrawArrays {
        mode: u32,
        first: i32,
        count: i32,
    },
    DrawElements {
        mode: u32,
        count: i32,
        #[serde(rename = "type")]
        index_type: u32,
        offset: i64,
    },
    DrawElementsInstanced {
        mode: u32,
        count: i32,
        #[serde(rename = "type")]
        index_type: u32,
        offset: i64,
        instance_count: i32,
    },
    DrawRangeElements {
        mode: u32,
        start: u32,
        end: u32,
        count: i32,
        #[serde(rename = "type")]
        index_type: u32,
        offset: i64,
    },
    DrawBuffers {
        buffers: Vec<u32>,
    },
    BindBuffer {
        target: u32,
        buffer: Option<BufferId>,
    },
    BufferData {
        target: u32,
        data: BufferPayload,
        #[serde(default)]
        usage: u32,
    },
    BufferSubData {
        target: u32,
        offset: usize,
        data: BufferPayload,
    },
    EnableVertexAttribArray {
        index: u32,
    },
    DisableVertexAttribArray {
        index: u32,
    },
    VertexAttribPointer {
        index: u32,
        size: u32,
        #[serde(rename = "type")]
        ty: u32,
        #[serde(default)]
        normalized: bool,
        #[serde(default)]
        stride: u32,
        #[serde(default)]
        offset: u32,
    },
    VertexAttribIPointer {
        index: u32,
        size: u32,
        #[serde(rename = "type")]
        ty: u32,
        #[serde(default)]
        stride: u32,
        #[serde(default)]
        offset: u32,
    },
    VertexAttribDivisor {
        index: u32,
        divisor: u32,
    },
    CreateTexture {
        texture: TextureId,
    },
    CreateBuffer {
        buffer: BufferId,
    },
    Clear {
        #[serde(default)]
        mask: u32,
    },
    /// Any other wrapped entry point
    Other {
        entry_point: String,
    },
}

impl GlCall {
    /// Name of the API function this call came from.
    pub fn entry_point(&self) -> &str {
        match self {
            GlCall::Viewport { .. } => "viewport",
            GlCall::ActiveTexture { .. } => "activeTexture",
            GlCall::TexImage2D { .. } => "texImage2D",
            GlCall::ShaderSource { .. } => "shaderSource",
            GlCall::LinkProgram { .. } => "linkProgram",
            GlCall::BindTexture { .. } => "bindTexture",
            GlCall::DrawArrays { .. } => "drawArrays",
            GlCall::DrawElements { .. } => "drawElements",
            GlCall::DrawElementsInstanced { .. } => "drawElementsInstanced",
            GlCall::DrawRangeElements { .. } => "drawRangeElements",
            GlCall::DrawBuffers { .. } => "drawBuffers",
            GlCall::BindBuffer { .. } => "bindBuffer",
            GlCall::BufferData { .. } => "bufferData",
            GlCall::BufferSubData { .. } => "bufferSubData",
            GlCall::EnableVertexAttribArray { .. } => "enableVertexAttribArray",
            GlCall::DisableVertexAttribArray { .. } => "disableVertexAttribArray",
            GlCall::VertexAttribPointer { .. } => "vertexAttribPointer",
            GlCall::VertexAttribIPointer { .. } => "vertexAttribIPointer",
            GlCall::VertexAttribDivisor { .. } => "vertexAttribDivisor",
            GlCall::CreateTexture { .. } => "createTexture",
            GlCall::CreateBuffer { .. } => "createBuffer",
            GlCall::Clear { .. } => "clear",
            GlCall::Other { entry_point } => entry_point,
        }
    }
}

/// What the adapter does with the real call after the hook ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookOutcome {
    /// Forward to the original function
    #[default]
    PassThrough,
    /// The hook already executed the real call
    Suppress,
}

/// Everything a hook may touch for one call.
pub struct HookCtx<'a, B: ?Sized> {
    pub context: ContextId,
    pub shadow: &'a mut GraphicsContextShadow,
    pub capture: &'a mut FrameCapture,
    pub backend: &'a mut B,
    pub settings: &'a CaptureSettings,
    /// Session-wide capture trigger
    pub armed: &'a mut bool,
    pub exporter: &'a mut dyn BatchExporter,
}

pub type Hook<B> = fn(&mut HookCtx<'_, B>, &GlCall) -> HookOutcome;

/// Entry point name → hook.
pub struct HookTable<B> {
    hooks: HashMap<&'static str, Hook<B>>,
}

impl<B: GlBackend> Default for HookTable<B> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<B: GlBackend> HookTable<B> {
    /// Table without any hooks; every call is only observed.
    pub fn empty() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        table.register("clear", on_clear);
        table.register("viewport", on_viewport);
        table.register("activeTexture", on_active_texture);
        table.register("texImage2D", on_tex_image_2d);
        table.register("linkProgram", on_link_program);
        table.register("bindTexture", on_bind_texture);
        table.register("createTexture", on_create_texture);
        table.register("bindBuffer", on_bind_buffer);
        table.register("createBuffer", on_create_buffer);
        table.register("bufferData", on_buffer_data);
        table.register("bufferSubData", on_buffer_sub_data);
        table.register("enableVertexAttribArray", on_toggle_attribute);
        table.register("disableVertexAttribArray", on_toggle_attribute);
        table.register("vertexAttribPointer", on_attribute_pointer);
        table.register("vertexAttribIPointer", on_attribute_pointer);
        table.register("drawArrays", on_draw_arrays);
        table.register("drawElements", on_draw_elements);
        table.register("drawElementsInstanced", on_draw_elements);
        table.register("drawRangeElements", on_informational_draw);
        table.register("drawBuffers", on_informational_draw);
        table
    }

    /// Install or replace the hook for an entry point.
    pub fn register(&mut self, entry_point: &'static str, hook: Hook<B>) {
        self.hooks.insert(entry_point, hook);
    }

    pub fn has_hook(&self, entry_point: &str) -> bool {
        self.hooks.contains_key(entry_point)
    }

    pub fn dispatch(&self, ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
        match self.hooks.get(call.entry_point()) {
            Some(hook) => hook(ctx, call),
            None => observe(ctx, call),
        }
    }
}

/// Fallback for entry points without behavior.
fn observe<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    tracing::trace!(context = ?ctx.context, entry_point = call.entry_point(), "observed");
    HookOutcome::PassThrough
}

// ── Frame boundary ───────────────────────────────────────────

fn on_clear<B: GlBackend>(ctx: &mut HookCtx<'_, B>, _call: &GlCall) -> HookOutcome {
    ctx.capture.on_frame_boundary(
        ctx.context,
        ctx.shadow,
        ctx.armed,
        ctx.settings,
        &mut *ctx.exporter,
    );
    HookOutcome::PassThrough
}

// ── Viewport / textures / programs ───────────────────────────

fn on_viewport<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::Viewport {
        x,
        y,
        width,
        height,
    } = *call
    {
        ctx.shadow.viewport = Viewport {
            x,
            y,
            width,
            height,
        };
    }
    HookOutcome::PassThrough
}

fn on_active_texture<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::ActiveTexture { texture } = *call {
        ctx.shadow.set_active_texture(texture);
    }
    HookOutcome::PassThrough
}

fn on_tex_image_2d<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::TexImage2D {
        target,
        level,
        width,
        height,
    } = *call
    {
        if target == TEXTURE_2D {
            ctx.shadow.record_texture_image(level, width, height);
        }
    }
    HookOutcome::PassThrough
}

fn on_link_program<B: GlBackend>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::LinkProgram { program } = *call {
        if ctx.settings.shader_readback {
            ctx.backend.prepare_readback(program);
            tracing::debug!(?program, "requested gl_Position capture");
        }
    }
    HookOutcome::PassThrough
}

fn on_bind_texture<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::BindTexture {
        target: TEXTURE_2D,
        texture: Some(texture),
    } = *call
    {
        ctx.shadow.bind_texture_2d(texture);
    }
    HookOutcome::PassThrough
}

fn on_create_texture<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::CreateTexture { texture } = *call {
        ctx.shadow.create_texture(texture);
    }
    HookOutcome::PassThrough
}

// ── Buffers / attributes ─────────────────────────────────────

fn on_bind_buffer<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::BindBuffer { target, buffer } = *call {
        ctx.shadow.buffers.bind(target, buffer);
    }
    HookOutcome::PassThrough
}

fn on_create_buffer<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::CreateBuffer { buffer } = *call {
        ctx.shadow.buffers.create(buffer);
    }
    HookOutcome::PassThrough
}

fn on_buffer_data<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::BufferData { target, data, .. } = call {
        if let Err(skip) = ctx.shadow.buffers.upload(*target, data) {
            tracing::debug!(target, ?skip, "bufferData ignored");
        }
    }
    HookOutcome::PassThrough
}

fn on_buffer_sub_data<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if let GlCall::BufferSubData {
        target,
        offset,
        data,
    } = call
    {
        if let Err(skip) = ctx.shadow.buffers.upload_sub(*target, *offset, data) {
            tracing::debug!(target, ?skip, "bufferSubData ignored");
        }
    }
    HookOutcome::PassThrough
}

fn on_toggle_attribute<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    match *call {
        GlCall::EnableVertexAttribArray { index } => ctx.shadow.attributes.set_enabled(index, true),
        GlCall::DisableVertexAttribArray { index } => {
            ctx.shadow.attributes.set_enabled(index, false)
        }
        _ => {}
    }
    HookOutcome::PassThrough
}

fn on_attribute_pointer<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    let (index, size, ty, normalized, stride, offset) = match *call {
        GlCall::VertexAttribPointer {
            index,
            size,
            ty,
            normalized,
            stride,
            offset,
        } => (index, size, ty, normalized, stride, offset),
        GlCall::VertexAttribIPointer {
            index,
            size,
            ty,
            stride,
            offset,
        } => (index, size, ty, false, stride, offset),
        _ => return HookOutcome::PassThrough,
    };
    let buffer = ctx.shadow.buffers.bound(ARRAY_BUFFER);
    ctx.shadow.attributes.declare(
        index,
        AttributeLayout {
            size,
            ty,
            stride,
            offset,
            normalized,
            buffer,
        },
    );
    HookOutcome::PassThrough
}

// ── Draws ────────────────────────────────────────────────────

fn on_draw_arrays<B: GlBackend>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    let GlCall::DrawArrays { mode, first, count } = *call else {
        return HookOutcome::PassThrough;
    };
    ctx.capture
        .capture_draw_arrays(ctx.shadow, ctx.backend, ctx.settings, mode, first, count)
}

fn on_draw_elements<B: GlBackend>(
    ctx: &mut HookCtx<'_, B>,
    call: &GlCall,
) -> HookOutcome {
    let (mode, count, index_type, offset) = match *call {
        GlCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
        } => (mode, count, index_type, offset),
        GlCall::DrawElementsInstanced {
            mode,
            count,
            index_type,
            offset,
            instance_count,
        } => {
            if ctx.capture.is_capturing() {
                tracing::debug!(instance_count, "instanced draw captured as a single instance");
            }
            (mode, count, index_type, offset)
        }
        _ => return HookOutcome::PassThrough,
    };
    ctx.capture.capture_draw_elements(
        ctx.shadow,
        ctx.backend,
        ctx.settings,
        mode,
        count,
        index_type,
        offset,
    )
}

fn on_informational_draw<B>(ctx: &mut HookCtx<'_, B>, call: &GlCall) -> HookOutcome {
    if ctx.capture.is_capturing() {
        tracing::debug!(entry_point = call.entry_point(), ?call, "unsupported draw not captured");
    }
    HookOutcome::PassThrough
}
