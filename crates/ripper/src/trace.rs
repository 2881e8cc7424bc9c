//! Recorded call traces and the scripted context they replay against.
//!
//! A trace is a JSON document: the programs and textures the live context
//! would report, followed by an ordered event list (context creation,
//! `useProgram`, intercepted calls, key presses). Replaying it drives the
//! same session code the browser adapter uses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared::CaptureSettings;

use crate::backend::{ActiveAttribute, ActiveUniform, GlBackend, ReadbackDraw};
use crate::error::Result;
use crate::gl::{ContextId, ProgramId, TextureId, FLOAT_MAT4, INT, SAMPLER_2D};
use crate::intercept::{GlCall, HookOutcome};
use crate::session::{Installation, Session};

/// Uniform of a scripted program, with its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UniformScript {
    Sampler2d { name: String, unit: i32 },
    Mat4 { name: String, value: [f32; 16] },
    Int { name: String, value: i32 },
}

impl UniformScript {
    pub fn sampler(name: &str, unit: i32) -> Self {
        UniformScript::Sampler2d {
            name: name.to_string(),
            unit,
        }
    }

    pub fn mat4(name: &str, value: [f32; 16]) -> Self {
        UniformScript::Mat4 {
            name: name.to_string(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UniformScript::Sampler2d { name, .. }
            | UniformScript::Mat4 { name, .. }
            | UniformScript::Int { name, .. } => name,
        }
    }

    fn gl_type(&self) -> u32 {
        match self {
            UniformScript::Sampler2d { .. } => SAMPLER_2D,
            UniformScript::Mat4 { .. } => FLOAT_MAT4,
            UniformScript::Int { .. } => INT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramScript {
    pub id: ProgramId,
    #[serde(default)]
    pub attributes: Vec<ActiveAttribute>,
    #[serde(default)]
    pub uniforms: Vec<UniformScript>,
}

/// Pixel source for a texture: one solid color, or unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureScript {
    pub id: TextureId,
    #[serde(default)]
    pub fill: [u8; 4],
    /// Framebuffer attachment fails the completeness check
    #[serde(default)]
    pub incomplete: bool,
}

impl TextureScript {
    pub fn solid(id: TextureId, fill: [u8; 4]) -> Self {
        Self {
            id,
            fill,
            incomplete: false,
        }
    }

    pub fn incomplete(id: TextureId) -> Self {
        Self {
            id,
            fill: [0; 4],
            incomplete: true,
        }
    }
}

/// Headless [`GlBackend`] answering from scripted programs and textures.
#[derive(Debug, Clone, Default)]
pub struct ScriptedContext {
    programs: HashMap<ProgramId, ProgramScript>,
    current: Option<ProgramId>,
    textures: HashMap<TextureId, TextureScript>,
    readback: Option<Vec<f32>>,
    texture_reads: Vec<(TextureId, u32, u32)>,
    readback_draws: Vec<ReadbackDraw>,
    prepared: Vec<ProgramId>,
}

impl ScriptedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_program(&mut self, program: ProgramScript) {
        self.programs.insert(program.id, program);
    }

    pub fn define_texture(&mut self, texture: TextureScript) {
        self.textures.insert(texture.id, texture);
    }

    /// Vertex output returned by every readback draw.
    pub fn set_readback(&mut self, xyzw: Vec<f32>) {
        self.readback = Some(xyzw);
    }

    pub fn use_program(&mut self, program: Option<ProgramId>) {
        self.current = program;
    }

    pub fn texture_reads(&self) -> usize {
        self.texture_reads.len()
    }

    pub fn last_texture_read(&self) -> Option<(TextureId, u32, u32)> {
        self.texture_reads.last().copied()
    }

    pub fn readback_draws(&self) -> &[ReadbackDraw] {
        &self.readback_draws
    }

    pub fn prepared_programs(&self) -> &[ProgramId] {
        &self.prepared
    }

    fn current_program(&self) -> Option<&ProgramScript> {
        self.current.and_then(|id| self.programs.get(&id))
    }

    fn uniform(&self, name: &str) -> Option<&UniformScript> {
        self.current_program()?
            .uniforms
            .iter()
            .find(|u| u.name() == name)
    }
}

impl GlBackend for ScriptedContext {
    fn active_attributes(&self) -> Vec<ActiveAttribute> {
        self.current_program()
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&self) -> Vec<ActiveUniform> {
        self.current_program()
            .map(|p| {
                p.uniforms
                    .iter()
                    .map(|u| ActiveUniform {
                        name: u.name().to_string(),
                        ty: u.gl_type(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn uniform_int(&self, name: &str) -> Option<i32> {
        match self.uniform(name)? {
            UniformScript::Sampler2d { unit, .. } => Some(*unit),
            UniformScript::Int { value, .. } => Some(*value),
            UniformScript::Mat4 { .. } => None,
        }
    }

    fn uniform_mat4(&self, name: &str) -> Option<[f32; 16]> {
        match self.uniform(name)? {
            UniformScript::Mat4 { value, .. } => Some(*value),
            _ => None,
        }
    }

    fn read_texture_rgba(&mut self, texture: TextureId, width: u32, height: u32) -> Option<Vec<u8>> {
        self.texture_reads.push((texture, width, height));
        let script = self.textures.get(&texture)?;
        if script.incomplete {
            return None;
        }
        Some(script.fill.repeat(width as usize * height as usize))
    }

    fn prepare_readback(&mut self, program: ProgramId) {
        self.prepared.push(program);
    }

    fn readback_positions(&mut self, draw: ReadbackDraw) -> Option<Vec<f32>> {
        self.readback_draws.push(draw);
        self.readback.clone()
    }
}

/// One step of a trace. `host` identifies the host context object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    CreateContext {
        host: u64,
        kind: String,
    },
    UseProgram {
        host: u64,
        program: Option<ProgramId>,
    },
    Call {
        host: u64,
        gl: GlCall,
    },
    KeyPress {
        key_code: u32,
        #[serde(default)]
        shift: bool,
    },
    UpdateSettings {
        settings: CaptureSettings,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    /// Overrides the settings the session was started with
    #[serde(default)]
    pub settings: Option<CaptureSettings>,
    #[serde(default)]
    pub programs: Vec<ProgramScript>,
    #[serde(default)]
    pub textures: Vec<TextureScript>,
    /// Vertex output for readback draws, xyzw per vertex
    #[serde(default)]
    pub readback: Option<Vec<f32>>,
    pub events: Vec<TraceEvent>,
}

impl Trace {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Backend every context created by this trace starts from.
    fn template(&self) -> ScriptedContext {
        let mut ctx = ScriptedContext::new();
        for program in &self.programs {
            ctx.define_program(program.clone());
        }
        for texture in &self.textures {
            ctx.define_texture(texture.clone());
        }
        if let Some(readback) = &self.readback {
            ctx.set_readback(readback.clone());
        }
        ctx
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub contexts: usize,
    pub calls: usize,
    pub suppressed: usize,
}

/// Feed a trace through `session`.
pub fn replay(trace: &Trace, session: &mut Session<ScriptedContext>) -> ReplaySummary {
    let template = trace.template();
    let mut contexts: HashMap<u64, (ContextId, ScriptedContext)> = HashMap::new();
    let mut summary = ReplaySummary::default();

    for event in &trace.events {
        match event {
            TraceEvent::CreateContext { host, kind } => {
                if let Some(Installation::New(id)) = session.install_context(*host, kind) {
                    contexts.insert(*host, (id, template.clone()));
                    summary.contexts += 1;
                }
            }
            TraceEvent::UseProgram { host, program } => match contexts.get_mut(host) {
                Some((_, backend)) => backend.use_program(*program),
                None => tracing::debug!(host, "useProgram on unhooked context"),
            },
            TraceEvent::Call { host, gl } => {
                let Some((id, backend)) = contexts.get_mut(host) else {
                    tracing::debug!(host, entry_point = gl.entry_point(), "call on unhooked context");
                    continue;
                };
                summary.calls += 1;
                if session.dispatch(*id, backend, gl) == HookOutcome::Suppress {
                    summary.suppressed += 1;
                }
            }
            TraceEvent::KeyPress { key_code, shift } => {
                session.on_key(*key_code, *shift);
            }
            TraceEvent::UpdateSettings { settings } => {
                session.config_mut().update(settings.clone());
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_parse() {
        let json = r#"{
            "programs": [{
                "id": 1,
                "attributes": [{"name": "position", "location": 0}],
                "uniforms": [
                    {"type": "sampler2d", "name": "map", "unit": 0},
                    {"type": "mat4", "name": "modelMatrix", "value": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1]}
                ]
            }],
            "textures": [{"id": 3, "fill": [255, 0, 0, 255]}],
            "events": [
                {"event": "create_context", "host": 1, "kind": "webgl"},
                {"event": "use_program", "host": 1, "program": 1},
                {"event": "key_press", "key_code": 45},
                {"event": "call", "host": 1, "gl": {"call": "clear", "mask": 16384}}
            ]
        }"#;
        let trace = Trace::from_json(json).unwrap();
        assert_eq!(trace.programs[0].uniforms.len(), 2);
        assert_eq!(trace.events.len(), 4);
        assert!(matches!(
            trace.events[3],
            TraceEvent::Call { host: 1, gl: GlCall::Clear { mask: 16384 } }
        ));
    }

    #[test]
    fn test_scripted_uniforms() {
        let mut ctx = ScriptedContext::new();
        ctx.define_program(ProgramScript {
            id: ProgramId(2),
            attributes: vec![],
            uniforms: vec![UniformScript::sampler("map", 3)],
        });
        assert!(ctx.active_uniforms().is_empty());

        ctx.use_program(Some(ProgramId(2)));
        assert_eq!(ctx.active_uniforms()[0].ty, SAMPLER_2D);
        assert_eq!(ctx.uniform_int("map"), Some(3));
        assert_eq!(ctx.uniform_mat4("map"), None);
        assert_eq!(ctx.uniform_int("missing"), None);
    }

    #[test]
    fn test_scripted_texture_read() {
        let mut ctx = ScriptedContext::new();
        ctx.define_texture(TextureScript::solid(TextureId(1), [1, 2, 3, 4]));
        assert_eq!(ctx.read_texture_rgba(TextureId(1), 2, 1), Some(vec![1, 2, 3, 4, 1, 2, 3, 4]));
        assert_eq!(ctx.read_texture_rgba(TextureId(9), 2, 1), None);
        assert_eq!(ctx.texture_reads(), 2);
    }
}
