//! What the engine needs from the real rendering context.
//!
//! Shadow state covers everything call arguments reveal. A few facts only
//! the live context knows (the current program's active attributes and
//! uniforms, uniform values, texture pixels, vertex stage output) are read
//! through this trait. Implementations must not route these calls back
//! through the hooks.

use serde::{Deserialize, Serialize};

use crate::gl::{ProgramId, TextureId};

/// Active vertex attribute of the current program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAttribute {
    pub name: String,
    /// Attribute slot, -1 when the attribute was optimized out
    pub location: i32,
}

/// Active uniform of the current program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    /// Raw GL type, e.g. `SAMPLER_2D`
    pub ty: u32,
}

/// Non-indexed draw to be re-run with vertex output capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadbackDraw {
    pub mode: u32,
    pub first: i32,
    pub count: i32,
    /// Floats needed to hold the captured xyzw of every input vertex
    pub capacity: usize,
}

pub trait GlBackend {
    /// Active attributes of the program in use; empty when none is bound.
    fn active_attributes(&self) -> Vec<ActiveAttribute>;

    /// Active uniforms of the program in use; empty when none is bound.
    fn active_uniforms(&self) -> Vec<ActiveUniform>;

    /// Integer value of a uniform (sampler unit) of the current program.
    fn uniform_int(&self, name: &str) -> Option<i32>;

    /// `mat4` value of a uniform of the current program, in GL order.
    fn uniform_mat4(&self, name: &str) -> Option<[f32; 16]>;

    /// Attach `texture` to an off-screen framebuffer and read `width * height`
    /// RGBA8 pixels. `None` when the attachment is not framebuffer-complete.
    fn read_texture_rgba(&mut self, texture: TextureId, width: u32, height: u32)
        -> Option<Vec<u8>>;

    /// Ask the program to expose `gl_Position` for vertex output capture.
    /// Called from `linkProgram` when shader readback is enabled.
    fn prepare_readback(&mut self, program: ProgramId);

    /// Execute the real draw with vertex output capture and rasterization
    /// disabled; returns xyzw per vertex. `None` means the capture could not
    /// be set up and the real draw has not run.
    fn readback_positions(&mut self, draw: ReadbackDraw) -> Option<Vec<f32>>;
}
