//! Sampler uniform → bound texture → PNG data URI.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use shared::{CaptureSettings, RoleTables};

use crate::backend::GlBackend;
use crate::error::Result;
use crate::gl::{TextureId, FLOAT_MAT4, MAX_TEXTURE_UNITS, SAMPLER_2D};
use crate::mesh::Texture;
use crate::shadow::GraphicsContextShadow;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Swap row `i` with row `height - 1 - i` of a tightly packed RGBA8 image.
pub fn flip_rows(pixels: &mut [u8], width: u32, height: u32) {
    let row = width as usize * 4;
    let height = height as usize;
    if row == 0 || pixels.len() < row * height {
        return;
    }
    for y in 0..height / 2 {
        let (top, bottom) = pixels.split_at_mut((height - 1 - y) * row);
        top[y * row..(y + 1) * row].swap_with_slice(&mut bottom[..row]);
    }
}

/// Encode RGBA8 pixels as a `data:image/png;base64,` URI.
pub fn encode_png_data_uri(pixels: &[u8], width: u32, height: u32) -> Result<String> {
    let mut png = Vec::new();
    PngEncoder::new(Cursor::new(&mut png)).write_image(
        pixels,
        width,
        height,
        ExtendedColorType::Rgba8,
    )?;
    Ok(format!(
        "{PNG_DATA_URI_PREFIX}{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    ))
}

/// Read a texture at its observed size (or the default), flipped if configured.
fn materialize<B: GlBackend + ?Sized>(
    shadow: &GraphicsContextShadow,
    backend: &mut B,
    texture: TextureId,
    settings: &CaptureSettings,
) -> Option<(Vec<u8>, u32, u32)> {
    let (width, height) = match shadow.texture_record(texture) {
        Some(record) => (
            record.width.unwrap_or(settings.default_texture_res.width),
            record.height.unwrap_or(settings.default_texture_res.height),
        ),
        None => (
            settings.default_texture_res.width,
            settings.default_texture_res.height,
        ),
    };

    let mut pixels = backend.read_texture_rgba(texture, width, height)?;
    if pixels.len() != width as usize * height as usize * 4 {
        tracing::debug!(?texture, got = pixels.len(), width, height, "short pixel read");
        return None;
    }
    if settings.unflip_textures {
        flip_rows(&mut pixels, width, height);
    }
    Some((pixels, width, height))
}

/// Textures feeding the current program's material samplers.
///
/// Each source texture is read at most once per batch; later draws that
/// sample it reuse the cached descriptor.
pub fn resolve_textures<B: GlBackend + ?Sized>(
    shadow: &mut GraphicsContextShadow,
    backend: &mut B,
    settings: &CaptureSettings,
) -> Vec<Arc<Texture>> {
    let mut textures = Vec::new();

    for uniform in backend.active_uniforms() {
        if uniform.ty != SAMPLER_2D {
            continue;
        }
        let Some(role) = settings.roles.classify_sampler(&uniform.name) else {
            tracing::debug!(name = %uniform.name, "not a known texture sampler");
            continue;
        };
        let Some(unit) = backend.uniform_int(&uniform.name) else {
            continue;
        };
        if unit < 0 || unit as u32 >= MAX_TEXTURE_UNITS {
            tracing::debug!(name = %uniform.name, unit, "sampler unit out of range");
            continue;
        }
        let Some(texture) = shadow.texture_in_unit(unit as u32) else {
            tracing::debug!(unit, "no texture bound to unit");
            continue;
        };

        if let Some(cached) = shadow.cached_texture(texture) {
            textures.push(cached);
            continue;
        }

        let Some((pixels, width, height)) = materialize(shadow, backend, texture, settings)
        else {
            tracing::debug!(?texture, "texture not readable");
            continue;
        };
        let url = match encode_png_data_uri(&pixels, width, height) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(?texture, "PNG encode failed: {e}");
                continue;
            }
        };

        let descriptor = Arc::new(Texture::new(uuid::Uuid::new_v4().to_string(), url, role));
        shadow.cache_texture(texture, descriptor.clone());
        tracing::debug!(?texture, unit, ?role, "resolved texture");
        textures.push(descriptor);
    }

    textures
}

/// Value of the model matrix uniform, if the current program has one.
/// When several names match, the last active one wins.
pub fn resolve_model_matrix<B: GlBackend + ?Sized>(
    backend: &B,
    roles: &RoleTables,
) -> Option<[f32; 16]> {
    backend
        .active_uniforms()
        .into_iter()
        .filter(|u| u.ty == FLOAT_MAT4 && roles.is_model_matrix(&u.name))
        .filter_map(|u| backend.uniform_mat4(&u.name))
        .last()
}
