//! Capture settings

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::roles::RoleTables;

/// Fallback edge length when a resolution component does not parse.
pub const DEFAULT_TEXTURE_EDGE: u32 = 4096;

/// Insert key.
pub const DEFAULT_CAPTURE_KEY: u32 = 45;

/// Texture size used when the real size of a texture is unknown.
///
/// Stored as `"<width>x<height>"`, the format of the extension's option
/// page. Each component that fails to parse falls back to 4096.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TextureResolution {
    pub width: u32,
    pub height: u32,
}

impl TextureResolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse `"WxH"`, replacing missing or invalid parts with the default.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split('x');
        let mut component = || {
            parts
                .next()
                .and_then(|p| p.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_TEXTURE_EDGE)
        };
        let width = component();
        let height = component();
        Self { width, height }
    }
}

impl Default for TextureResolution {
    fn default() -> Self {
        Self::new(DEFAULT_TEXTURE_EDGE, DEFAULT_TEXTURE_EDGE)
    }
}

impl From<String> for TextureResolution {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<TextureResolution> for String {
    fn from(res: TextureResolution) -> Self {
        res.to_string()
    }
}

impl fmt::Display for TextureResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Everything the capture engine reads from the outside world.
///
/// Field aliases accept the key names the browser extension stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Size used when a texture's real size was never observed
    pub default_texture_res: TextureResolution,
    /// Re-run non-indexed draws with vertex output capture
    #[serde(alias = "do_shader_calc")]
    pub shader_readback: bool,
    /// Emit diagnostic logging for skipped work
    #[serde(alias = "is_debug_mode")]
    pub debug_logging: bool,
    /// Flip read-back texture rows (framebuffer origin is bottom-left)
    pub unflip_textures: bool,
    /// Apply `modelMatrix` / `world` uniforms to captured positions
    #[serde(alias = "do_model_view_matrix")]
    pub apply_model_matrix: bool,
    /// Package a batch into one zip instead of individual files
    #[serde(alias = "should_download_zip")]
    pub download_zip: bool,
    /// Key code that arms capture for the next frame
    pub capture_key_code: u32,
    /// Pause between export chunks, in milliseconds
    pub export_pacing_ms: u64,
    /// Assets written concurrently per chunk
    pub export_concurrency: usize,
    /// Attribute / sampler name tables
    pub roles: RoleTables,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            default_texture_res: TextureResolution::default(),
            shader_readback: false,
            debug_logging: false,
            unflip_textures: true,
            apply_model_matrix: true,
            download_zip: false,
            capture_key_code: DEFAULT_CAPTURE_KEY,
            export_pacing_ms: 500,
            export_concurrency: 1,
            roles: RoleTables::default(),
        }
    }
}

impl CaptureSettings {
    /// Parse settings from JSON; unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether a key event should arm capture.
    pub fn is_capture_key(&self, key_code: u32, shift: bool) -> bool {
        key_code == self.capture_key_code && !shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse() {
        assert_eq!(TextureResolution::parse("1024x512"), TextureResolution::new(1024, 512));
        assert_eq!(TextureResolution::parse(" 256 x 128 "), TextureResolution::new(256, 128));
    }

    #[test]
    fn test_resolution_parse_fallback() {
        assert_eq!(TextureResolution::parse("abcx512"), TextureResolution::new(4096, 512));
        assert_eq!(TextureResolution::parse("2048"), TextureResolution::new(2048, 4096));
        assert_eq!(TextureResolution::parse(""), TextureResolution::default());
        assert_eq!(TextureResolution::parse("0x0"), TextureResolution::default());
    }

    #[test]
    fn test_resolution_serde_as_string() {
        let json = serde_json::to_string(&TextureResolution::new(64, 32)).unwrap();
        assert_eq!(json, r#""64x32""#);
        let back: TextureResolution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TextureResolution::new(64, 32));
    }

    #[test]
    fn test_settings_from_extension_keys() {
        let json = r#"{
            "default_texture_res": "2048x1024",
            "do_shader_calc": true,
            "is_debug_mode": true,
            "unflip_textures": false,
            "do_model_view_matrix": false,
            "should_download_zip": true,
            "minimum_clears": 1
        }"#;
        let s = CaptureSettings::from_json(json).unwrap();
        assert_eq!(s.default_texture_res, TextureResolution::new(2048, 1024));
        assert!(s.shader_readback);
        assert!(s.debug_logging);
        assert!(!s.unflip_textures);
        assert!(!s.apply_model_matrix);
        assert!(s.download_zip);
        assert_eq!(s.capture_key_code, DEFAULT_CAPTURE_KEY);
    }

    #[test]
    fn test_settings_defaults_from_empty_object() {
        let s = CaptureSettings::from_json("{}").unwrap();
        assert_eq!(s, CaptureSettings::default());
        assert_eq!(s.export_pacing_ms, 500);
        assert_eq!(s.export_concurrency, 1);
    }

    #[test]
    fn test_capture_key_ignores_shift() {
        let s = CaptureSettings::default();
        assert!(s.is_capture_key(45, false));
        assert!(!s.is_capture_key(45, true));
        assert!(!s.is_capture_key(46, false));
    }
}
