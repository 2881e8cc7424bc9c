//! Settings file location for native hosts.

use std::path::{Path, PathBuf};

use shared::CaptureSettings;

use crate::error::Result;

/// `<config dir>/glripper/settings.json`, if the platform has a config dir.
pub fn default_settings_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "glripper", "glripper")
        .map(|dirs| dirs.config_dir().join("settings.json"))
}

/// Load settings from `path`, or from the default location.
///
/// An explicit path must exist and parse. A missing default file yields the
/// built-in defaults.
pub fn load_settings(path: Option<&Path>) -> Result<CaptureSettings> {
    if let Some(path) = path {
        let json = std::fs::read_to_string(path)?;
        return Ok(CaptureSettings::from_json(&json)?);
    }
    let Some(path) = default_settings_path() else {
        return Ok(CaptureSettings::default());
    };
    match std::fs::read_to_string(&path) {
        Ok(json) => Ok(CaptureSettings::from_json(&json)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CaptureSettings::default()),
        Err(e) => Err(e.into()),
    }
}

/// Write settings as pretty JSON, creating parent directories.
pub fn save_settings(path: &Path, settings: &CaptureSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RipperError;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = CaptureSettings {
            download_zip: true,
            export_pacing_ms: 10,
            ..Default::default()
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(Some(&path)).unwrap(), settings);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("missing.json"))).unwrap_err();
        assert!(matches!(err, RipperError::Io(_)));
    }

    #[test]
    fn test_browser_keys_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"should_download_zip": true, "is_debug_mode": true}"#).unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        assert!(settings.download_zip);
        assert!(settings.debug_logging);
    }
}
