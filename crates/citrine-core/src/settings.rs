use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] io::Error),

    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Session settings.
///
/// Missing JSON fields take their [`Default`] value, so partial settings files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Emulate the newer hardware revision (four application cores instead of two).
    pub is_new_3ds: bool,
    /// Prefer the JIT CPU engine. Falls back to the interpreter when the host has no JIT.
    pub use_cpu_jit: bool,
    pub enable_dsp_lle: bool,
    pub enable_dsp_lle_multithread: bool,
    pub sink_id: String,
    pub audio_device_id: String,
    pub enable_audio_stretching: bool,
    pub custom_textures: bool,
    pub preload_textures: bool,

    // Per-title compatibility flags. See `crate::title_overrides`.
    pub display_transfer_hack: bool,
    pub skip_slow_draw: bool,
    pub texture_load_hack: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            is_new_3ds: false,
            use_cpu_jit: true,
            enable_dsp_lle: false,
            enable_dsp_lle_multithread: false,
            sink_id: "auto".to_string(),
            audio_device_id: "auto".to_string(),
            enable_audio_stretching: true,
            custom_textures: false,
            preload_textures: false,
            display_transfer_hack: false,
            skip_slow_draw: false,
            texture_load_hack: true,
        }
    }
}

impl Settings {
    /// Defaults for the newer hardware revision.
    pub fn new_3ds() -> Self {
        Self {
            is_new_3ds: true,
            ..Self::default()
        }
    }

    /// Number of application cores the session builds.
    pub fn num_cores(&self) -> usize {
        if self.is_new_3ds {
            4
        } else {
            2
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = Settings::from_json_str(r#"{ "is_new_3ds": true, "sink_id": "null" }"#)
            .unwrap();
        assert_eq!(
            settings,
            Settings {
                is_new_3ds: true,
                sink_id: "null".to_string(),
                ..Settings::default()
            }
        );
        assert_eq!(settings.num_cores(), 4);
        assert_eq!(Settings::default().num_cores(), 2);
    }

    #[test]
    fn json_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            use_cpu_jit: false,
            enable_dsp_lle: true,
            ..Settings::new_3ds()
        };
        fs::write(&path, settings.to_json_pretty().unwrap()).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = Settings::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }
}
