// SPDX-License-Identifier: MIT OR Apache-2.0
//! Presentation settings.
//!
//! Settings are stored as RON and carry a format version. Files written by a
//! newer version are rejected instead of being partially read.

use crate::error::{Result, TimelineError};
use crate::Frame;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Default settings file name
pub const SETTINGS_FILE_NAME: &str = "presenter.ron";

const MIN_TRANSITION_TIME: f32 = 0.2;
const MAX_TRANSITION_TIME: f32 = 3600.0;

/// Settings shared by compilation, assembly and playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenterSettings {
    /// Format version
    pub version: u32,
    /// Frames per second of the master timeline
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Camera transition length in seconds
    #[serde(default = "default_transition_time")]
    pub transition_time: f32,
    /// Insert a camera transition gap between segments
    #[serde(default = "default_true")]
    pub interpolate_camera: bool,
    /// Base name for per-segment cameras
    #[serde(default = "default_camera_base_name")]
    pub camera_base_name: String,
    /// Name of the designated animation container
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// File name of the marker sidecar
    #[serde(default = "default_sidecar_file_name")]
    pub sidecar_file_name: String,
}

fn default_fps() -> u32 {
    24
}

fn default_transition_time() -> f32 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_camera_base_name() -> String {
    "=> CAMERA".to_string()
}

fn default_container_name() -> String {
    "Component".to_string()
}

fn default_sidecar_file_name() -> String {
    "markers.txt".to_string()
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            fps: default_fps(),
            transition_time: default_transition_time(),
            interpolate_camera: true,
            camera_base_name: default_camera_base_name(),
            container_name: default_container_name(),
            sidecar_file_name: default_sidecar_file_name(),
        }
    }
}

impl PresenterSettings {
    /// Gap in frames inserted before every segment but the first
    pub fn gap_frames(&self) -> Frame {
        if self.interpolate_camera {
            (self.fps as f32 * self.transition_time).ceil() as Frame
        } else {
            1
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(TimelineError::InvalidSettings("fps must be positive".into()));
        }
        if !(MIN_TRANSITION_TIME..=MAX_TRANSITION_TIME).contains(&self.transition_time) {
            return Err(TimelineError::InvalidSettings(format!(
                "transition_time {} outside {}..={} seconds",
                self.transition_time, MIN_TRANSITION_TIME, MAX_TRANSITION_TIME
            )));
        }
        if self.camera_base_name.is_empty() || self.container_name.is_empty() {
            return Err(TimelineError::InvalidSettings(
                "camera and container names must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: PresenterSettings = ron::from_str(&content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(TimelineError::InvalidSettings(format!(
                "settings version {} is newer than supported version {}",
                settings.version, SETTINGS_FORMAT_VERSION
            )));
        }

        settings.validate()?;
        tracing::debug!(?path, gap = settings.gap_frames(), "loaded presenter settings");
        Ok(settings)
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_frames() {
        let mut settings = PresenterSettings::default();
        assert_eq!(settings.gap_frames(), 48);

        settings.fps = 25;
        settings.transition_time = 0.3;
        assert_eq!(settings.gap_frames(), 8);

        settings.interpolate_camera = false;
        assert_eq!(settings.gap_frames(), 1);
    }

    #[test]
    fn test_validate_rejects_short_transition() {
        let settings = PresenterSettings {
            transition_time: 0.1,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(TimelineError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);

        let settings = PresenterSettings {
            fps: 30,
            camera_base_name: "Cam".to_string(),
            ..Default::default()
        };
        settings.save(&path).unwrap();

        let loaded = PresenterSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_future_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "(version: 99)").unwrap();

        assert!(PresenterSettings::load(&path).is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: PresenterSettings = ron::from_str("(version: 1, fps: 60)").unwrap();
        assert_eq!(settings.fps, 60);
        assert_eq!(settings.container_name, "Component");
        assert!(settings.interpolate_camera);
    }
}
