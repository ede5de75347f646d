// SPDX-License-Identifier: MIT OR Apache-2.0
//! Presentation manifest.
//!
//! The manifest lists the segment sources of a presentation in play order.
//! After compilation each entry also records the container and camera the
//! compiler resolved, so segments can be looked up by camera later.

use ordoplay_presenter_timeline::SegmentDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current manifest format version
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Errors raised while reading or writing a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Manifest written by a newer version
    #[error("manifest version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest supported version
        supported: u32,
    },
}

/// One segment of the presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    /// Path of the raw segment source, relative to the manifest
    pub source_path: PathBuf,
    /// Container resolved by the last compile
    #[serde(default)]
    pub container_name: Option<String>,
    /// Camera resolved by the last compile
    #[serde(default)]
    pub camera_name: Option<String>,
}

/// Ordered list of segments making up a presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationManifest {
    /// Format version
    pub version: u32,
    /// Presentation name
    pub name: String,
    /// Settings file overriding the defaults, relative to the manifest
    #[serde(default)]
    pub settings: Option<PathBuf>,
    /// Segments in play order
    #[serde(default)]
    pub segments: Vec<SegmentEntry>,
}

impl PresentationManifest {
    /// Load a manifest from a RON file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: PresentationManifest = ron::from_str(&content)?;

        if manifest.version > MANIFEST_FORMAT_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: manifest.version,
                supported: MANIFEST_FORMAT_VERSION,
            });
        }

        tracing::info!(
            "Loaded manifest '{}' with {} segments",
            manifest.name,
            manifest.segments.len()
        );
        Ok(manifest)
    }

    /// Save the manifest to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Source paths resolved against the manifest directory
    pub fn source_paths(&self, base: &Path) -> Vec<PathBuf> {
        self.segments
            .iter()
            .map(|entry| resolve(base, &entry.source_path))
            .collect()
    }

    /// Settings path resolved against the manifest directory
    pub fn settings_path(&self, base: &Path) -> Option<PathBuf> {
        self.settings.as_deref().map(|p| resolve(base, p))
    }

    /// Record the container and camera of a compiled segment
    pub fn record_compiled(&mut self, index: usize, descriptor: SegmentDescriptor) {
        let Some(entry) = self.segments.get_mut(index) else {
            return;
        };
        tracing::debug!(
            source = %descriptor.source_path.display(),
            camera = %descriptor.camera_name,
            "recorded compiled segment"
        );
        entry.container_name = Some(descriptor.container_name);
        entry.camera_name = Some(descriptor.camera_name);
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.ron");

        let manifest = PresentationManifest {
            version: MANIFEST_FORMAT_VERSION,
            name: "Deck".into(),
            settings: Some(PathBuf::from("presenter.ron")),
            segments: vec![SegmentEntry {
                source_path: "intro.ron".into(),
                container_name: None,
                camera_name: None,
            }],
        };
        manifest.save(&path).unwrap();

        let loaded = PresentationManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(
            loaded.source_paths(dir.path()),
            vec![dir.path().join("intro.ron")]
        );
        assert_eq!(
            loaded.settings_path(dir.path()),
            Some(dir.path().join("presenter.ron"))
        );
    }

    #[test]
    fn test_record_compiled() {
        let mut manifest = PresentationManifest {
            version: MANIFEST_FORMAT_VERSION,
            name: "Deck".into(),
            settings: None,
            segments: vec![SegmentEntry {
                source_path: "intro.ron".into(),
                container_name: None,
                camera_name: None,
            }],
        };
        let descriptor = SegmentDescriptor {
            source_path: "intro.ron".into(),
            container_name: "Component".into(),
            camera_name: "=> CAMERA".into(),
        };

        manifest.record_compiled(3, descriptor.clone());
        assert_eq!(manifest.segments[0].camera_name, None);

        manifest.record_compiled(0, descriptor);
        assert_eq!(manifest.segments[0].container_name.as_deref(), Some("Component"));
        assert_eq!(manifest.segments[0].camera_name.as_deref(), Some("=> CAMERA"));
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.ron");
        std::fs::write(&path, "(version: 7, name: \"x\")").unwrap();

        assert!(matches!(
            PresentationManifest::load(&path),
            Err(ManifestError::UnsupportedVersion { found: 7, .. })
        ));
    }
}
