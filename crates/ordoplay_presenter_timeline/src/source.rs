// SPDX-License-Identifier: MIT OR Apache-2.0
//! Raw segment sources.
//!
//! A source is what the content importer hands over: objects grouped into
//! containers, keyframed curves on objects and materials, and authored
//! markers. Sources are stored as RON.

use crate::error::{Result, TimelineError};
use crate::marker::Marker;
use crate::Frame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Type of a scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Camera
    Camera,
    /// Mesh geometry
    Mesh,
    /// Light source
    Light,
    /// Empty / transform only
    Empty,
    /// Text object
    Text,
    /// Anything else
    Other,
}

/// A keyed value on a curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Keyed frame in source coordinates
    pub frame: Frame,
    /// Keyed value
    pub value: f32,
}

/// A keyframed animation curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    /// Animated property path, e.g. `location[0]`
    pub data_path: String,
    /// Keys in frame order
    #[serde(default)]
    pub keys: Vec<CurveKey>,
}

impl Curve {
    /// Create an empty curve
    pub fn new(data_path: impl Into<String>) -> Self {
        Self {
            data_path: data_path.into(),
            keys: Vec::new(),
        }
    }

    /// Insert a key, replacing one on the same frame
    pub fn insert_key(&mut self, frame: Frame, value: f32) {
        match self.keys.binary_search_by_key(&frame, |k| k.frame) {
            Ok(idx) => self.keys[idx].value = value,
            Err(idx) => self.keys.insert(idx, CurveKey { frame, value }),
        }
    }

    /// First and last keyed frame
    pub fn frame_range(&self) -> Option<(Frame, Frame)> {
        let min = self.keys.iter().map(|k| k.frame).min()?;
        let max = self.keys.iter().map(|k| k.frame).max()?;
        Some((min, max))
    }
}

/// An object in a segment source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Object name
    pub name: String,
    /// Object type
    pub kind: ObjectKind,
    /// Keyframed curves
    #[serde(default)]
    pub curves: Vec<Curve>,
}

impl SceneObject {
    /// Create an object without animation
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            curves: Vec::new(),
        }
    }

    /// Add a curve
    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curves.push(curve);
        self
    }

    /// Whether this is a camera
    pub fn is_camera(&self) -> bool {
        self.kind == ObjectKind::Camera
    }
}

/// A material with keyframed node properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material name
    pub name: String,
    /// Keyframed curves
    #[serde(default)]
    pub curves: Vec<Curve>,
}

/// A named group of objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Container name
    pub name: String,
    /// Objects in this container
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

impl Container {
    /// Create an empty container
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }

    /// Number of cameras in this container
    pub fn camera_count(&self) -> usize {
        self.objects.iter().filter(|o| o.is_camera()).count()
    }
}

/// A raw, uncompiled segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSource {
    /// Segment name, usually the file name
    pub name: String,
    /// Where the source was loaded from
    #[serde(skip)]
    pub path: Option<PathBuf>,
    /// Object containers
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Objects not in any container
    #[serde(default)]
    pub loose_objects: Vec<SceneObject>,
    /// Animated materials
    #[serde(default)]
    pub materials: Vec<Material>,
    /// Authored markers in source coordinates
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl SegmentSource {
    /// Create an empty source
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            containers: Vec::new(),
            loose_objects: Vec::new(),
            materials: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Load a source from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(TimelineError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let mut source: SegmentSource = ron::from_str(&content)?;
        source.path = Some(path.to_path_buf());
        Ok(source)
    }

    /// Save a source to a RON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Every object, in containers and loose
    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.containers
            .iter()
            .flat_map(|c| c.objects.iter())
            .chain(self.loose_objects.iter())
    }

    /// Every keyframed curve on objects and materials
    pub fn curves(&self) -> impl Iterator<Item = &Curve> {
        self.objects()
            .flat_map(|o| o.curves.iter())
            .chain(self.materials.iter().flat_map(|m| m.curves.iter()))
    }
}
