// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiled segments.
//!
//! A compiled segment keeps its keyframes in source coordinates inside
//! action strips and carries a single `offset`. Placing or moving the segment
//! on the master timeline only rewrites that offset.

use crate::error::Result;
use crate::marker::Marker;
use crate::source::{Curve, SceneObject};
use crate::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stable identifier for a segment, independent of its display name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    /// Create a new random segment ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open frame range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSpan {
    /// First frame
    pub start: Frame,
    /// One past the last frame
    pub end: Frame,
}

impl FrameSpan {
    /// Create a span
    pub fn new(start: Frame, end: Frame) -> Self {
        Self { start, end }
    }

    /// Span of `len` frames starting at `start`
    pub fn with_len(start: Frame, len: Frame) -> Self {
        Self::new(start, start + len)
    }

    /// Last frame inside the span
    pub fn last(&self) -> Frame {
        self.end - 1
    }

    /// Number of frames
    pub fn len(&self) -> Frame {
        self.end - self.start
    }

    /// Whether the span has no frames
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `frame` lies inside the span
    pub fn contains(&self, frame: Frame) -> bool {
        self.start <= frame && frame < self.end
    }

    /// Same span moved by `delta`
    pub fn shifted(&self, delta: Frame) -> Self {
        Self::new(self.start + delta, self.end + delta)
    }
}

/// What an action strip animates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StripTarget {
    /// Object-level animation
    Object,
    /// Material-level animation
    Material,
}

/// Keyframe curves moved off an object or material, applied through the segment offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStrip {
    /// Name of the animated object or material
    pub owner: String,
    /// Kind of owner
    pub target: StripTarget,
    /// Curves in source coordinates
    pub curves: Vec<Curve>,
}

impl ActionStrip {
    /// First and last keyed frame in source coordinates
    pub fn frame_range(&self) -> Option<(Frame, Frame)> {
        self.curves
            .iter()
            .filter_map(Curve::frame_range)
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
    }
}

/// Where to find a compiled segment and its parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// Path of the segment source
    pub source_path: PathBuf,
    /// Resolved container name
    pub container_name: String,
    /// Canonical camera name
    pub camera_name: String,
}

/// A segment ready to be placed on the master timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledSegment {
    /// Stable identity
    pub id: SegmentId,
    /// Display name
    pub name: String,
    /// Source file, when loaded from disk
    pub source_path: Option<PathBuf>,
    /// Resolved container name
    pub container: String,
    /// Canonical camera name
    pub camera: String,
    /// Placement index used for camera naming
    pub index: usize,
    /// Source frame that maps to local frame 1
    pub local_origin: Frame,
    /// Last local frame; the local span is `[1, local_end]`
    pub local_end: Frame,
    /// Source to global frame offset
    pub offset: Frame,
    /// Objects of the resolved container, curves moved to `strips`
    pub objects: Vec<SceneObject>,
    /// Deferred keyframe curves
    pub strips: Vec<ActionStrip>,
    /// Markers in local coordinates, in frame order
    pub markers: Vec<Marker>,
}

impl CompiledSegment {
    /// First global frame
    pub fn global_start(&self) -> Frame {
        self.local_origin + self.offset
    }

    /// Global span
    pub fn span(&self) -> FrameSpan {
        FrameSpan::with_len(self.global_start(), self.local_end)
    }

    /// Put the first local frame at `start`
    pub fn place_at(&mut self, start: Frame) {
        self.offset = start - self.local_origin;
    }

    /// Move the segment by `delta` frames
    pub fn shift(&mut self, delta: Frame) {
        self.offset += delta;
    }

    /// Convert a local frame to a global frame
    pub fn local_to_global(&self, local: Frame) -> Frame {
        local - 1 + self.global_start()
    }

    /// Convert a source frame to a global frame
    pub fn source_to_global(&self, source: Frame) -> Frame {
        source + self.offset
    }

    /// Markers at global coordinates
    pub fn global_markers(&self) -> Vec<Marker> {
        let delta = self.global_start() - 1;
        self.markers.iter().map(|m| m.shifted(delta)).collect()
    }

    /// All keyed frames at global coordinates, with their strip owner
    pub fn global_keys(&self) -> impl Iterator<Item = (&str, Frame)> {
        self.strips.iter().flat_map(move |strip| {
            strip.curves.iter().flat_map(move |curve| {
                curve
                    .keys
                    .iter()
                    .map(move |k| (strip.owner.as_str(), self.source_to_global(k.frame)))
            })
        })
    }

    /// Descriptor for host lookups
    pub fn descriptor(&self) -> SegmentDescriptor {
        SegmentDescriptor {
            source_path: self.source_path.clone().unwrap_or_else(|| PathBuf::from(&self.name)),
            container_name: self.container.clone(),
            camera_name: self.camera.clone(),
        }
    }

    /// Save the compiled segment as RON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a compiled segment from RON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }
}
