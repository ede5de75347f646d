// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline markers.

use crate::segment::SegmentId;
use crate::Frame;
use serde::{Deserialize, Serialize};

/// Kind of a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    /// Start of a loop region, playback stops here
    LoopStart,
    /// End of a loop region, playback jumps back to the loop start
    LoopEnd,
    /// Auto-inserted stop at a segment's first or last frame
    Boundary,
    /// Author-placed stop point
    Generic,
}

impl MarkerKind {
    /// Whether playback stops when reaching a marker of this kind
    pub fn stops_playback(&self) -> bool {
        !matches!(self, Self::LoopEnd)
    }
}

/// A named event at a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marker {
    /// Frame of the marker
    pub frame: Frame,
    /// Marker kind
    pub kind: MarkerKind,
}

impl Marker {
    /// Create a new marker
    pub fn new(frame: Frame, kind: MarkerKind) -> Self {
        Self { frame, kind }
    }

    /// Loop start marker
    pub fn loop_start(frame: Frame) -> Self {
        Self::new(frame, MarkerKind::LoopStart)
    }

    /// Loop end marker
    pub fn loop_end(frame: Frame) -> Self {
        Self::new(frame, MarkerKind::LoopEnd)
    }

    /// Boundary marker
    pub fn boundary(frame: Frame) -> Self {
        Self::new(frame, MarkerKind::Boundary)
    }

    /// Generic stop marker
    pub fn generic(frame: Frame) -> Self {
        Self::new(frame, MarkerKind::Generic)
    }

    /// Copy of this marker moved by `delta` frames
    pub fn shifted(self, delta: Frame) -> Self {
        Self {
            frame: self.frame + delta,
            ..self
        }
    }
}

/// Sort markers by frame, keeping the relative order of markers on the same frame
pub fn sort_markers(markers: &mut [Marker]) {
    markers.sort_by_key(|m| m.frame);
}

/// A marker placed on the master timeline and owned by a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedMarker {
    /// Owning segment
    pub owner: SegmentId,
    /// Marker at global coordinates
    pub marker: Marker,
}

/// All markers of a timeline, kept sorted by frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSet {
    markers: Vec<PlacedMarker>,
}

impl MarkerSet {
    /// Create an empty marker set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add markers owned by a segment
    pub fn extend_owned(&mut self, owner: SegmentId, markers: impl IntoIterator<Item = Marker>) {
        self.markers
            .extend(markers.into_iter().map(|marker| PlacedMarker { owner, marker }));
        self.sort();
    }

    /// Move every marker of `owner` by `delta` frames
    pub fn shift_owner(&mut self, owner: SegmentId, delta: Frame) {
        if delta == 0 {
            return;
        }
        for placed in self.markers.iter_mut().filter(|p| p.owner == owner) {
            placed.marker = placed.marker.shifted(delta);
        }
        self.sort();
    }

    /// Remove every marker of `owner`, returning them
    pub fn remove_owner(&mut self, owner: SegmentId) -> Vec<Marker> {
        let mut removed = Vec::new();
        self.markers.retain(|p| {
            if p.owner == owner {
                removed.push(p.marker);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Turn the LoopEnd markers at `frames` into plain stops, returning the new markers
    ///
    /// A LoopEnd on its owner's first or last marked frame becomes a Boundary,
    /// any other one a Generic marker.
    pub fn demote_loop_ends(&mut self, frames: &[Frame]) -> Vec<PlacedMarker> {
        let mut demoted = Vec::new();
        for idx in 0..self.markers.len() {
            let placed = self.markers[idx];
            if placed.marker.kind != MarkerKind::LoopEnd || !frames.contains(&placed.marker.frame) {
                continue;
            }
            let owned = self.owned_by(placed.owner).map(|m| m.frame);
            let (first, last) = owned.fold((Frame::MAX, Frame::MIN), |(lo, hi), f| (lo.min(f), hi.max(f)));
            let kind = if placed.marker.frame == first || placed.marker.frame == last {
                MarkerKind::Boundary
            } else {
                MarkerKind::Generic
            };
            self.markers[idx].marker.kind = kind;
            demoted.push(self.markers[idx]);
        }
        demoted
    }

    /// Whether `owner` has any markers
    pub fn has_owner(&self, owner: SegmentId) -> bool {
        self.markers.iter().any(|p| p.owner == owner)
    }

    /// Markers owned by a segment, in frame order
    pub fn owned_by(&self, owner: SegmentId) -> impl Iterator<Item = &Marker> {
        self.markers
            .iter()
            .filter(move |p| p.owner == owner)
            .map(|p| &p.marker)
    }

    /// First marker at `frame`, if any
    pub fn at(&self, frame: Frame) -> Option<&PlacedMarker> {
        let idx = self.markers.partition_point(|p| p.marker.frame < frame);
        self.markers.get(idx).filter(|p| p.marker.frame == frame)
    }

    /// All markers in frame order
    pub fn iter(&self) -> impl Iterator<Item = &PlacedMarker> {
        self.markers.iter()
    }

    /// Markers without ownership, in frame order
    pub fn markers(&self) -> impl Iterator<Item = Marker> + '_ {
        self.markers.iter().map(|p| p.marker)
    }

    /// Number of markers
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether there are no markers
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    fn sort(&mut self) {
        self.markers.sort_by_key(|p| p.marker.frame);
    }
}
