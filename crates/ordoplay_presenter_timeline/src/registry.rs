// SPDX-License-Identifier: MIT OR Apache-2.0
//! Segment registry.

use crate::segment::{FrameSpan, SegmentId};
use crate::Frame;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Global span of every placed segment, always sorted by start frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    spans: IndexMap<SegmentId, FrameSpan>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a segment's span
    pub fn insert(&mut self, id: SegmentId, span: FrameSpan) -> Option<FrameSpan> {
        let previous = self.spans.insert(id, span);
        self.sort();
        previous
    }

    /// Remove a segment
    pub fn remove(&mut self, id: SegmentId) -> Option<FrameSpan> {
        // shift_remove keeps the remaining entries in order
        self.spans.shift_remove(&id)
    }

    /// Span of a segment
    pub fn get(&self, id: SegmentId) -> Option<FrameSpan> {
        self.spans.get(&id).copied()
    }

    /// Whether the segment is registered
    pub fn contains(&self, id: SegmentId) -> bool {
        self.spans.contains_key(&id)
    }

    /// Position of a segment in start order
    pub fn position(&self, id: SegmentId) -> Option<usize> {
        self.spans.get_index_of(&id)
    }

    /// Segment at a position in start order
    pub fn get_index(&self, index: usize) -> Option<(SegmentId, FrameSpan)> {
        self.spans.get_index(index).map(|(&id, &span)| (id, span))
    }

    /// Segments directly before and after `id`
    pub fn neighbours(&self, id: SegmentId) -> (Option<SegmentId>, Option<SegmentId>) {
        let Some(idx) = self.position(id) else {
            return (None, None);
        };
        let prev = idx.checked_sub(1).and_then(|i| self.get_index(i)).map(|(id, _)| id);
        let next = self.get_index(idx + 1).map(|(id, _)| id);
        (prev, next)
    }

    /// Segment whose span contains `frame`
    pub fn segment_at(&self, frame: Frame) -> Option<SegmentId> {
        self.spans
            .iter()
            .find(|(_, span)| span.contains(frame))
            .map(|(&id, _)| id)
    }

    /// First frame of the earliest segment
    pub fn first_frame(&self) -> Option<Frame> {
        self.spans.values().map(|s| s.start).min()
    }

    /// Last frame of the latest-ending segment
    pub fn last_frame(&self) -> Option<Frame> {
        self.spans.values().map(|s| s.last()).max()
    }

    /// Entries in start order
    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, FrameSpan)> + '_ {
        self.spans.iter().map(|(&id, &span)| (id, span))
    }

    /// Segment IDs in start order
    pub fn ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.spans.keys().copied()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    fn sort(&mut self) {
        // Stable, so segments sharing a start keep their insertion order
        self.spans.sort_by(|_, a, _, b| a.start.cmp(&b.start));
    }
}
