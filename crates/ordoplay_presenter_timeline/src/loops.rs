// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loop region pairing.

use crate::error::{Result, TimelineError};
use crate::marker::{sort_markers, Marker, MarkerKind};
use crate::Frame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from each loop end frame to its paired loop start frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopTable {
    entries: BTreeMap<Frame, Frame>,
}

impl LoopTable {
    /// Create an empty loop table
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair loop markers in one scan over frame order
    ///
    /// A LoopEnd consumes the currently open LoopStart. A second LoopStart
    /// before any LoopEnd replaces the open one, so regions never nest.
    pub fn from_markers(markers: impl IntoIterator<Item = Marker>) -> Result<Self> {
        let (entries, unpaired) = pair(markers);
        match unpaired.first() {
            Some(&frame) => Err(TimelineError::UnmatchedLoopEnd { frame }),
            None => Ok(Self { entries }),
        }
    }

    /// Frames of LoopEnd markers that the pairing scan leaves without a start
    pub fn unpaired_ends(markers: impl IntoIterator<Item = Marker>) -> Vec<Frame> {
        pair(markers).1
    }

    /// Loop start paired with the loop end at `end`
    pub fn get(&self, end: Frame) -> Option<Frame> {
        self.entries.get(&end).copied()
    }

    /// Loop region `(start, end)` that strictly contains `frame`
    pub fn containing(&self, frame: Frame) -> Option<(Frame, Frame)> {
        // Regions never overlap, so only the first end after `frame` can contain it
        let (&end, &start) = self.entries.range(frame + 1..).next()?;
        (start < frame).then_some((start, end))
    }

    /// Entries as `(end, start)` in end-frame order
    pub fn iter(&self) -> impl Iterator<Item = (Frame, Frame)> + '_ {
        self.entries.iter().map(|(&end, &start)| (end, start))
    }

    /// Number of loop regions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no loop regions
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn pair(markers: impl IntoIterator<Item = Marker>) -> (BTreeMap<Frame, Frame>, Vec<Frame>) {
    let mut markers: Vec<Marker> = markers.into_iter().collect();
    sort_markers(&mut markers);

    let mut entries = BTreeMap::new();
    let mut unpaired = Vec::new();
    let mut open: Option<Frame> = None;
    for marker in markers {
        match marker.kind {
            MarkerKind::LoopStart => {
                if let Some(previous) = open.replace(marker.frame) {
                    tracing::debug!(previous, frame = marker.frame, "loop start superseded");
                }
            }
            MarkerKind::LoopEnd => match open.take() {
                Some(start) => {
                    entries.insert(marker.frame, start);
                }
                None => unpaired.push(marker.frame),
            },
            MarkerKind::Boundary | MarkerKind::Generic => {}
        }
    }
    (entries, unpaired)
}
