// SPDX-License-Identifier: MIT OR Apache-2.0
//! Incremental repair of an assembled timeline after structural edits.
//!
//! Hosts report edits as [`ChangeRecord`]s. The engine queues them and
//! [`ReconciliationEngine::drain`] works through the queue until it is empty.
//! Every record is turned into a [`TimelinePatch`] computed from a snapshot
//! of the current state and committed in one write. A patch that would not
//! change anything is discarded, so a host echoing the engine's own writes
//! back as new records cannot make it loop.

use crate::error::{Result, TimelineError};
use crate::loops::LoopTable;
use crate::marker::MarkerSet;
use crate::registry::Registry;
use crate::segment::{FrameSpan, SegmentId};
use crate::timeline::{SharedTimeline, Timeline};
use crate::transition::TransitionTable;
use crate::Frame;
use parking_lot::{Mutex, RwLockUpgradableReadGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A structural edit reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRecord {
    /// The segment was observed starting at a different frame
    Moved {
        /// Segment that moved
        id: SegmentId,
        /// Start frame the host now sees
        observed_start: Frame,
    },
    /// The segment was deleted by the host
    Deleted {
        /// Segment that was deleted
        id: SegmentId,
    },
}

impl ChangeRecord {
    /// Segment the record is about
    pub fn id(&self) -> SegmentId {
        match self {
            Self::Moved { id, .. } | Self::Deleted { id } => *id,
        }
    }
}

/// What happened to one change record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The segment was moved and derived state repaired
    Applied {
        /// Segment that moved
        id: SegmentId,
        /// Frames it moved by
        delta: Frame,
    },
    /// The timeline already matched the record
    Unchanged {
        /// Segment the record was about
        id: SegmentId,
    },
    /// The segment was removed
    Deleted {
        /// Removed segment
        id: SegmentId,
    },
    /// The record could not be applied and was dropped
    Skipped {
        /// Segment the record was about
        id: SegmentId,
        /// Why it was dropped
        reason: String,
    },
}

/// Post-move state of the timeline, computed without touching it
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePatch {
    id: SegmentId,
    delta: Frame,
    offset: Frame,
    registry: Registry,
    markers: MarkerSet,
    loops: LoopTable,
    transitions: TransitionTable,
}

impl TimelinePatch {
    /// Compute the state after `id` starts at `observed_start`
    pub fn for_move(timeline: &Timeline, id: SegmentId, observed_start: Frame) -> Result<Self> {
        let segment = timeline
            .segments
            .get(&id)
            .ok_or(TimelineError::SegmentNotFound(id))?;
        let recorded = timeline
            .registry
            .get(id)
            .ok_or(TimelineError::SegmentNotFound(id))?;
        if !timeline.markers.has_owner(id) {
            return Err(TimelineError::SegmentNotFound(id));
        }
        let delta = observed_start
            .checked_sub(recorded.start)
            .filter(|d| recorded.end.checked_add(*d).is_some() && segment.offset.checked_add(*d).is_some())
            .ok_or(TimelineError::FrameOutOfRange { frame: observed_start })?;

        let mut markers = timeline.markers.clone();
        markers.shift_owner(id, delta);

        // Pairings may change when loop markers cross each other
        let loops = LoopTable::from_markers(markers.markers())?;

        let mut registry = timeline.registry.clone();
        registry.insert(id, recorded.shifted(delta));

        let mut transitions = timeline.transitions.clone();
        transitions.splice(id, &registry, |sid| timeline.camera_of(sid));

        Ok(Self {
            id,
            delta,
            offset: segment.offset + delta,
            registry,
            markers,
            loops,
            transitions,
        })
    }

    /// Segment the patch moves
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Frames the segment moves by
    pub fn delta(&self) -> Frame {
        self.delta
    }

    /// New span of the moved segment
    pub fn span(&self) -> Option<FrameSpan> {
        self.registry.get(self.id)
    }

    /// Whether applying the patch would leave `timeline` as it is
    pub fn is_noop(&self, timeline: &Timeline) -> bool {
        self.delta == 0
            && self.registry == timeline.registry
            && self.markers == timeline.markers
            && self.loops == timeline.loops
            && self.transitions == timeline.transitions
    }

    /// Write the patch into `timeline`
    pub fn apply(self, timeline: &mut Timeline) {
        if let Some(segment) = timeline.segments.get_mut(&self.id) {
            segment.offset = self.offset;
        }
        timeline.registry = self.registry;
        timeline.markers = self.markers;
        timeline.loops = self.loops;
        timeline.transitions = self.transitions;
    }
}

/// Cloneable handle for reporting edits into an engine's queue
#[derive(Clone, Default)]
pub struct ChangeQueue {
    records: Arc<Mutex<VecDeque<ChangeRecord>>>,
}

impl ChangeQueue {
    /// Queue a record
    pub fn push(&self, record: ChangeRecord) {
        self.records.lock().push_back(record);
    }

    fn pop(&self) -> Option<ChangeRecord> {
        self.records.lock().pop_front()
    }

    /// Number of queued records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl fmt::Debug for ChangeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeQueue").field("len", &self.len()).finish()
    }
}

/// Called after every committed move with the segment and its new span
pub type CommitListener = Box<dyn Fn(&ChangeQueue, SegmentId, FrameSpan) + Send + Sync>;

/// Drains change records against a shared timeline
#[derive(Default)]
pub struct ReconciliationEngine {
    queue: ChangeQueue,
    draining: AtomicBool,
    listener: Option<CommitListener>,
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReconciliationEngine {
    /// Create an engine with an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a listener that observes committed moves
    ///
    /// The listener may push new records; they are handled by the same drain.
    pub fn with_listener(mut self, listener: CommitListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Handle for reporting edits
    pub fn queue(&self) -> ChangeQueue {
        self.queue.clone()
    }

    /// Queue a record
    pub fn enqueue(&self, record: ChangeRecord) {
        self.queue.push(record);
    }

    /// Number of queued records
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Whether a drain is running
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Process queued records until the queue is empty
    ///
    /// A drain started while another one runs returns immediately with no
    /// outcomes; the running drain picks up whatever was queued.
    pub fn drain(&self, timeline: &SharedTimeline) -> Vec<ReconcileOutcome> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            tracing::debug!("reconciliation already draining");
            return Vec::new();
        }
        let _guard = DrainGuard(&self.draining);

        let mut outcomes = Vec::new();
        while let Some(record) = self.queue.pop() {
            let outcome = self.process(record, timeline);
            if let ReconcileOutcome::Skipped { id, reason } = &outcome {
                tracing::warn!(%id, %reason, "reconciliation skipped");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    fn process(&self, record: ChangeRecord, timeline: &SharedTimeline) -> ReconcileOutcome {
        match record {
            ChangeRecord::Moved { id, observed_start } => {
                let snapshot = timeline.upgradable_read();
                let patch = match TimelinePatch::for_move(&snapshot, id, observed_start) {
                    Ok(patch) => patch,
                    Err(err) => {
                        return ReconcileOutcome::Skipped {
                            id,
                            reason: err.to_string(),
                        }
                    }
                };
                if patch.is_noop(&snapshot) {
                    return ReconcileOutcome::Unchanged { id };
                }

                let delta = patch.delta();
                let span = patch.span();
                {
                    let mut timeline = RwLockUpgradableReadGuard::upgrade(snapshot);
                    patch.apply(&mut timeline);
                }
                tracing::debug!(%id, delta, "reconciled segment move");

                if let (Some(listener), Some(span)) = (&self.listener, span) {
                    listener(&self.queue, id, span);
                }
                ReconcileOutcome::Applied { id, delta }
            }
            ChangeRecord::Deleted { id } => match timeline.write().delete_segment(id) {
                Ok(_) => ReconcileOutcome::Deleted { id },
                Err(err) => ReconcileOutcome::Skipped {
                    id,
                    reason: err.to_string(),
                },
            },
        }
    }
}

impl fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("queue", &self.queue)
            .field("draining", &self.is_draining())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
