// SPDX-License-Identifier: MIT OR Apache-2.0
//! The assembled master timeline.
//!
//! A [`Timeline`] owns the placed segments together with the state derived
//! from them: the registry of global spans, the marker set, the loop table
//! and the camera transitions. [`SharedTimeline`] is the handle a host keeps
//! for one open presentation.

use crate::error::{Result, TimelineError};
use crate::loops::LoopTable;
use crate::marker::{MarkerKind, MarkerSet};
use crate::registry::Registry;
use crate::segment::{CompiledSegment, SegmentId};
use crate::settings::PresenterSettings;
use crate::sidecar::Sidecar;
use crate::transition::TransitionTable;
use crate::Frame;
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Placed segments and everything derived from their placement
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub(crate) segments: IndexMap<SegmentId, CompiledSegment>,
    pub(crate) registry: Registry,
    pub(crate) markers: MarkerSet,
    pub(crate) loops: LoopTable,
    pub(crate) transitions: TransitionTable,
    pub(crate) current_frame: Frame,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            segments: IndexMap::new(),
            registry: Registry::new(),
            markers: MarkerSet::new(),
            loops: LoopTable::new(),
            transitions: TransitionTable::new(),
            current_frame: 1,
        }
    }
}

impl Timeline {
    /// Create an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Place compiled segments one after another
    ///
    /// The first segment starts at frame 1, every later one `gap` frames
    /// after the end of its predecessor. Fails without side effects if any
    /// segment breaks the compiled-segment contract or the placed loop
    /// markers do not pair.
    pub fn assemble(segments: Vec<CompiledSegment>, settings: &PresenterSettings) -> Result<Self> {
        if segments.is_empty() {
            return Err(TimelineError::EmptyAssembly);
        }
        for segment in &segments {
            check_contract(segment)?;
        }

        let gap = settings.gap_frames();
        let mut timeline = Self::new();
        let mut start = 1;
        for mut segment in segments {
            segment.place_at(start);
            let span = segment.span();
            tracing::debug!(segment = %segment.name, start = span.start, last = span.last(), "placed segment");

            timeline.markers.extend_owned(segment.id, segment.global_markers());
            timeline.registry.insert(segment.id, span);
            timeline.segments.insert(segment.id, segment);
            start = span.end + gap;
        }

        timeline.loops = LoopTable::from_markers(timeline.markers.markers())?;
        timeline.transitions =
            TransitionTable::from_registry(&timeline.registry, |id| timeline.camera_of(id));

        tracing::info!(
            segments = timeline.segments.len(),
            loops = timeline.loops.len(),
            last_frame = timeline.last_frame(),
            "assembled timeline"
        );
        Ok(timeline)
    }

    /// Span registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Placed markers
    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Loop table
    pub fn loops(&self) -> &LoopTable {
        &self.loops
    }

    /// Camera transitions
    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Get a segment by ID
    pub fn segment(&self, id: SegmentId) -> Option<&CompiledSegment> {
        self.segments.get(&id)
    }

    /// Look up a segment by name
    pub fn segment_by_name(&self, name: &str) -> Option<&CompiledSegment> {
        self.segments.values().find(|s| s.name == name)
    }

    /// Segments in timeline order
    pub fn segments(&self) -> impl Iterator<Item = &CompiledSegment> {
        self.registry.ids().filter_map(|id| self.segments.get(&id))
    }

    /// Camera of a segment
    pub fn camera_of(&self, id: SegmentId) -> Option<&str> {
        self.segments.get(&id).map(|s| s.camera.as_str())
    }

    /// Whether nothing is placed
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// First frame of the timeline, 1 when empty
    pub fn first_frame(&self) -> Frame {
        self.registry.first_frame().unwrap_or(1)
    }

    /// Last frame of the timeline, 1 when empty
    pub fn last_frame(&self) -> Frame {
        self.registry.last_frame().unwrap_or(1)
    }

    /// Playhead position
    pub fn current_frame(&self) -> Frame {
        self.current_frame
    }

    /// Move the playhead without evaluating markers
    pub fn set_current_frame(&mut self, frame: Frame) {
        self.current_frame = frame;
    }

    /// Camera in focus at `frame`
    pub fn active_camera_at(&self, frame: Frame) -> Option<&str> {
        let (first, _) = self.registry.get_index(0)?;
        let mut camera = self.camera_of(first)?;
        for transition in self.transitions.iter() {
            if transition.influence_at(frame) >= 1.0 {
                camera = transition.target_camera.as_str();
            }
        }
        Some(camera)
    }

    /// Remove a segment with its markers, loop entries and registry entry
    ///
    /// The former neighbours of the segment are connected by a new direct
    /// transition. Loops are paired again over the remaining markers; a
    /// LoopEnd that loses its start becomes a plain stop in its own segment.
    pub fn delete_segment(&mut self, id: SegmentId) -> Result<CompiledSegment> {
        if !self.segments.contains_key(&id) {
            return Err(TimelineError::SegmentNotFound(id));
        }

        let mut markers = self.markers.clone();
        let removed = markers.remove_owner(id);
        let unpaired = LoopTable::unpaired_ends(markers.markers());
        let demoted = markers.demote_loop_ends(&unpaired);
        let loops = LoopTable::from_markers(markers.markers())?;

        let Some(segment) = self.segments.shift_remove(&id) else {
            return Err(TimelineError::SegmentNotFound(id));
        };
        for placed in &demoted {
            tracing::warn!(frame = placed.marker.frame, "loop end lost its loop start, kept as a stop");
            if let Some(owner) = self.segments.get_mut(&placed.owner) {
                let local = placed.marker.frame - owner.global_start() + 1;
                if let Some(marker) = owner
                    .markers
                    .iter_mut()
                    .find(|m| m.frame == local && m.kind == MarkerKind::LoopEnd)
                {
                    marker.kind = placed.marker.kind;
                }
            }
        }
        let dropped_loops = self.loops.len().saturating_sub(loops.len());
        self.markers = markers;
        self.loops = loops;

        self.registry.remove(id);
        let segments = &self.segments;
        self.transitions
            .splice(id, &self.registry, |sid| segments.get(&sid).map(|s| s.camera.as_str()));

        self.current_frame = self
            .current_frame
            .clamp(self.first_frame(), self.last_frame());

        tracing::info!(
            segment = %segment.name,
            markers = removed.len(),
            loops = dropped_loops,
            demoted = demoted.len(),
            "deleted segment"
        );
        Ok(segment)
    }

    /// Rebuild every camera transition from registry order
    ///
    /// Returns the number of transitions.
    pub fn recalculate_transitions(&mut self) -> usize {
        let segments = &self.segments;
        self.transitions = TransitionTable::from_registry(&self.registry, |id| {
            segments.get(&id).map(|s| s.camera.as_str())
        });
        tracing::info!(transitions = self.transitions.len(), "recalculated camera transitions");
        self.transitions.len()
    }

    /// Clear everything and put the playhead back on frame 1
    pub fn reset(&mut self) {
        *self = Self::new();
        tracing::info!("timeline reset");
    }

    /// Marker sidecar for the placed segments
    pub fn sidecar(&self) -> Sidecar {
        let mut sidecar = Sidecar::new();
        for segment in self.segments() {
            sidecar.push(
                segment.name.clone(),
                self.markers.owned_by(segment.id).copied().collect(),
            );
        }
        sidecar
    }
}

fn check_contract(segment: &CompiledSegment) -> Result<()> {
    let cameras = segment.objects.iter().filter(|o| o.is_camera()).count();
    let named = segment
        .objects
        .iter()
        .any(|o| o.is_camera() && o.name == segment.camera);
    if cameras != 1 || !named || segment.local_end < 1 {
        return Err(TimelineError::CameraCount {
            segment: segment.name.clone(),
            found: cameras,
        });
    }
    Ok(())
}

/// Process-wide handle to the timeline of one open presentation
#[derive(Debug, Clone, Default)]
pub struct SharedTimeline {
    inner: Arc<RwLock<Timeline>>,
    assembling: Arc<AtomicBool>,
}

struct AssemblyGuard<'a>(&'a AtomicBool);

impl Drop for AssemblyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SharedTimeline {
    /// Create a handle to an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble and swap in a new timeline
    ///
    /// The new timeline is built outside the lock. On failure the previous
    /// timeline stays in place.
    pub fn assemble(&self, segments: Vec<CompiledSegment>, settings: &PresenterSettings) -> Result<()> {
        if self
            .assembling
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(TimelineError::AssemblyInProgress);
        }
        let _guard = AssemblyGuard(&self.assembling);

        let timeline = Timeline::assemble(segments, settings)?;
        *self.inner.write() = timeline;
        Ok(())
    }

    /// Whether an assembly is running
    pub fn is_assembling(&self) -> bool {
        self.assembling.load(Ordering::Acquire)
    }

    /// Read access
    pub fn read(&self) -> RwLockReadGuard<'_, Timeline> {
        self.inner.read()
    }

    /// Write access
    pub fn write(&self) -> RwLockWriteGuard<'_, Timeline> {
        self.inner.write()
    }

    /// Read access that can later be upgraded to a write
    pub fn upgradable_read(&self) -> RwLockUpgradableReadGuard<'_, Timeline> {
        self.inner.upgradable_read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use crate::segment::FrameSpan;
    use crate::source::{ObjectKind, SceneObject};

    fn segment(name: &str, camera: &str, len: Frame, markers: Vec<Marker>) -> CompiledSegment {
        CompiledSegment {
            id: SegmentId::new(),
            name: name.into(),
            source_path: None,
            container: "Component".into(),
            camera: camera.into(),
            index: 0,
            local_origin: 1,
            local_end: len,
            offset: 0,
            objects: vec![SceneObject::new(camera, ObjectKind::Camera)],
            strips: Vec::new(),
            markers,
        }
    }

    fn settings(gap: Frame) -> PresenterSettings {
        PresenterSettings {
            fps: 1,
            transition_time: gap as f32,
            ..Default::default()
        }
    }

    fn three() -> Vec<CompiledSegment> {
        vec![
            segment("a", "cam", 10, vec![Marker::boundary(1), Marker::boundary(10)]),
            segment("b", "cam.001", 5, vec![Marker::boundary(1), Marker::boundary(5)]),
            segment("c", "cam.002", 8, vec![Marker::boundary(1), Marker::boundary(8)]),
        ]
    }

    #[test]
    fn test_assemble_places_with_gap() {
        let timeline = Timeline::assemble(three(), &settings(4)).unwrap();

        let spans: Vec<_> = timeline.registry().iter().map(|(_, s)| (s.start, s.last())).collect();
        assert_eq!(spans, vec![(1, 10), (15, 19), (24, 31)]);
        assert_eq!(timeline.last_frame(), 31);
        assert_eq!(timeline.transitions().len(), 2);

        let frames: Vec<_> = timeline.markers().markers().map(|m| m.frame).collect();
        assert_eq!(frames, vec![1, 10, 15, 19, 24, 31]);
    }

    #[test]
    fn test_assemble_rejects_empty_and_cameraless() {
        assert!(matches!(
            Timeline::assemble(Vec::new(), &settings(4)),
            Err(TimelineError::EmptyAssembly)
        ));

        let mut segs = three();
        segs[1].objects.clear();
        assert!(matches!(
            Timeline::assemble(segs, &settings(4)),
            Err(TimelineError::CameraCount { found: 0, .. })
        ));
    }

    #[test]
    fn test_loops_pair_across_segments() {
        let segs = vec![
            segment("a", "cam", 10, vec![Marker::boundary(1), Marker::loop_start(5), Marker::boundary(10)]),
            segment("b", "cam.001", 5, vec![Marker::boundary(1), Marker::loop_end(3), Marker::boundary(5)]),
        ];
        let timeline = Timeline::assemble(segs, &settings(4)).unwrap();
        assert_eq!(timeline.loops().get(17), Some(5));
    }

    #[test]
    fn test_active_camera_steps() {
        let timeline = Timeline::assemble(three(), &settings(4)).unwrap();
        assert_eq!(timeline.active_camera_at(1), Some("cam"));
        assert_eq!(timeline.active_camera_at(14), Some("cam"));
        assert_eq!(timeline.active_camera_at(15), Some("cam.001"));
        assert_eq!(timeline.active_camera_at(31), Some("cam.002"));
    }

    #[test]
    fn test_delete_reconnects_neighbours() {
        let mut timeline = Timeline::assemble(three(), &settings(4)).unwrap();
        let ids: Vec<_> = timeline.registry().ids().collect();

        let removed = timeline.delete_segment(ids[1]).unwrap();
        assert_eq!(removed.name, "b");
        assert_eq!(timeline.registry().len(), 2);
        assert_eq!(timeline.markers().len(), 4);
        let t = timeline.transitions().outgoing(ids[0]).unwrap();
        assert_eq!((t.to, t.release, t.engage), (ids[2], 10, 24));
        assert_eq!(timeline.registry().get(ids[2]), Some(FrameSpan::new(24, 32)));

        assert!(matches!(
            timeline.delete_segment(ids[1]),
            Err(TimelineError::SegmentNotFound(_))
        ));
    }

    #[test]
    fn test_delete_loop_start_owner_keeps_timeline_consistent() {
        use crate::reconcile::{ChangeRecord, ReconcileOutcome, ReconciliationEngine};

        let segs = vec![
            segment("a", "cam", 10, vec![Marker::boundary(1), Marker::loop_start(5), Marker::boundary(10)]),
            segment("b", "cam.001", 5, vec![Marker::boundary(1), Marker::loop_end(3), Marker::boundary(5)]),
            segment("c", "cam.002", 8, vec![Marker::boundary(1), Marker::boundary(8)]),
        ];
        let (a, b, c) = (segs[0].id, segs[1].id, segs[2].id);
        let shared = SharedTimeline::new();
        shared.assemble(segs, &settings(4)).unwrap();

        let engine = ReconciliationEngine::new();
        engine.enqueue(ChangeRecord::Deleted { id: a });
        engine.enqueue(ChangeRecord::Moved { id: c, observed_start: 40 });
        assert_eq!(
            engine.drain(&shared),
            vec![
                ReconcileOutcome::Deleted { id: a },
                ReconcileOutcome::Applied { id: c, delta: 16 },
            ]
        );

        let timeline = shared.read();
        assert!(timeline.loops().is_empty());
        assert_eq!(timeline.markers().at(17).map(|p| p.marker.kind), Some(MarkerKind::Generic));
        assert_eq!(timeline.segment(b).unwrap().markers[1], Marker::generic(3));

        let text = timeline.sidecar().encode();
        assert_eq!(text, "b:15;17;19;\nc:40;47;\n");
        assert_eq!(Sidecar::decode(&text).unwrap(), timeline.sidecar());
    }

    #[test]
    fn test_delete_demotes_loop_end_on_last_frame_to_boundary() {
        let segs = vec![
            segment("a", "cam", 10, vec![Marker::boundary(1), Marker::loop_start(5), Marker::boundary(10)]),
            segment("b", "cam.001", 5, vec![Marker::boundary(1), Marker::loop_end(5)]),
        ];
        let a = segs[0].id;
        let mut timeline = Timeline::assemble(segs, &settings(4)).unwrap();

        timeline.delete_segment(a).unwrap();
        assert_eq!(timeline.markers().at(19).map(|p| p.marker.kind), Some(MarkerKind::Boundary));
        assert_eq!(Sidecar::decode(&timeline.sidecar().encode()).unwrap(), timeline.sidecar());
    }

    #[test]
    fn test_recalculate_transitions_from_registry_order() {
        let mut timeline = Timeline::assemble(three(), &settings(4)).unwrap();
        let expected = timeline.transitions().clone();

        timeline.transitions = TransitionTable::new();
        assert_eq!(timeline.active_camera_at(31), Some("cam"));

        assert_eq!(timeline.recalculate_transitions(), 2);
        assert_eq!(timeline.transitions(), &expected);
        assert_eq!(timeline.active_camera_at(31), Some("cam.002"));
    }

    #[test]
    fn test_reset() {
        let mut timeline = Timeline::assemble(three(), &settings(4)).unwrap();
        timeline.set_current_frame(20);
        timeline.reset();
        assert!(timeline.is_empty());
        assert_eq!(timeline.current_frame(), 1);
        assert!(timeline.loops().is_empty());
    }

    #[test]
    fn test_sidecar_uses_global_frames() {
        let timeline = Timeline::assemble(three(), &settings(4)).unwrap();
        assert_eq!(timeline.sidecar().encode(), "a:1;10;\nb:15;19;\nc:24;31;\n");
    }

    #[test]
    fn test_failed_assembly_keeps_previous() {
        let shared = SharedTimeline::new();
        shared.assemble(three(), &settings(4)).unwrap();

        let bad = vec![segment("x", "cam", 4, vec![Marker::loop_end(2)])];
        assert!(shared.assemble(bad, &settings(4)).is_err());
        assert_eq!(shared.read().registry().len(), 3);
        assert!(!shared.is_assembling());
    }

    #[test]
    fn test_assembly_guard_blocks_second_run() {
        let shared = SharedTimeline::new();
        shared.assembling.store(true, Ordering::Release);
        assert!(matches!(
            shared.assemble(three(), &settings(4)),
            Err(TimelineError::AssemblyInProgress)
        ));
    }
}
