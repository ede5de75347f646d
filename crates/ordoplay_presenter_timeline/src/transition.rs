// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera transitions between consecutive segments.
//!
//! A transition is a step function: the outgoing camera keeps full focus up
//! to the last frame of its segment, the incoming camera takes over from the
//! first frame of the next one.

use crate::registry::Registry;
use crate::segment::{FrameSpan, SegmentId};
use crate::Frame;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Step handoff of camera focus from one segment to the next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraTransition {
    /// Outgoing segment
    pub from: SegmentId,
    /// Incoming segment
    pub to: SegmentId,
    /// Camera of the incoming segment
    pub target_camera: String,
    /// Last frame with zero influence
    pub release: Frame,
    /// First frame with full influence
    pub engage: Frame,
}

impl CameraTransition {
    /// Transition between two placed segments
    pub fn between(
        from: SegmentId,
        from_span: FrameSpan,
        to: SegmentId,
        to_span: FrameSpan,
        target_camera: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to,
            target_camera: target_camera.into(),
            release: from_span.last(),
            engage: to_span.start,
        }
    }

    /// Influence of the target camera at `frame`
    pub fn influence_at(&self, frame: Frame) -> f32 {
        if frame < self.engage {
            0.0
        } else {
            1.0
        }
    }

    /// Whether the transition touches `id`
    pub fn touches(&self, id: SegmentId) -> bool {
        self.from == id || self.to == id
    }
}

/// Transitions keyed by their outgoing segment, in timeline order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTable {
    transitions: IndexMap<SegmentId, CameraTransition>,
}

impl TransitionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build transitions for every consecutive pair in the registry
    pub fn from_registry<'a>(registry: &Registry, camera_of: impl Fn(SegmentId) -> Option<&'a str>) -> Self {
        let mut table = Self::new();
        let entries: Vec<_> = registry.iter().collect();
        for pair in entries.windows(2) {
            let ((from, from_span), (to, to_span)) = (pair[0], pair[1]);
            if let Some(camera) = camera_of(to) {
                table.insert(CameraTransition::between(from, from_span, to, to_span, camera));
            }
        }
        table
    }

    /// Insert or replace the transition leaving `transition.from`
    pub fn insert(&mut self, transition: CameraTransition) {
        self.transitions.insert(transition.from, transition);
        self.transitions
            .sort_by(|_, a, _, b| a.release.cmp(&b.release));
    }

    /// Transition leaving `from`
    pub fn outgoing(&self, from: SegmentId) -> Option<&CameraTransition> {
        self.transitions.get(&from)
    }

    /// Transition entering `to`
    pub fn incoming(&self, to: SegmentId) -> Option<&CameraTransition> {
        self.transitions.values().find(|t| t.to == to)
    }

    /// Remove every transition touching `id`, returning them
    pub fn detach(&mut self, id: SegmentId) -> Vec<CameraTransition> {
        let mut removed = Vec::new();
        self.transitions.retain(|_, t| {
            if t.touches(id) {
                removed.push(t.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Recompute the transitions around `id` from its current registry neighbours
    ///
    /// Transitions touching `id` are dropped first, its former neighbours are
    /// reconnected, then `id` is spliced between its new neighbours. Nothing
    /// else is touched.
    pub fn splice<'a>(
        &mut self,
        id: SegmentId,
        registry: &Registry,
        camera_of: impl Fn(SegmentId) -> Option<&'a str>,
    ) {
        let old_prev = self.incoming(id).map(|t| t.from);
        let old_next = self.outgoing(id).map(|t| t.to);
        self.detach(id);

        if let (Some(prev), Some(next)) = (old_prev, old_next) {
            self.connect(prev, next, registry, &camera_of);
        }

        if !registry.contains(id) {
            return;
        }
        let (prev, next) = registry.neighbours(id);
        if let Some(prev) = prev {
            self.connect(prev, id, registry, &camera_of);
        }
        if let Some(next) = next {
            self.connect(id, next, registry, &camera_of);
        }
    }

    fn connect<'a>(
        &mut self,
        from: SegmentId,
        to: SegmentId,
        registry: &Registry,
        camera_of: &impl Fn(SegmentId) -> Option<&'a str>,
    ) {
        // Only registry-adjacent segments get a transition
        if registry.neighbours(from).1 != Some(to) {
            return;
        }
        let (Some(from_span), Some(to_span), Some(camera)) =
            (registry.get(from), registry.get(to), camera_of(to))
        else {
            return;
        };
        tracing::debug!(%from, %to, engage = to_span.start, "spliced camera transition");
        self.insert(CameraTransition::between(from, from_span, to, to_span, camera));
    }

    /// Transitions in timeline order
    pub fn iter(&self) -> impl Iterator<Item = &CameraTransition> {
        self.transitions.values()
    }

    /// Number of transitions
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Whether there are no transitions
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixture {
        ids: Vec<SegmentId>,
        registry: Registry,
        cameras: HashMap<SegmentId, String>,
    }

    fn fixture() -> Fixture {
        let ids: Vec<_> = (0..3).map(|_| SegmentId::new()).collect();
        let mut registry = Registry::new();
        registry.insert(ids[0], FrameSpan::new(1, 11));
        registry.insert(ids[1], FrameSpan::new(15, 20));
        registry.insert(ids[2], FrameSpan::new(24, 32));
        let cameras = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, format!("cam{i}")))
            .collect();
        Fixture {
            ids,
            registry,
            cameras,
        }
    }

    #[test]
    fn test_step_influence() {
        let t = CameraTransition::between(
            SegmentId::new(),
            FrameSpan::new(1, 11),
            SegmentId::new(),
            FrameSpan::new(15, 20),
            "next",
        );
        assert_eq!(t.release, 10);
        assert_eq!(t.engage, 15);
        assert_eq!(t.influence_at(10), 0.0);
        assert_eq!(t.influence_at(14), 0.0);
        assert_eq!(t.influence_at(15), 1.0);
    }

    #[test]
    fn test_from_registry_skips_last() {
        let f = fixture();
        let table = TransitionTable::from_registry(&f.registry, |id| f.cameras.get(&id).map(String::as_str));

        assert_eq!(table.len(), 2);
        assert!(table.outgoing(f.ids[2]).is_none());
        assert_eq!(table.outgoing(f.ids[0]).map(|t| t.target_camera.as_str()), Some("cam1"));
    }

    #[test]
    fn test_splice_after_reorder() {
        let mut f = fixture();
        let cams = f.cameras.clone();
        let camera_of = |id| cams.get(&id).map(String::as_str);
        let mut table = TransitionTable::from_registry(&f.registry, camera_of);

        f.registry.insert(f.ids[1], FrameSpan::new(35, 40));
        table.splice(f.ids[1], &f.registry, camera_of);

        let pairs: Vec<_> = table.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(pairs, vec![(f.ids[0], f.ids[2]), (f.ids[2], f.ids[1])]);
        assert_eq!(table.outgoing(f.ids[2]).map(|t| t.engage), Some(35));
    }

    #[test]
    fn test_splice_after_removal_reconnects() {
        let mut f = fixture();
        let cams = f.cameras.clone();
        let camera_of = |id| cams.get(&id).map(String::as_str);
        let mut table = TransitionTable::from_registry(&f.registry, camera_of);

        f.registry.remove(f.ids[1]);
        table.splice(f.ids[1], &f.registry, camera_of);

        let t = table.outgoing(f.ids[0]).unwrap();
        assert_eq!(t.to, f.ids[2]);
        assert_eq!(t.engage, 24);
        assert_eq!(table.len(), 1);
    }
}
