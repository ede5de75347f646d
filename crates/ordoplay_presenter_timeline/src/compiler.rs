// SPDX-License-Identifier: MIT OR Apache-2.0
//! Segment compilation.
//!
//! Turns a raw [`SegmentSource`] into a [`CompiledSegment`]: resolves the
//! animation container and its single camera, renames the camera for its
//! placement index, moves every keyframed curve into an action strip and
//! places the result on the master timeline through one offset.
//!
//! Compilation works on an owned copy of the source. Nothing is returned
//! unless every step succeeds.

use crate::error::{Result, TimelineError};
use crate::marker::{Marker, MarkerKind};
use crate::segment::{ActionStrip, CompiledSegment, SegmentId, StripTarget};
use crate::settings::PresenterSettings;
use crate::sidecar;
use crate::source::{Container, Curve, CurveKey, SceneObject, SegmentSource};
use crate::Frame;
use std::fmt;
use std::path::Path;

/// Where a compiled segment goes on the master timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// End of the previous segment (exclusive), or 1 for the first segment
    pub time: Frame,
    /// Placement index, used for camera naming
    pub index: usize,
    /// Transition gap inserted before every segment but the first
    pub gap: Frame,
}

impl Placement {
    /// Placement of the first segment
    pub fn first(gap: Frame) -> Self {
        Self {
            time: 1,
            index: 0,
            gap,
        }
    }

    /// Placement directly after a segment that ended at `previous_end`
    pub fn after(previous_end: Frame, index: usize, gap: Frame) -> Self {
        Self {
            time: previous_end,
            index,
            gap,
        }
    }

    /// Whether this is the first segment of the timeline
    pub fn is_first(&self) -> bool {
        self.time <= 1
    }

    /// Global frame the segment starts at
    pub fn global_start(&self) -> Frame {
        if self.is_first() {
            self.time
        } else {
            self.time + self.gap
        }
    }
}

/// Camera name for a placement index
///
/// `0` gives the base name, later indices get a zero-padded suffix:
/// `.001`..`.009`, `.010`..`.099`, then `.100` and up without padding.
pub fn camera_name_for_index(base: &str, index: usize) -> String {
    match index {
        0 => base.to_string(),
        1..=9 => format!("{base}.00{index}"),
        10..=99 => format!("{base}.0{index}"),
        _ => format!("{base}.{index}"),
    }
}

/// Several containers existed and none was designated
///
/// The first container holding a camera was used instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousContainerWarning {
    /// Segment the warning belongs to
    pub segment: String,
    /// Every container name found
    pub candidates: Vec<String>,
    /// Container that was used
    pub chosen: String,
}

impl fmt::Display for AmbiguousContainerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segment '{}' has {} containers, used '{}'",
            self.segment,
            self.candidates.len(),
            self.chosen
        )
    }
}

/// Result of compiling one segment
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The compiled segment, already placed
    pub segment: CompiledSegment,
    /// Markers at global coordinates
    pub markers: Vec<Marker>,
    /// Sidecar line for the placed markers
    pub sidecar_line: String,
    /// End of the segment on the master timeline (exclusive)
    pub global_end: Frame,
    /// Recoverable problems
    pub warnings: Vec<AmbiguousContainerWarning>,
}

impl CompileOutput {
    /// Placement for the segment that follows this one
    pub fn next_placement(&self, gap: Frame) -> Placement {
        Placement::after(self.global_end, self.segment.index + 1, gap)
    }
}

/// Compiles raw segment sources
#[derive(Debug, Clone)]
pub struct SegmentCompiler {
    settings: PresenterSettings,
}

impl SegmentCompiler {
    /// Create a compiler using the given settings
    pub fn new(settings: PresenterSettings) -> Self {
        Self { settings }
    }

    /// Settings in use
    pub fn settings(&self) -> &PresenterSettings {
        &self.settings
    }

    /// Load a source file and compile it
    pub fn compile_file(&self, path: &Path, placement: Placement) -> Result<CompileOutput> {
        let source = SegmentSource::load(path)?;
        self.compile(source, placement)
    }

    /// Compile a source at the given placement
    pub fn compile(&self, mut source: SegmentSource, placement: Placement) -> Result<CompileOutput> {
        let (mut container, warning) = self.resolve_container(&mut source)?;

        let camera_idx = single_camera(&source.name, &container)?;
        let camera_name = camera_name_for_index(&self.settings.camera_base_name, placement.index);
        container.objects[camera_idx].name = camera_name.clone();

        let (min, max) = match keyed_range(&source, &container) {
            Some(range) => range,
            None => {
                let camera = &mut container.objects[camera_idx];
                let mut curve = Curve::new("location[0]");
                curve.keys = vec![CurveKey { frame: 1, value: 0.0 }, CurveKey { frame: 2, value: 0.0 }];
                camera.curves.push(curve);
                (1, 2)
            }
        };

        let mut strips = Vec::new();
        for object in container
            .objects
            .iter_mut()
            .chain(source.loose_objects.iter_mut())
            .chain(source.containers.iter_mut().flat_map(|c| c.objects.iter_mut()))
        {
            push_strip(&mut strips, object.name.clone(), StripTarget::Object, &mut object.curves);
        }
        for material in &mut source.materials {
            push_strip(&mut strips, material.name.clone(), StripTarget::Material, &mut material.curves);
        }

        let markers = canonical_markers(&source.name, &source.markers, min, max);

        let mut segment = CompiledSegment {
            id: SegmentId::new(),
            name: source.name.clone(),
            source_path: source.path.clone(),
            container: container.name.clone(),
            camera: camera_name,
            index: placement.index,
            local_origin: min,
            local_end: max - min + 1,
            offset: 0,
            objects: container.objects,
            strips,
            markers: markers.iter().map(|m| m.shifted(1 - min)).collect(),
        };
        segment.place_at(placement.global_start());

        let span = segment.span();
        let global_markers = segment.global_markers();
        let sidecar_line = sidecar::encode_line(&segment.name, &global_markers);

        tracing::debug!(
            segment = %segment.name,
            camera = %segment.camera,
            start = span.start,
            last = span.last(),
            strips = segment.strips.len(),
            "compiled segment"
        );

        Ok(CompileOutput {
            segment,
            markers: global_markers,
            sidecar_line,
            global_end: span.end,
            warnings: warning.into_iter().collect(),
        })
    }

    /// Pick the animation container, removing it from `source`
    fn resolve_container(
        &self,
        source: &mut SegmentSource,
    ) -> Result<(Container, Option<AmbiguousContainerWarning>)> {
        let designated = &self.settings.container_name;

        if source.containers.is_empty() {
            let mut container = Container::new(designated.clone());
            container.objects = std::mem::take(&mut source.loose_objects);
            return Ok((container, None));
        }

        if let Some(idx) = source.containers.iter().position(|c| &c.name == designated) {
            return Ok((source.containers.remove(idx), None));
        }

        if source.containers.len() == 1 {
            let mut container = source.containers.remove(0);
            container.name = designated.clone();
            return Ok((container, None));
        }

        let candidates: Vec<String> = source.containers.iter().map(|c| c.name.clone()).collect();
        let Some(idx) = source.containers.iter().position(|c| c.camera_count() > 0) else {
            return Err(TimelineError::CameraCount {
                segment: source.name.clone(),
                found: 0,
            });
        };

        let mut container = source.containers.remove(idx);
        let warning = AmbiguousContainerWarning {
            segment: source.name.clone(),
            candidates,
            chosen: container.name.clone(),
        };
        tracing::warn!(%warning, "ambiguous animation container");
        container.name = designated.clone();
        Ok((container, Some(warning)))
    }
}

fn single_camera(segment: &str, container: &Container) -> Result<usize> {
    let mut cameras = container
        .objects
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_camera())
        .map(|(i, _)| i);

    match (cameras.next(), cameras.next()) {
        (Some(idx), None) => Ok(idx),
        _ => Err(TimelineError::CameraCount {
            segment: segment.to_string(),
            found: container.camera_count(),
        }),
    }
}

/// First and last keyed frame across every object and material
fn keyed_range(source: &SegmentSource, container: &Container) -> Option<(Frame, Frame)> {
    container
        .objects
        .iter()
        .flat_map(|o: &SceneObject| o.curves.iter())
        .chain(source.curves())
        .filter_map(Curve::frame_range)
        .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
}

fn push_strip(strips: &mut Vec<ActionStrip>, owner: String, target: StripTarget, curves: &mut Vec<Curve>) {
    if curves.is_empty() {
        return;
    }
    strips.push(ActionStrip {
        owner,
        target,
        curves: std::mem::take(curves),
    });
}

/// Authored markers with boundaries at `min` and `max`
///
/// A Boundary or Generic marker on either extreme becomes that boundary. A
/// loop marker already on an extreme takes the boundary's place, so no frame
/// carries two markers. Boundaries come first and last on their frames so the
/// sidecar line decodes back to the same list. Markers outside the keyed range
/// are dropped.
fn canonical_markers(segment: &str, authored: &[Marker], min: Frame, max: Frame) -> Vec<Marker> {
    let mut interior: Vec<Marker> = Vec::with_capacity(authored.len());
    for marker in authored {
        if marker.frame < min || marker.frame > max {
            tracing::warn!(segment, frame = marker.frame, "marker outside keyed range dropped");
            continue;
        }
        let stop = matches!(marker.kind, MarkerKind::Boundary | MarkerKind::Generic);
        if stop && (marker.frame == min || marker.frame == max) {
            continue;
        }
        interior.push(*marker);
    }
    crate::marker::sort_markers(&mut interior);

    let occupied = |frame: Frame| interior.iter().any(|m| m.frame == frame);
    let head = (!occupied(min)).then(|| Marker::boundary(min));
    let tail = (max != min && !occupied(max)).then(|| Marker::boundary(max));

    let mut markers = Vec::with_capacity(interior.len() + 2);
    markers.extend(head);
    markers.extend(interior);
    markers.extend(tail);
    markers
}
