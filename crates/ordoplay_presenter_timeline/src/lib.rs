// SPDX-License-Identifier: MIT OR Apache-2.0
//! Presentation timeline for OrdoPlay Presenter.
//!
//! This crate composes independently authored animation segments into one
//! master timeline and navigates it slide by slide:
//! - Segment compilation (container and camera resolution, offset strips)
//! - Marker sidecar encoding
//! - Timeline assembly with camera transitions and loop regions
//! - Reconciliation after segments are moved or deleted
//! - Marker-driven playback
//!
//! ## Architecture
//!
//! Data flows one way:
//! `SegmentSource` -> [`SegmentCompiler`] -> [`CompiledSegment`] ->
//! [`Timeline::assemble`] -> [`Timeline`]. The [`ReconciliationEngine`] keeps
//! an assembled timeline consistent under edits and the
//! [`PlaybackController`] moves its playhead.

pub mod compiler;
pub mod error;
pub mod loops;
pub mod marker;
pub mod playback;
pub mod reconcile;
pub mod registry;
pub mod segment;
pub mod settings;
pub mod sidecar;
pub mod source;
pub mod timeline;
pub mod transition;

/// Frame number on a timeline
pub type Frame = i64;

pub use compiler::{
    camera_name_for_index, AmbiguousContainerWarning, CompileOutput, Placement, SegmentCompiler,
};
pub use error::{Result, TimelineError};
pub use loops::LoopTable;
pub use marker::{Marker, MarkerKind, MarkerSet, PlacedMarker};
pub use playback::{Direction, PlaybackController, PlaybackEvent, PlaybackState};
pub use reconcile::{ChangeQueue, ChangeRecord, ReconcileOutcome, ReconciliationEngine, TimelinePatch};
pub use registry::Registry;
pub use segment::{ActionStrip, CompiledSegment, FrameSpan, SegmentDescriptor, SegmentId, StripTarget};
pub use settings::{PresenterSettings, SETTINGS_FILE_NAME, SETTINGS_FORMAT_VERSION};
pub use sidecar::{append_line, Sidecar, SidecarEntry};
pub use source::{Container, Curve, CurveKey, Material, ObjectKind, SceneObject, SegmentSource};
pub use timeline::{SharedTimeline, Timeline};
pub use transition::{CameraTransition, TransitionTable};
