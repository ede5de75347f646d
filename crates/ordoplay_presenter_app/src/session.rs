// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host session for one open presentation.
//!
//! The session owns the shared timeline, the reconciliation engine and the
//! playback controller, and dispatches [`HostCommand`]s to them.
//!
//! With an output directory the session keeps the presentation on disk: every
//! compile appends its sidecar line and saves the compiled segment next to it,
//! assembly follows the sidecar's order, and every edit rewrites both. A
//! presentation can later be restored from that directory alone.

use crate::commands::{HostCommand, SegmentRef};
use ordoplay_presenter_timeline::{
    append_line, AmbiguousContainerWarning, ChangeRecord, CompiledSegment, Direction, Frame,
    Placement, PlaybackController, PlaybackEvent, PlaybackState, PresenterSettings,
    ReconcileOutcome, ReconciliationEngine, SegmentCompiler, SegmentId, SharedTimeline, Sidecar,
    Timeline, TimelineError,
};
use std::fmt;
use std::path::{Path, PathBuf};

/// Error type for session commands
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Timeline operation failed
    #[error(transparent)]
    Timeline(#[from] TimelineError),

    /// Segment reference did not resolve
    #[error("no segment {0}")]
    UnknownSegment(String),

    /// Assemble was requested before anything was compiled
    #[error("nothing compiled yet")]
    NothingCompiled,

    /// Restore was requested without an output directory
    #[error("no output directory configured")]
    NoOutputDirectory,
}

/// Result of a session command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A segment was compiled
    Compiled {
        /// Segment name
        name: String,
        /// Canonical camera
        camera: String,
        /// Global span as first and last frame
        frames: (Frame, Frame),
        /// Recoverable problems
        warnings: Vec<AmbiguousContainerWarning>,
    },
    /// The timeline was assembled
    Assembled {
        /// Number of segments
        segments: usize,
        /// Last frame of the timeline
        last_frame: Frame,
        /// Where the sidecar was written
        sidecar: Option<PathBuf>,
    },
    /// Change records were drained
    Reconciled(Vec<ReconcileOutcome>),
    /// Camera transitions were rebuilt
    Recalculated {
        /// Number of transitions
        transitions: usize,
    },
    /// Playback command result
    Playback {
        /// What the last step did
        event: PlaybackEvent,
        /// Playhead afterwards
        frame: Frame,
        /// State afterwards
        state: PlaybackState,
    },
    /// The timeline was cleared
    Reset,
    /// Current state
    Status(Status),
}

/// Snapshot of the session state
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    /// Compiled but not necessarily assembled segments
    pub compiled: usize,
    /// Segments on the timeline, in order, with first and last frame
    pub segments: Vec<(String, Frame, Frame)>,
    /// Loop regions as `(start, end)`
    pub loops: Vec<(Frame, Frame)>,
    /// Camera transitions as `(from, to, release, engage)`
    pub transitions: Vec<(String, String, Frame, Frame)>,
    /// Playhead
    pub frame: Frame,
    /// Segment under the playhead
    pub segment: Option<String>,
    /// Playback state
    pub state: PlaybackState,
    /// Camera in focus at the playhead
    pub camera: Option<String>,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compiled {
                name,
                camera,
                frames,
                warnings,
            } => {
                write!(f, "compiled {name} as '{camera}' at {}..={}", frames.0, frames.1)?;
                for warning in warnings {
                    write!(f, "\n  warning: {warning}")?;
                }
                Ok(())
            }
            Self::Assembled {
                segments,
                last_frame,
                sidecar,
            } => {
                write!(f, "assembled {segments} segments, last frame {last_frame}")?;
                if let Some(path) = sidecar {
                    write!(f, ", markers in {}", path.display())?;
                }
                Ok(())
            }
            Self::Reconciled(outcomes) => {
                write!(f, "reconciled {} change(s)", outcomes.len())?;
                for outcome in outcomes {
                    write!(f, "\n  {outcome:?}")?;
                }
                Ok(())
            }
            Self::Playback {
                event,
                frame,
                state,
            } => write!(f, "frame {frame} {state:?} ({event:?})"),
            Self::Recalculated { transitions } => {
                write!(f, "rebuilt {transitions} camera transition(s)")
            }
            Self::Reset => write!(f, "timeline reset"),
            Self::Status(status) => {
                write!(
                    f,
                    "frame {} {:?} in {}, camera {}, {} compiled",
                    status.frame,
                    status.state,
                    status.segment.as_deref().unwrap_or("-"),
                    status.camera.as_deref().unwrap_or("-"),
                    status.compiled
                )?;
                for (name, first, last) in &status.segments {
                    write!(f, "\n  {name}: {first}..={last}")?;
                }
                for (start, end) in &status.loops {
                    write!(f, "\n  loop {start}..{end}")?;
                }
                for (from, to, release, engage) in &status.transitions {
                    write!(f, "\n  {from} -> {to}: {release}..{engage}")?;
                }
                Ok(())
            }
        }
    }
}

/// One open presentation
pub struct Session {
    compiler: SegmentCompiler,
    timeline: SharedTimeline,
    engine: ReconciliationEngine,
    playback: PlaybackController,
    compiled: Vec<CompiledSegment>,
    next_placement: Placement,
    output_dir: Option<PathBuf>,
}

impl Session {
    /// Create a session with an empty timeline
    pub fn new(settings: PresenterSettings) -> Self {
        let gap = settings.gap_frames();
        Self {
            compiler: SegmentCompiler::new(settings),
            timeline: SharedTimeline::new(),
            engine: ReconciliationEngine::new(),
            playback: PlaybackController::new(),
            compiled: Vec::new(),
            next_placement: Placement::first(gap),
            output_dir: None,
        }
    }

    /// Keep the sidecar and compiled segments of the presentation in `dir`
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Sidecar file in the output directory
    pub fn sidecar_path(&self) -> Option<PathBuf> {
        let dir = self.output_dir.as_ref()?;
        Some(dir.join(&self.settings().sidecar_file_name))
    }

    fn segment_path(&self, name: &str) -> Option<PathBuf> {
        let dir = self.output_dir.as_ref()?;
        let stem = Path::new(name)
            .file_stem()
            .map_or_else(|| name.into(), |s| s.to_string_lossy());
        Some(dir.join(format!("{stem}.segment.ron")))
    }

    /// Settings in use
    pub fn settings(&self) -> &PresenterSettings {
        self.compiler.settings()
    }

    /// Compiled segments in compile order
    pub fn compiled(&self) -> &[CompiledSegment] {
        &self.compiled
    }

    /// Run one command
    pub fn execute(&mut self, command: HostCommand) -> Result<Reply, SessionError> {
        tracing::debug!(?command, "executing");
        match command {
            HostCommand::Compile { path, time, index } => self.compile(&path, time, index),
            HostCommand::Assemble => self.assemble(),
            HostCommand::Move { segment, start } => {
                let id = self.resolve(&segment)?;
                self.engine.enqueue(ChangeRecord::Moved {
                    id,
                    observed_start: start,
                });
                self.reconcile()
            }
            HostCommand::Reconcile => self.reconcile(),
            HostCommand::Recalculate => {
                let transitions = self.timeline.write().recalculate_transitions();
                self.after_edit()?;
                Ok(Reply::Recalculated { transitions })
            }
            HostCommand::Restore => self.restore(),
            HostCommand::Advance(direction) => {
                Ok(self.playback_step(|p, t| p.advance(t, direction)))
            }
            HostCommand::Play { direction, limit } => Ok(self.play(direction, limit)),
            HostCommand::Next => Ok(self.playback_step(PlaybackController::next_slide)),
            HostCommand::Prev => Ok(self.playback_step(PlaybackController::prev_slide)),
            HostCommand::Start => Ok(self.playback_step(PlaybackController::jump_to_start)),
            HostCommand::End => Ok(self.playback_step(PlaybackController::jump_to_end)),
            HostCommand::Delete(segment) => {
                let id = self.resolve(&segment)?;
                self.engine.enqueue(ChangeRecord::Deleted { id });
                let outcomes = self.engine.drain(&self.timeline);
                self.compiled.retain(|s| s.id != id);
                self.after_edit()?;
                Ok(Reply::Reconciled(outcomes))
            }
            HostCommand::Reset => {
                self.reset();
                Ok(Reply::Reset)
            }
            HostCommand::Status => Ok(Reply::Status(self.status())),
        }
    }

    /// Parse and run one script line
    ///
    /// Blank and comment-only lines return `None`.
    pub fn execute_line(&mut self, line: &str) -> Option<anyhow::Result<Reply>> {
        match line.parse::<HostCommand>() {
            Err(crate::commands::CommandError::Empty) => None,
            Err(err) => Some(Err(err.into())),
            Ok(command) => Some(self.execute(command).map_err(Into::into)),
        }
    }

    /// Compile a source at the next placement, or at an explicit one
    pub fn compile(
        &mut self,
        path: &Path,
        time: Option<Frame>,
        index: Option<usize>,
    ) -> Result<Reply, SessionError> {
        let gap = self.settings().gap_frames();
        let placement = Placement {
            time: time.unwrap_or(self.next_placement.time),
            index: index.unwrap_or(self.next_placement.index),
            gap,
        };

        let out = self.compiler.compile_file(path, placement)?;
        self.next_placement = out.next_placement(gap);

        if let (Some(sidecar), Some(segment_path)) =
            (self.sidecar_path(), self.segment_path(&out.segment.name))
        {
            if self.compiled.is_empty() {
                Sidecar::new().save(&sidecar)?;
            }
            append_line(&sidecar, &out.sidecar_line)?;
            out.segment.save(&segment_path)?;
        }

        let span = out.segment.span();
        let reply = Reply::Compiled {
            name: out.segment.name.clone(),
            camera: out.segment.camera.clone(),
            frames: (span.start, span.last()),
            warnings: out.warnings,
        };
        self.compiled.push(out.segment);
        Ok(reply)
    }

    /// Assemble every compiled segment and write the sidecar
    ///
    /// When the sidecar exists it is validated first and decides the order.
    pub fn assemble(&mut self) -> Result<Reply, SessionError> {
        if self.compiled.is_empty() {
            return Err(SessionError::NothingCompiled);
        }
        let segments = match self.sidecar_path() {
            Some(path) if path.exists() => self.order_by_sidecar(&Sidecar::load(&path)?),
            _ => self.compiled.clone(),
        };
        self.timeline.assemble(segments, self.compiler.settings())?;
        self.playback.stop();
        self.after_edit()?;

        let timeline = self.timeline.read();
        self.next_placement = Placement::after(
            timeline.last_frame() + 1,
            self.compiled.len(),
            self.compiler.settings().gap_frames(),
        );
        Ok(Reply::Assembled {
            segments: timeline.registry().len(),
            last_frame: timeline.last_frame(),
            sidecar: self.sidecar_path(),
        })
    }

    /// Rebuild the presentation from the sidecar and the saved segments
    ///
    /// Every sidecar line must have a saved segment whose markers have the
    /// same shape, otherwise the sidecar is reported as corrupt.
    pub fn restore(&mut self) -> Result<Reply, SessionError> {
        let path = self.sidecar_path().ok_or(SessionError::NoOutputDirectory)?;
        let sidecar = Sidecar::load(&path)?;

        let mut segments = Vec::with_capacity(sidecar.entries().len());
        for (i, entry) in sidecar.entries().iter().enumerate() {
            let segment_path = self
                .segment_path(&entry.name)
                .ok_or(SessionError::NoOutputDirectory)?;
            if !segment_path.exists() {
                return Err(TimelineError::SourceNotFound { path: segment_path }.into());
            }
            let segment = CompiledSegment::load(&segment_path)?;

            let offset = entry
                .markers
                .first()
                .zip(segment.markers.first())
                .and_then(|(e, s)| e.frame.checked_sub(s.frame));
            let same_shape = entry.markers.len() == segment.markers.len()
                && entry
                    .markers
                    .iter()
                    .zip(&segment.markers)
                    .all(|(e, s)| e.kind == s.kind && e.frame.checked_sub(s.frame) == offset);
            if !same_shape {
                return Err(TimelineError::sidecar(
                    i + 1,
                    format!("markers of '{}' do not match its compiled segment", entry.name),
                )
                .into());
            }
            segments.push(segment);
        }

        tracing::info!(?path, segments = segments.len(), "restoring presentation");
        self.reset();
        self.compiled = segments;
        self.assemble()
    }

    /// Clear the timeline and forget compiled segments
    pub fn reset(&mut self) {
        self.timeline.write().reset();
        self.playback.stop();
        self.compiled.clear();
        self.next_placement = Placement::first(self.settings().gap_frames());
    }

    /// Current state
    pub fn status(&self) -> Status {
        let timeline = self.timeline.read();
        let frame = timeline.current_frame();
        let name_of = |id: SegmentId| timeline.segment(id).map(|s| s.name.clone()).unwrap_or_default();
        Status {
            compiled: self.compiled.len(),
            segments: timeline
                .segments()
                .map(|s| {
                    let span = s.span();
                    (s.name.clone(), span.start, span.last())
                })
                .collect(),
            loops: timeline.loops().iter().map(|(end, start)| (start, end)).collect(),
            transitions: timeline
                .transitions()
                .iter()
                .map(|t| (name_of(t.from), name_of(t.to), t.release, t.engage))
                .collect(),
            frame,
            segment: timeline.registry().segment_at(frame).map(name_of),
            state: self.playback.state(),
            camera: timeline.active_camera_at(frame).map(str::to_string),
        }
    }

    fn reconcile(&mut self) -> Result<Reply, SessionError> {
        let outcomes = self.engine.drain(&self.timeline);
        self.after_edit()?;
        Ok(Reply::Reconciled(outcomes))
    }

    /// Take placed segments back from the timeline and rewrite the files
    fn after_edit(&mut self) -> Result<(), SessionError> {
        let timeline = self.timeline.read();
        for segment in &mut self.compiled {
            if let Some(placed) = timeline.segment(segment.id) {
                segment.clone_from(placed);
            }
        }

        let Some(path) = self.sidecar_path() else {
            return Ok(());
        };
        // Compiled but not assembled yet: the compile lines stay
        if timeline.is_empty() && !self.compiled.is_empty() {
            return Ok(());
        }
        timeline.sidecar().save(&path)?;
        for segment in timeline.segments() {
            if let Some(segment_path) = self.segment_path(&segment.name) {
                segment.save(&segment_path)?;
            }
        }
        Ok(())
    }

    fn order_by_sidecar(&self, sidecar: &Sidecar) -> Vec<CompiledSegment> {
        let mut remaining: Vec<&CompiledSegment> = self.compiled.iter().collect();
        let mut ordered = Vec::with_capacity(remaining.len());
        for entry in sidecar.entries() {
            match remaining.iter().position(|s| s.name == entry.name) {
                Some(idx) => ordered.push(remaining.remove(idx).clone()),
                None => tracing::warn!(segment = %entry.name, "sidecar line without a compiled segment"),
            }
        }
        for segment in remaining {
            tracing::warn!(segment = %segment.name, "compiled segment missing from the sidecar, placed last");
            ordered.push(segment.clone());
        }
        ordered
    }

    fn play(&mut self, direction: Direction, limit: usize) -> Reply {
        let mut timeline = self.timeline.write();
        self.playback.play(direction);

        let mut event = PlaybackEvent::Idle;
        for _ in 0..limit {
            event = self.playback.tick(&mut timeline);
            if !self.playback.is_playing() {
                break;
            }
        }
        if self.playback.is_playing() {
            tracing::warn!(limit, frame = timeline.current_frame(), "play stopped at tick limit");
            self.playback.stop();
        }
        Reply::Playback {
            event,
            frame: timeline.current_frame(),
            state: self.playback.state(),
        }
    }

    fn playback_step(
        &mut self,
        step: impl FnOnce(&mut PlaybackController, &mut Timeline) -> PlaybackEvent,
    ) -> Reply {
        let mut timeline = self.timeline.write();
        let event = step(&mut self.playback, &mut timeline);
        Reply::Playback {
            event,
            frame: timeline.current_frame(),
            state: self.playback.state(),
        }
    }

    fn resolve(&self, segment: &SegmentRef) -> Result<SegmentId, SessionError> {
        let timeline = self.timeline.read();
        let id = match segment {
            SegmentRef::Index(index) => timeline.registry().get_index(*index).map(|(id, _)| id),
            SegmentRef::Name(name) => timeline.segment_by_name(name).map(|s| s.id),
        };
        id.ok_or_else(|| {
            SessionError::UnknownSegment(match segment {
                SegmentRef::Index(index) => format!("at position {index}"),
                SegmentRef::Name(name) => format!("named '{name}'"),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_presenter_timeline::{
        Container, Curve, Marker, MarkerKind, ObjectKind, SceneObject, SegmentSource,
    };

    fn write_source(dir: &Path, name: &str, frames: Frame, markers: Vec<Marker>) -> PathBuf {
        let mut curve = Curve::new("location[0]");
        curve.insert_key(1, 0.0);
        curve.insert_key(frames, 1.0);
        let mut container = Container::new("Component");
        container
            .objects
            .push(SceneObject::new("Camera", ObjectKind::Camera).with_curve(curve));

        let mut source = SegmentSource::new(name);
        source.containers.push(container);
        source.markers = markers;
        let path = dir.join(name);
        source.save(&path).unwrap();
        path
    }

    fn session(dir: &Path) -> Session {
        let settings = PresenterSettings {
            fps: 1,
            transition_time: 4.0,
            ..Default::default()
        };
        let mut session = Session::new(settings).with_output_dir(dir.join("out"));
        for (name, frames) in [("a.ron", 10), ("b.ron", 5), ("c.ron", 8)] {
            let path = write_source(dir, name, frames, Vec::new());
            session.compile(&path, None, None).unwrap();
        }
        session
    }

    fn run(session: &mut Session, line: &str) -> Reply {
        session.execute_line(line).unwrap().unwrap()
    }

    #[test]
    fn test_compile_chains_placements() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());

        let starts: Vec<_> = session.compiled().iter().map(|s| s.span().start).collect();
        assert_eq!(starts, vec![1, 15, 24]);
        assert_eq!(session.compiled()[2].camera, "=> CAMERA.002");
    }

    fn read_sidecar(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("out").join("markers.txt")).unwrap()
    }

    #[test]
    fn test_compile_saves_segments_and_sidecar_lines() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());

        assert_eq!(read_sidecar(dir.path()), "a.ron:1;10;\nb.ron:15;19;\nc.ron:24;31;\n");
        let saved = CompiledSegment::load(&dir.path().join("out").join("b.segment.ron")).unwrap();
        assert_eq!(saved.camera, "=> CAMERA.001");
        assert_eq!(saved.span().start, 15);
        assert_eq!(saved.id, session.compiled()[1].id);
    }

    #[test]
    fn test_first_compile_starts_a_fresh_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("markers.txt"), "old.ron:1;4;\n").unwrap();

        session(dir.path());
        assert!(!read_sidecar(dir.path()).contains("old.ron"));
    }

    #[test]
    fn test_assemble_rejects_corrupt_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        std::fs::write(dir.path().join("out").join("markers.txt"), "a.ron:1;10;\nb.ron 15 19\n").unwrap();

        let err = session.assemble().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Timeline(TimelineError::SidecarCorrupt { line: 2, .. })
        ));
        assert!(session.status().segments.is_empty());
    }

    #[test]
    fn test_assemble_follows_sidecar_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        std::fs::write(
            dir.path().join("out").join("markers.txt"),
            "c.ron:24;31;\na.ron:1;10;\ngone.ron:40;44;\n",
        )
        .unwrap();

        run(&mut session, "assemble");
        let names: Vec<_> = session.status().segments.into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, vec!["c.ron", "a.ron", "b.ron"]);
        assert_eq!(read_sidecar(dir.path()), "c.ron:1;8;\na.ron:13;22;\nb.ron:27;31;\n");
    }

    #[test]
    fn test_sidecar_rewritten_after_move_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        run(&mut session, "assemble");

        run(&mut session, "move b.ron 35");
        assert_eq!(read_sidecar(dir.path()), "a.ron:1;10;\nc.ron:24;31;\nb.ron:35;39;\n");
        let saved = CompiledSegment::load(&dir.path().join("out").join("b.segment.ron")).unwrap();
        assert_eq!(saved.span().start, 35);

        run(&mut session, "delete a.ron");
        assert_eq!(read_sidecar(dir.path()), "c.ron:24;31;\nb.ron:35;39;\n");
        assert_eq!(session.compiled()[1].span().start, 35);

        run(&mut session, "delete c.ron");
        run(&mut session, "delete b.ron");
        assert_eq!(read_sidecar(dir.path()), "");
    }

    #[test]
    fn test_restore_rebuilds_presentation() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = session(dir.path());
        run(&mut first, "assemble");
        run(&mut first, "move b.ron 35");

        let mut restored = Session::new(first.settings().clone()).with_output_dir(dir.path().join("out"));
        let reply = run(&mut restored, "restore");
        assert!(matches!(reply, Reply::Assembled { segments: 3, last_frame: 31, .. }));

        let status = restored.status();
        assert_eq!(
            status.segments,
            vec![
                ("a.ron".to_string(), 1, 10),
                ("c.ron".to_string(), 15, 22),
                ("b.ron".to_string(), 27, 31),
            ]
        );
        assert_eq!(status.segment.as_deref(), Some("a.ron"));
        assert_eq!(restored.compiled().len(), 3);
    }

    #[test]
    fn test_restore_rejects_mismatched_markers() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        run(&mut session, "assemble");
        std::fs::write(
            dir.path().join("out").join("markers.txt"),
            "a.ron:1;5;10;\nb.ron:15;19;\nc.ron:24;31;\n",
        )
        .unwrap();

        let err = session.restore().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Timeline(TimelineError::SidecarCorrupt { line: 1, .. })
        ));
    }

    #[test]
    fn test_restore_needs_saved_segments() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        std::fs::remove_file(dir.path().join("out").join("c.segment.ron")).unwrap();

        let err = session.restore().unwrap_err();
        assert!(matches!(err, SessionError::Timeline(TimelineError::SourceNotFound { .. })));

        let mut detached = Session::new(PresenterSettings::default());
        assert!(matches!(detached.restore(), Err(SessionError::NoOutputDirectory)));
    }

    #[test]
    fn test_recalculate_after_moves() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        run(&mut session, "assemble");
        run(&mut session, "move b.ron 35");
        run(&mut session, "move a.ron 50");
        let spliced = session.status().transitions;

        let reply = run(&mut session, "recalculate");
        assert_eq!(reply, Reply::Recalculated { transitions: 2 });

        let rebuilt = session.status().transitions;
        assert_eq!(rebuilt, spliced);
        let pairs: Vec<_> = rebuilt.iter().map(|(from, to, _, _)| (from.as_str(), to.as_str())).collect();
        assert_eq!(pairs, vec![("c.ron", "b.ron"), ("b.ron", "a.ron")]);
        assert_eq!(rebuilt[1].3, 50);
    }

    #[test]
    fn test_assemble_writes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());

        let reply = run(&mut session, "assemble");
        assert!(matches!(reply, Reply::Assembled { segments: 3, last_frame: 31, .. }));

        assert_eq!(read_sidecar(dir.path()), "a.ron:1;10;\nb.ron:15;19;\nc.ron:24;31;\n");
    }

    #[test]
    fn test_navigation_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        run(&mut session, "assemble");

        let reply = run(&mut session, "next");
        assert!(matches!(reply, Reply::Playback { state: PlaybackState::PlayingForward, .. }));

        let reply = run(&mut session, "play forward");
        assert_eq!(
            reply,
            Reply::Playback {
                event: PlaybackEvent::Stopped {
                    frame: 10,
                    marker: Some(MarkerKind::Boundary)
                },
                frame: 10,
                state: PlaybackState::Stopped,
            }
        );

        run(&mut session, "end");
        let Reply::Status(status) = run(&mut session, "status") else {
            panic!("expected status");
        };
        assert_eq!(status.frame, 31);
        assert_eq!(status.segment.as_deref(), Some("c.ron"));
        assert_eq!(status.camera.as_deref(), Some("=> CAMERA.002"));
    }

    #[test]
    fn test_move_and_delete_by_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        run(&mut session, "assemble");

        let reply = run(&mut session, "move b.ron 35");
        assert!(matches!(
            reply,
            Reply::Reconciled(ref outcomes) if matches!(outcomes[..], [ReconcileOutcome::Applied { delta: 20, .. }])
        ));

        // Position 1 is now c.ron
        run(&mut session, "delete 1");
        let status = session.status();
        let names: Vec<_> = status.segments.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.ron", "b.ron"]);
        assert_eq!(session.compiled().len(), 2);
    }

    #[test]
    fn test_errors_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());

        assert!(session.execute_line("   ").is_none());
        assert!(session.execute_line("fly").unwrap().is_err());
        assert!(session.execute_line("move z.ron 4").unwrap().is_err());
        run(&mut session, "reconcile");
        assert_eq!(read_sidecar(dir.path()), "a.ron:1;10;\nb.ron:15;19;\nc.ron:24;31;\n");

        run(&mut session, "assemble");
        assert_eq!(run(&mut session, "reset"), Reply::Reset);
        assert!(session.status().segments.is_empty());
        assert!(matches!(session.assemble(), Err(SessionError::NothingCompiled)));
    }
}
