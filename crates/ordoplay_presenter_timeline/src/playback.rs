// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slide-style playback over an assembled timeline.

use crate::marker::MarkerKind;
use crate::timeline::Timeline;
use crate::Frame;
use serde::{Deserialize, Serialize};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Not playing
    #[default]
    Stopped,
    /// Playing towards the end
    PlayingForward,
    /// Playing towards the start
    PlayingBackward,
}

/// Step direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Towards later frames
    Forward,
    /// Towards earlier frames
    Backward,
}

impl Direction {
    /// Frame delta of one step
    pub fn step(self) -> Frame {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }

    /// Playing state moving in this direction
    pub fn playing_state(self) -> PlaybackState {
        match self {
            Self::Forward => PlaybackState::PlayingForward,
            Self::Backward => PlaybackState::PlayingBackward,
        }
    }
}

/// What a playback command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Nothing happened
    Idle,
    /// The playhead moved onto a frame without a marker
    Moved {
        /// New frame
        frame: Frame,
    },
    /// Playback stopped
    Stopped {
        /// Frame the playhead stopped on
        frame: Frame,
        /// Marker that stopped it, `None` at a timeline end
        marker: Option<MarkerKind>,
    },
    /// A loop end sent the playhead back into its loop
    Looped {
        /// Loop end frame
        from: Frame,
        /// Frame after the loop start
        to: Frame,
    },
    /// The playhead jumped without marker evaluation
    Jumped {
        /// New frame
        frame: Frame,
    },
}

/// Playback controller for an assembled timeline
///
/// The playhead lives on the [`Timeline`]; the controller only keeps the
/// playing state.
#[derive(Debug, Clone, Default)]
pub struct PlaybackController {
    state: PlaybackState,
}

impl PlaybackController {
    /// Create a stopped controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Check if playing in either direction
    pub fn is_playing(&self) -> bool {
        self.state != PlaybackState::Stopped
    }

    /// Start playing in `direction` from the current frame
    pub fn play(&mut self, direction: Direction) {
        self.state = direction.playing_state();
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    /// Advance in the current playing direction; does nothing while stopped
    pub fn tick(&mut self, timeline: &mut Timeline) -> PlaybackEvent {
        match self.state {
            PlaybackState::Stopped => PlaybackEvent::Idle,
            PlaybackState::PlayingForward => self.advance(timeline, Direction::Forward),
            PlaybackState::PlayingBackward => self.advance(timeline, Direction::Backward),
        }
    }

    /// Step one frame and evaluate the marker on the new frame
    pub fn advance(&mut self, timeline: &mut Timeline, direction: Direction) -> PlaybackEvent {
        if timeline.is_empty() {
            self.stop();
            return PlaybackEvent::Idle;
        }

        let first = timeline.first_frame();
        let last = timeline.last_frame();
        let target = timeline.current_frame() + direction.step();
        if target < first || target > last {
            let frame = target.clamp(first, last);
            timeline.set_current_frame(frame);
            self.stop();
            return PlaybackEvent::Stopped { frame, marker: None };
        }

        timeline.set_current_frame(target);
        self.evaluate(timeline, target)
    }

    fn evaluate(&mut self, timeline: &mut Timeline, frame: Frame) -> PlaybackEvent {
        let Some(kind) = timeline.markers().at(frame).map(|p| p.marker.kind) else {
            return PlaybackEvent::Moved { frame };
        };

        if kind.stops_playback() {
            self.stop();
            return PlaybackEvent::Stopped {
                frame,
                marker: Some(kind),
            };
        }

        match timeline.loops().get(frame) {
            Some(start) => {
                let to = start + 1;
                timeline.set_current_frame(to);
                tracing::debug!(from = frame, to, "loop");
                PlaybackEvent::Looped { from: frame, to }
            }
            None => {
                tracing::warn!(frame, "loop end without loop start, stopping");
                self.stop();
                PlaybackEvent::Stopped {
                    frame,
                    marker: Some(kind),
                }
            }
        }
    }

    /// Play forward to the next stop, leaving the current loop first
    pub fn next_slide(&mut self, timeline: &mut Timeline) -> PlaybackEvent {
        let event = match timeline.loops().containing(timeline.current_frame()) {
            Some((_, end)) => Self::seek(timeline, end + 1),
            None => PlaybackEvent::Idle,
        };
        self.state = PlaybackState::PlayingForward;
        event
    }

    /// Play backward to the previous stop, leaving the current loop first
    pub fn prev_slide(&mut self, timeline: &mut Timeline) -> PlaybackEvent {
        let event = match timeline.loops().containing(timeline.current_frame()) {
            Some((start, _)) => Self::seek(timeline, start - 1),
            None => PlaybackEvent::Idle,
        };
        self.state = PlaybackState::PlayingBackward;
        event
    }

    /// Stop on the first frame of the timeline
    pub fn jump_to_start(&mut self, timeline: &mut Timeline) -> PlaybackEvent {
        self.stop();
        let first = timeline.first_frame();
        Self::seek(timeline, first)
    }

    /// Stop on the last frame of the timeline
    pub fn jump_to_end(&mut self, timeline: &mut Timeline) -> PlaybackEvent {
        self.stop();
        let last = timeline.last_frame();
        Self::seek(timeline, last)
    }

    fn seek(timeline: &mut Timeline, frame: Frame) -> PlaybackEvent {
        let frame = frame.clamp(timeline.first_frame(), timeline.last_frame());
        timeline.set_current_frame(frame);
        PlaybackEvent::Jumped { frame }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use crate::segment::{CompiledSegment, SegmentId};
    use crate::settings::PresenterSettings;
    use crate::source::{ObjectKind, SceneObject};

    fn timeline(len: Frame, markers: Vec<Marker>) -> Timeline {
        let segment = CompiledSegment {
            id: SegmentId::new(),
            name: "deck".into(),
            source_path: None,
            container: "Component".into(),
            camera: "cam".into(),
            index: 0,
            local_origin: 1,
            local_end: len,
            offset: 0,
            objects: vec![SceneObject::new("cam", ObjectKind::Camera)],
            strips: Vec::new(),
            markers,
        };
        Timeline::assemble(vec![segment], &PresenterSettings::default()).unwrap()
    }

    fn looped() -> Timeline {
        timeline(
            80,
            vec![
                Marker::boundary(1),
                Marker::loop_start(50),
                Marker::loop_end(60),
                Marker::boundary(80),
            ],
        )
    }

    #[test]
    fn test_initial_state() {
        let controller = PlaybackController::new();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(looped().current_frame(), 1);
    }

    #[test]
    fn test_tick_while_stopped_is_idle() {
        let mut tl = looped();
        let mut controller = PlaybackController::new();
        assert_eq!(controller.tick(&mut tl), PlaybackEvent::Idle);
        assert_eq!(tl.current_frame(), 1);
    }

    #[test]
    fn test_loop_end_replays_body() {
        let mut tl = looped();
        tl.set_current_frame(59);
        let mut controller = PlaybackController::new();
        controller.play(Direction::Forward);

        let event = controller.tick(&mut tl);
        assert_eq!(event, PlaybackEvent::Looped { from: 60, to: 51 });
        assert_eq!(tl.current_frame(), 51);
        assert_eq!(controller.state(), PlaybackState::PlayingForward);
    }

    #[test]
    fn test_loop_start_stops() {
        let mut tl = looped();
        tl.set_current_frame(48);
        let mut controller = PlaybackController::new();
        controller.play(Direction::Forward);

        assert_eq!(controller.tick(&mut tl), PlaybackEvent::Moved { frame: 49 });
        assert_eq!(
            controller.tick(&mut tl),
            PlaybackEvent::Stopped {
                frame: 50,
                marker: Some(MarkerKind::LoopStart)
            }
        );
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_next_slide_leaves_loop() {
        let mut tl = looped();
        tl.set_current_frame(55);
        let mut controller = PlaybackController::new();

        assert_eq!(controller.next_slide(&mut tl), PlaybackEvent::Jumped { frame: 61 });
        assert_eq!(controller.state(), PlaybackState::PlayingForward);
    }

    #[test]
    fn test_prev_slide_leaves_loop() {
        let mut tl = looped();
        tl.set_current_frame(55);
        let mut controller = PlaybackController::new();

        assert_eq!(controller.prev_slide(&mut tl), PlaybackEvent::Jumped { frame: 49 });
        assert_eq!(controller.state(), PlaybackState::PlayingBackward);

        tl.set_current_frame(3);
        controller.stop();
        assert_eq!(controller.prev_slide(&mut tl), PlaybackEvent::Idle);
        assert_eq!(
            controller.tick(&mut tl),
            PlaybackEvent::Moved { frame: 2 }
        );
        assert_eq!(
            controller.tick(&mut tl),
            PlaybackEvent::Stopped {
                frame: 1,
                marker: Some(MarkerKind::Boundary)
            }
        );
    }

    #[test]
    fn test_jumps_skip_marker_evaluation() {
        let mut tl = looped();
        let mut controller = PlaybackController::new();
        controller.next_slide(&mut tl);

        assert_eq!(controller.jump_to_end(&mut tl), PlaybackEvent::Jumped { frame: 80 });
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.jump_to_start(&mut tl), PlaybackEvent::Jumped { frame: 1 });
    }

    #[test]
    fn test_clamps_at_timeline_end() {
        let mut tl = timeline(5, vec![Marker::boundary(1)]);
        tl.set_current_frame(5);
        let mut controller = PlaybackController::new();
        controller.next_slide(&mut tl);

        assert_eq!(
            controller.tick(&mut tl),
            PlaybackEvent::Stopped {
                frame: 5,
                marker: None
            }
        );
        assert_eq!(tl.current_frame(), 5);
    }

    #[test]
    fn test_empty_timeline() {
        let mut tl = Timeline::new();
        let mut controller = PlaybackController::new();
        assert_eq!(controller.advance(&mut tl, Direction::Forward), PlaybackEvent::Idle);
    }
}
