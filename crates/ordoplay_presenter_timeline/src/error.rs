// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy for the presentation timeline.

use crate::segment::SegmentId;
use crate::Frame;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling, assembling or loading a presentation
#[derive(Debug, Error)]
pub enum TimelineError {
    /// A segment must contain exactly one camera
    #[error("segment '{segment}' has {found} cameras, expected exactly 1")]
    CameraCount {
        /// Source name of the offending segment
        segment: String,
        /// Number of cameras found in the resolved container
        found: usize,
    },

    /// Segment source file is missing
    #[error("segment source not found: {path:?}")]
    SourceNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Sidecar marker file could not be decoded
    #[error("sidecar corrupt at line {line}: {reason}")]
    SidecarCorrupt {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A LoopEnd marker has no LoopStart to pair with
    #[error("loop end at frame {frame} has no preceding loop start")]
    UnmatchedLoopEnd {
        /// Frame of the LoopEnd marker
        frame: Frame,
    },

    /// A move would put a segment outside the representable frame range
    #[error("frame {frame} is out of range")]
    FrameOutOfRange {
        /// Requested start frame
        frame: Frame,
    },

    /// Segment is not part of the timeline
    #[error("segment not found: {0:?}")]
    SegmentNotFound(SegmentId),

    /// Another assembly is running against the same timeline
    #[error("timeline assembly already in progress")]
    AssemblyInProgress,

    /// Assembly was requested with no segments
    #[error("cannot assemble a timeline from zero segments")]
    EmptyAssembly,

    /// Settings are out of range
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;

impl TimelineError {
    /// Build a sidecar error for a line
    pub fn sidecar(line: usize, reason: impl Into<String>) -> Self {
        Self::SidecarCorrupt {
            line,
            reason: reason.into(),
        }
    }
}
