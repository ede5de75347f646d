// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host commands.
//!
//! Each line of a command script is one command:
//!
//! ```text
//! compile slides/intro.ron     # compile at the next placement
//! compile slides/extra.ron 200 7
//! assemble
//! move intro.ron 35            # segment by name or timeline position
//! reconcile
//! recalculate                  # rebuild every camera transition
//! restore                      # reload from the sidecar and saved segments
//! advance forward
//! play backward 500
//! next | prev | start | end
//! delete 1
//! reset
//! status
//! ```

use ordoplay_presenter_timeline::{Direction, Frame};
use std::path::PathBuf;
use std::str::FromStr;

/// Default tick limit for `play`
pub const DEFAULT_PLAY_LIMIT: usize = 100_000;

/// Error type for command parsing
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Empty line
    #[error("empty command")]
    Empty,

    /// Unknown command word
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// Missing argument
    #[error("'{command}' needs {what}")]
    MissingArgument {
        /// Command word
        command: &'static str,
        /// Description of the missing argument
        what: &'static str,
    },

    /// Invalid argument
    #[error("invalid argument '{0}'")]
    InvalidArgument(String),
}

/// Reference to a placed segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentRef {
    /// Position in timeline order, starting at 0
    Index(usize),
    /// Segment name
    Name(String),
}

impl FromStr for SegmentRef {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(s.to_string()),
        })
    }
}

/// A command issued by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Compile a segment source
    Compile {
        /// Source file
        path: PathBuf,
        /// Explicit placement time, otherwise after the last compiled segment
        time: Option<Frame>,
        /// Explicit placement index
        index: Option<usize>,
    },
    /// Assemble every compiled segment
    Assemble,
    /// Report that a segment now starts at `start` and reconcile
    Move {
        /// Segment that moved
        segment: SegmentRef,
        /// Observed start frame
        start: Frame,
    },
    /// Drain pending change records
    Reconcile,
    /// Rebuild the whole camera transition table
    Recalculate,
    /// Rebuild the presentation from its output directory
    Restore,
    /// Step one frame
    Advance(Direction),
    /// Tick until playback stops
    Play {
        /// Direction to play in
        direction: Direction,
        /// Maximum number of ticks
        limit: usize,
    },
    /// Next slide
    Next,
    /// Previous slide
    Prev,
    /// Jump to the first frame
    Start,
    /// Jump to the last frame
    End,
    /// Delete a segment
    Delete(SegmentRef),
    /// Clear the timeline
    Reset,
    /// Report the current state
    Status,
}

fn parse_direction(word: Option<&str>) -> Result<Direction, CommandError> {
    match word {
        None | Some("forward" | "f") => Ok(Direction::Forward),
        Some("backward" | "b") => Ok(Direction::Backward),
        Some(other) => Err(CommandError::InvalidArgument(other.to_string())),
    }
}

fn parse_number<T: FromStr>(word: &str) -> Result<T, CommandError> {
    word.parse()
        .map_err(|_| CommandError::InvalidArgument(word.to_string()))
}

impl FromStr for HostCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.split('#').next().unwrap_or_default();
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(CommandError::Empty);
        };

        let cmd = match command.to_ascii_lowercase().as_str() {
            "compile" => {
                let path = words.next().ok_or(CommandError::MissingArgument {
                    command: "compile",
                    what: "a source path",
                })?;
                Self::Compile {
                    path: PathBuf::from(path),
                    time: words.next().map(parse_number).transpose()?,
                    index: words.next().map(parse_number).transpose()?,
                }
            }
            "assemble" => Self::Assemble,
            "move" => {
                let (Some(segment), Some(start)) = (words.next(), words.next()) else {
                    return Err(CommandError::MissingArgument {
                        command: "move",
                        what: "a segment and a start frame",
                    });
                };
                Self::Move {
                    segment: segment.parse()?,
                    start: parse_number(start)?,
                }
            }
            "reconcile" => Self::Reconcile,
            "recalculate" => Self::Recalculate,
            "restore" => Self::Restore,
            "advance" | "step" => Self::Advance(parse_direction(words.next())?),
            "play" => Self::Play {
                direction: parse_direction(words.next())?,
                limit: words
                    .next()
                    .map(parse_number)
                    .transpose()?
                    .unwrap_or(DEFAULT_PLAY_LIMIT),
            },
            "next" => Self::Next,
            "prev" => Self::Prev,
            "start" => Self::Start,
            "end" => Self::End,
            "delete" => {
                let segment = words.next().ok_or(CommandError::MissingArgument {
                    command: "delete",
                    what: "a segment",
                })?;
                Self::Delete(segment.parse()?)
            }
            "reset" => Self::Reset,
            "status" => Self::Status,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        if let Some(extra) = words.next() {
            return Err(CommandError::InvalidArgument(extra.to_string()));
        }
        Ok(cmd)
    }
}
