// SPDX-License-Identifier: MIT OR Apache-2.0
//! Line-oriented marker sidecar.
//!
//! One line per segment: the segment name, a colon, then one `kind-frame;`
//! token per marker in frame order. Loop starts are prefixed `LS-`, loop ends
//! `LE-`; every other marker is written as a bare frame.
//!
//! ```text
//! intro.ron:1;LS-4;LE-8;10;
//! ```
//!
//! Bare tokens do not say whether they are boundaries. A bare token at either
//! end of a line decodes as [`MarkerKind::Boundary`], anywhere else as
//! [`MarkerKind::Generic`]. Lists produced by the compiler always follow that
//! shape, so they survive a round trip unchanged.

use crate::error::{Result, TimelineError};
use crate::loops::LoopTable;
use crate::marker::{Marker, MarkerKind};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

const LOOP_START_PREFIX: &str = "LS-";
const LOOP_END_PREFIX: &str = "LE-";

/// Encode one segment's markers as a sidecar line (without the newline)
pub fn encode_line(name: &str, markers: &[Marker]) -> String {
    let mut sorted = markers.to_vec();
    crate::marker::sort_markers(&mut sorted);

    let mut line = String::with_capacity(name.len() + 1 + sorted.len() * 6);
    line.push_str(name);
    line.push(':');
    for marker in &sorted {
        match marker.kind {
            MarkerKind::LoopStart => line.push_str(LOOP_START_PREFIX),
            MarkerKind::LoopEnd => line.push_str(LOOP_END_PREFIX),
            MarkerKind::Boundary | MarkerKind::Generic => {}
        }
        // Writing to a String cannot fail
        let _ = write!(line, "{};", marker.frame);
    }
    line
}

/// Decode a sidecar line into the segment name and its markers
///
/// `line_no` is only used for error reporting.
pub fn decode_line(line: &str, line_no: usize) -> Result<(String, Vec<Marker>)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some((name, body)) = line.rsplit_once(':') else {
        return Err(TimelineError::sidecar(line_no, "missing ':' separator"));
    };
    if name.is_empty() {
        return Err(TimelineError::sidecar(line_no, "empty segment name"));
    }

    let body = body.trim();
    if body.is_empty() {
        return Ok((name.to_string(), Vec::new()));
    }
    let Some(body) = body.strip_suffix(';') else {
        return Err(TimelineError::sidecar(line_no, "marker list must end with ';'"));
    };

    let tokens: Vec<&str> = body.split(';').collect();
    let last = tokens.len() - 1;
    let mut markers = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let (kind, frame) = if let Some(rest) = token.strip_prefix(LOOP_START_PREFIX) {
            (MarkerKind::LoopStart, rest)
        } else if let Some(rest) = token.strip_prefix(LOOP_END_PREFIX) {
            (MarkerKind::LoopEnd, rest)
        } else if i == 0 || i == last {
            (MarkerKind::Boundary, *token)
        } else {
            (MarkerKind::Generic, *token)
        };

        let frame = frame.parse().map_err(|_| {
            TimelineError::sidecar(line_no, format!("invalid marker token '{token}'"))
        })?;
        markers.push(Marker::new(frame, kind));
    }

    if markers.windows(2).any(|w| w[0].frame > w[1].frame) {
        return Err(TimelineError::sidecar(line_no, "markers out of frame order"));
    }

    Ok((name.to_string(), markers))
}

/// Append one encoded line to the sidecar at `path`, creating it if needed
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// One sidecar line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarEntry {
    /// Segment name
    pub name: String,
    /// Markers in frame order
    pub markers: Vec<Marker>,
}

/// Marker sidecar for a whole presentation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sidecar {
    entries: Vec<SidecarEntry>,
}

impl Sidecar {
    /// Create an empty sidecar
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment's markers
    pub fn push(&mut self, name: impl Into<String>, markers: Vec<Marker>) {
        self.entries.push(SidecarEntry {
            name: name.into(),
            markers,
        });
    }

    /// Entries in file order
    pub fn entries(&self) -> &[SidecarEntry] {
        &self.entries
    }

    /// Look up a segment's entry by name
    pub fn entry(&self, name: &str) -> Option<&SidecarEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Serialize to text, one line per entry
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&encode_line(&entry.name, &entry.markers));
            out.push('\n');
        }
        out
    }

    /// Parse sidecar text
    ///
    /// Every LoopEnd must pair with a LoopStart somewhere before it in frame
    /// order across the whole presentation.
    pub fn decode(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (name, markers) = decode_line(line, i + 1)?;
            entries.push(SidecarEntry { name, markers });
        }

        let all: Vec<Marker> = entries.iter().flat_map(|e| e.markers.iter().copied()).collect();
        if let Err(TimelineError::UnmatchedLoopEnd { frame }) = LoopTable::from_markers(all) {
            let line = entries
                .iter()
                .position(|e| e.markers.iter().any(|m| m.frame == frame))
                .map_or(0, |i| i + 1);
            return Err(TimelineError::sidecar(
                line,
                format!("unmatched loop end at frame {frame}"),
            ));
        }

        Ok(Self { entries })
    }

    /// Write the sidecar to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.encode())?;
        tracing::debug!(?path, entries = self.entries.len(), "wrote marker sidecar");
        Ok(())
    }

    /// Read a sidecar from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::decode(&text)
    }
}
