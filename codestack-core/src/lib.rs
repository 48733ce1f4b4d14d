use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod controller;
pub mod protocol;
pub mod stack;

pub use config::Config;
pub use controller::{Collaborators, Command, Controller, ControllerEvent, PushOutcome};
pub use protocol::{ControllerMessage, FrameMarkup, LineMarkup, ViewMessage, ViewPayload};
pub use stack::FrameStack;

pub const NO_DEFINITION_MESSAGE: &str = "No definition found";

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("failed to read source {source_id}")]
    DocumentAccess {
        source_id: SourceId,
        #[source]
        source: anyhow::Error,
    },
    #[error("malformed protocol message")]
    Protocol(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(u64);

impl FrameId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn slot_key(self) -> SlotKey {
        SlotKey::for_frame(self)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const SLOT_PREFIX: &str = "frame-";

/// Key under which the view persists per-frame UI state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotKey(String);

impl SlotKey {
    pub fn for_frame(id: FrameId) -> Self {
        Self(format!("{SLOT_PREFIX}{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn frame_id(&self) -> Option<FrameId> {
        self.0
            .strip_prefix(SLOT_PREFIX)
            .and_then(|raw| raw.parse().ok())
            .map(FrameId)
    }
}

impl From<&str> for SlotKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SlotKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identity of a source document, usually a path or URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn display_name(&self) -> &str {
        self.0
            .rsplit(|c| c == '/' || c == '\\')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub const fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start: Position::new(start_line, 0),
            end: Position::new(end_line, 0),
        }
    }

    pub fn covers_line(&self, line: usize) -> bool {
        line >= self.start.line as usize && line <= self.end.line as usize
    }
}

/// A captured snapshot of a source document plus the range that justified it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: FrameId,
    source: SourceId,
    anchor: Range,
    content: String,
    display_name: String,
    display_line: u32,
}

impl Frame {
    pub fn capture(id: FrameId, source: SourceId, anchor: Range, content: String) -> Self {
        let display_name = source.display_name().to_owned();
        Self {
            id,
            display_line: anchor.start.line + 1,
            source,
            anchor,
            content,
            display_name,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn anchor(&self) -> Range {
        self.anchor
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n')
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn display_line(&self) -> u32 {
        self.display_line
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.display_name, self.display_line)
    }
}

/// One answer from a definition provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationCandidate {
    Location {
        source: SourceId,
        range: Range,
    },
    Link {
        target: SourceId,
        target_range: Range,
        target_selection_range: Option<Range>,
    },
}

impl LocationCandidate {
    pub fn into_target(self) -> (SourceId, Range) {
        match self {
            LocationCandidate::Location { source, range } => (source, range),
            LocationCandidate::Link {
                target,
                target_range,
                target_selection_range,
            } => (target, target_selection_range.unwrap_or(target_range)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewColumn {
    One,
    Two,
    Three,
}

impl ViewColumn {
    pub fn opposite(self) -> Self {
        match self {
            ViewColumn::One => ViewColumn::Two,
            _ => ViewColumn::One,
        }
    }
}

#[async_trait::async_trait]
pub trait SourceAccessor: Send + Sync {
    async fn read(&self, source: &SourceId) -> Result<String>;
}

#[async_trait::async_trait]
pub trait SymbolResolver: Send + Sync {
    async fn definitions(
        &self,
        source: &SourceId,
        position: Position,
    ) -> Result<Vec<LocationCandidate>>;
}

pub trait EditorHost: Send + Sync {
    fn open_document(&self, source: &SourceId, selection: Range, column: Option<ViewColumn>);
    fn show_info(&self, message: &str);
    fn active_cursor(&self) -> Option<(SourceId, Position)>;
}

pub trait ViewHost: Send + Sync {
    /// Shows the view, creating it beside the current focus when needed, and
    /// returns the column it sits in.
    fn reveal(&self) -> ViewColumn;
    fn is_open(&self) -> bool;
    /// Column of the view while it is open.
    fn column(&self) -> Option<ViewColumn>;
    fn render(&self, payload: ViewPayload);
    fn post(&self, message: ControllerMessage);
}

pub trait ContentRenderer: Send + Sync {
    fn render(&self, frames: &[Frame]) -> ViewPayload;
}
