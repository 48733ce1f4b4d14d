//! Wire contract between the controller and the rendered view.
//!
//! Messages travel as JSON objects tagged by a `command` field. Frames are
//! addressed by their stable [`FrameId`], never by position.

use serde::{Deserialize, Serialize};

use crate::{FrameId, SlotKey, StackError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ViewMessage {
    #[serde(rename_all = "camelCase")]
    OpenFile { frame_id: FrameId },
    #[serde(rename_all = "camelCase")]
    GoToDefinition {
        frame_id: FrameId,
        line: u32,
        character: u32,
    },
    #[serde(rename_all = "camelCase")]
    RemoveFrame { frame_id: FrameId },
    CleanupComplete,
}

impl ViewMessage {
    pub fn frame_id(&self) -> Option<FrameId> {
        match self {
            ViewMessage::OpenFile { frame_id }
            | ViewMessage::GoToDefinition { frame_id, .. }
            | ViewMessage::RemoveFrame { frame_id } => Some(*frame_id),
            ViewMessage::CleanupComplete => None,
        }
    }

    pub fn decode(raw: &str) -> Result<Self, StackError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ControllerMessage {
    #[serde(rename_all = "camelCase")]
    CleanupStoredData { valid_keys: Vec<SlotKey> },
}

impl ControllerMessage {
    pub fn decode(raw: &str) -> Result<Self, StackError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Everything the view needs to (re)build itself after a render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPayload {
    pub html: String,
    pub frames: Vec<FrameMarkup>,
}

impl ViewPayload {
    pub fn slot_keys(&self) -> Vec<SlotKey> {
        self.frames.iter().map(|frame| frame.slot_key.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMarkup {
    pub id: FrameId,
    pub slot_key: SlotKey,
    pub label: String,
    pub lines: Vec<LineMarkup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMarkup {
    /// Line text with `& < > " '` escaped.
    pub escaped: String,
    pub highlighted: bool,
}
