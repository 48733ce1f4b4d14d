use crate::{Frame, FrameId, Range, SlotKey, SourceId};

/// Ordered frames, most recent last.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
    next_id: u64,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: SourceId, anchor: Range, content: String) -> FrameId {
        let id = FrameId::new(self.next_id);
        self.next_id += 1;
        self.frames.push(Frame::capture(id, source, anchor, content));
        id
    }

    pub fn remove(&mut self, index: usize) -> Option<Frame> {
        if index >= self.frames.len() {
            return None;
        }
        Some(self.frames.remove(index))
    }

    pub fn remove_id(&mut self, id: FrameId) -> Option<Frame> {
        let index = self.position(id)?;
        self.remove(index)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn position(&self, id: FrameId) -> Option<usize> {
        self.frames.iter().position(|frame| frame.id() == id)
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.iter().find(|frame| frame.id() == id)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn slot_keys(&self) -> Vec<SlotKey> {
        self.frames.iter().map(|frame| frame.id().slot_key()).collect()
    }
}
