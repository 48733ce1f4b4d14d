use codestack_core::FrameId;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::search::Direction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyIntent {
    FocusSearch,
    GoToDefinition,
    SearchQueryChanged { frame: FrameId, query: String },
    SearchStep { frame: FrameId, direction: Direction },
    SearchCancel { frame: FrameId },
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Search(FrameId),
}

/// Turns key events into view intents, tracking which search box has focus.
#[derive(Debug, Default)]
pub struct EventMapper {
    mode: InputMode,
    search_buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Focuses a frame's search box, seeding the buffer with its current term.
    pub fn focus_search(&mut self, frame: FrameId, term: &str) {
        self.mode = InputMode::Search(frame);
        self.search_buffer = term.to_owned();
    }

    pub fn blur(&mut self) {
        self.mode = InputMode::Normal;
        self.search_buffer.clear();
    }

    pub fn search_buffer(&self) -> &str {
        &self.search_buffer
    }

    pub fn map_event(&mut self, event: Event) -> KeyIntent {
        let Event::Key(key) = event else {
            return KeyIntent::None;
        };
        if key.kind == KeyEventKind::Release {
            return KeyIntent::None;
        }
        if let Some(intent) = self.map_global(&key) {
            return intent;
        }
        match self.mode {
            InputMode::Normal => KeyIntent::None,
            InputMode::Search(frame) => self.map_search(frame, key),
        }
    }

    fn map_global(&self, key: &KeyEvent) -> Option<KeyIntent> {
        let command = key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER);
        if !command {
            return None;
        }
        match key.code {
            KeyCode::F(12) if key.modifiers.contains(KeyModifiers::ALT) => {
                Some(KeyIntent::GoToDefinition)
            }
            KeyCode::Char('f') | KeyCode::Char('F')
                if !key.modifiers.contains(KeyModifiers::ALT) =>
            {
                Some(KeyIntent::FocusSearch)
            }
            _ => None,
        }
    }

    fn map_search(&mut self, frame: FrameId, key: KeyEvent) -> KeyIntent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => {
                self.blur();
                KeyIntent::SearchCancel { frame }
            }
            (KeyCode::Enter, modifiers) => {
                let direction = if modifiers.contains(KeyModifiers::SHIFT) {
                    Direction::Previous
                } else {
                    Direction::Next
                };
                KeyIntent::SearchStep { frame, direction }
            }
            (KeyCode::Backspace, _) => {
                self.search_buffer.pop();
                KeyIntent::SearchQueryChanged {
                    frame,
                    query: self.search_buffer.clone(),
                }
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.search_buffer.push(c);
                KeyIntent::SearchQueryChanged {
                    frame,
                    query: self.search_buffer.clone(),
                }
            }
            _ => KeyIntent::None,
        }
    }
}
