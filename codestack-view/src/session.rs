use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use codestack_core::config::ViewConfig;
use codestack_core::{ControllerMessage, FrameId, FrameMarkup, SlotKey, ViewMessage, ViewPayload};
use codestack_render::{escape_html, unescape_html};
use crossterm::event::Event;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::input::{EventMapper, InputMode, KeyIntent};
use crate::position::{char_at_caret, char_at_offset, Caret, GlyphMetrics};
use crate::search::{Direction, SearchState, SegmentKind};
use crate::state::{FrameHeight, ViewStateRecord, ViewStateStore, ViewStorage};

pub const CONTEXT_MENU_LABEL: &str = "Go to Definition (StackView)";

/// What an interactive element does, as tagged by `data-role` in the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Open,
    Remove,
    Search,
    SearchPrev,
    SearchNext,
    SearchCount,
    Body,
    Line(usize),
    Match(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "frameId")]
    pub frame: FrameId,
    pub role: Role,
}

impl Target {
    pub fn new(frame: FrameId, role: Role) -> Self {
        Self { frame, role }
    }
}

/// Input delivered by whatever hosts the rendered markup.
///
/// Horizontal offsets are measured from the left edge of the target line,
/// vertical offsets from the top edge of the frame.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    Click { target: Target, x: f32 },
    ContextClick { target: Target, x: f32 },
    Focus(Target),
    Key(Event),
    Hover(Option<FrameId>),
    Scroll { frame: FrameId, offset: f32 },
    PointerDown { frame: FrameId, y: f32 },
    PointerMove { y: f32 },
    PointerUp,
    MenuActivate,
    Message(ControllerMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMenu {
    pub frame: FrameId,
    pub line: usize,
    pub character: usize,
}

impl ContextMenu {
    pub fn label(&self) -> &'static str {
        CONTEXT_MENU_LABEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ResizeDrag {
    frame: FrameId,
    start_y: f32,
    start_height: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LineView {
    text: String,
    highlighted: bool,
}

pub struct FrameView {
    id: FrameId,
    slot_key: SlotKey,
    label: String,
    lines: Vec<LineView>,
    height: Option<FrameHeight>,
    scroll_offset: f32,
    search: Option<SearchState>,
}

impl FrameView {
    fn from_markup(markup: &FrameMarkup) -> Self {
        Self {
            id: markup.id,
            slot_key: markup.slot_key.clone(),
            label: markup.label.clone(),
            lines: markup
                .lines
                .iter()
                .map(|line| LineView {
                    text: unescape_html(&line.escaped),
                    highlighted: line.highlighted,
                })
                .collect(),
            height: None,
            scroll_offset: 0.0,
            search: None,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn slot_key(&self) -> &SlotKey {
        &self.slot_key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Original text of a line, decoded from the rendered markup.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(|view| view.text.as_str())
    }

    pub fn is_highlighted(&self, line: usize) -> bool {
        self.lines.get(line).map_or(false, |view| view.highlighted)
    }

    pub fn height(&self) -> Option<FrameHeight> {
        self.height
    }

    pub fn height_px(&self, config: &ViewConfig) -> f32 {
        self.height
            .unwrap_or(FrameHeight::ViewportShare(config.default_height_share))
            .resolve(config.viewport_height_px)
            .max(config.min_height_px)
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn search(&self) -> Option<&SearchState> {
        self.search.as_ref()
    }

    pub fn search_term(&self) -> &str {
        self.search.as_ref().map_or("", |state| state.term())
    }

    /// Match counter text, empty when there is nothing to count.
    pub fn counter(&self) -> String {
        self.search
            .as_ref()
            .and_then(|state| state.counter())
            .unwrap_or_default()
    }

    pub fn nav_enabled(&self) -> bool {
        self.search.as_ref().map_or(false, |state| state.total() > 0)
    }

    /// Inner markup of a line with the current search highlights applied.
    pub fn line_html(&self, line: usize) -> Option<String> {
        let text = self.line_text(line)?;
        let Some(state) = &self.search else {
            return Some(escape_html(text));
        };
        let mut html = String::new();
        for segment in state.segments(line, text) {
            match segment.kind {
                SegmentKind::Plain => html.push_str(&escape_html(&segment.text)),
                SegmentKind::Match { ordinal, current } => {
                    let class = if current {
                        "search-highlight current"
                    } else {
                        "search-highlight"
                    };
                    let _ = write!(
                        html,
                        "<span class=\"{class}\" data-frame-id=\"{}\" data-role=\"match\" data-match=\"{ordinal}\">{}</span>",
                        self.id,
                        escape_html(&segment.text)
                    );
                }
            }
        }
        Some(html)
    }

    fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }

    fn first_highlighted(&self) -> Option<usize> {
        self.lines.iter().position(|line| line.highlighted)
    }

    fn record(&self, config: &ViewConfig) -> ViewStateRecord {
        ViewStateRecord {
            height: self
                .height
                .unwrap_or(FrameHeight::ViewportShare(config.default_height_share)),
            scroll_offset: self.scroll_offset,
        }
    }
}

/// Interactive state of one view instance, rebuilt from every render.
pub struct ViewSession {
    config: ViewConfig,
    metrics: Box<dyn GlyphMetrics>,
    store: ViewStateStore,
    frames: Vec<FrameView>,
    registry: HashMap<(FrameId, Role), usize>,
    mapper: EventMapper,
    caret: Option<Caret>,
    focused_line: Option<(FrameId, usize)>,
    hovered: Option<FrameId>,
    menu: Option<ContextMenu>,
    drag: Option<ResizeDrag>,
    outbox: Vec<ViewMessage>,
}

impl ViewSession {
    pub fn new(
        storage: Arc<dyn ViewStorage>,
        metrics: Box<dyn GlyphMetrics>,
        config: ViewConfig,
    ) -> Result<Self> {
        Ok(Self {
            config,
            metrics,
            store: ViewStateStore::open(storage)?,
            frames: Vec::new(),
            registry: HashMap::new(),
            mapper: EventMapper::new(),
            caret: None,
            focused_line: None,
            hovered: None,
            menu: None,
            drag: None,
            outbox: Vec::new(),
        })
    }

    pub fn open(
        payload: &ViewPayload,
        storage: Arc<dyn ViewStorage>,
        metrics: Box<dyn GlyphMetrics>,
        config: ViewConfig,
    ) -> Result<Self> {
        let mut session = Self::new(storage, metrics, config)?;
        session.load(payload);
        Ok(session)
    }

    /// Replaces the displayed frames with a freshly rendered payload.
    #[instrument(skip_all, fields(frames = payload.frames.len()))]
    pub fn load(&mut self, payload: &ViewPayload) {
        self.frames = payload.frames.iter().map(FrameView::from_markup).collect();
        self.attach_registry();
        self.mapper.blur();
        self.caret = None;
        self.focused_line = None;
        self.hovered = None;
        self.menu = None;
        self.drag = None;
        self.restore();
        for index in 0..self.frames.len() {
            let frame = &self.frames[index];
            if frame.scroll_offset != 0.0 {
                continue;
            }
            if let Some(line) = frame.first_highlighted() {
                self.center_line(index, line);
            }
        }
    }

    pub fn frames(&self) -> &[FrameView] {
        &self.frames
    }

    pub fn frame(&self, id: FrameId) -> Option<&FrameView> {
        self.index_of(id).map(|index| &self.frames[index])
    }

    pub fn caret(&self) -> Option<Caret> {
        self.caret
    }

    pub fn context_menu(&self) -> Option<ContextMenu> {
        self.menu
    }

    pub fn focused_line(&self) -> Option<(FrameId, usize)> {
        self.focused_line
    }

    pub fn input_mode(&self) -> InputMode {
        self.mapper.mode()
    }

    pub fn is_resizing(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_registered(&self, target: Target) -> bool {
        self.registry.contains_key(&(target.frame, target.role))
    }

    pub fn stored_state(&self, key: &SlotKey) -> Option<ViewStateRecord> {
        self.store.get(key).copied()
    }

    /// Takes every message queued for the controller.
    pub fn drain_messages(&mut self) -> Vec<ViewMessage> {
        std::mem::take(&mut self.outbox)
    }

    pub fn handle(&mut self, event: ViewEvent) -> Result<()> {
        match event {
            ViewEvent::Click { target, x } => {
                self.menu = None;
                self.click(target, x)
            }
            ViewEvent::ContextClick { target, x } => {
                self.menu = None;
                self.context_click(target, x);
                Ok(())
            }
            ViewEvent::Focus(target) => {
                self.focus(target);
                Ok(())
            }
            ViewEvent::Key(event) => self.key(event),
            ViewEvent::Hover(frame) => {
                self.hovered = frame;
                Ok(())
            }
            ViewEvent::Scroll { frame, offset } => {
                let Some(index) = self.index_of(frame) else {
                    return Ok(());
                };
                self.frames[index].scroll_offset = offset.max(0.0);
                self.persist()
            }
            ViewEvent::PointerDown { frame, y } => {
                self.begin_resize(frame, y);
                Ok(())
            }
            ViewEvent::PointerMove { y } => self.resize_to(y),
            ViewEvent::PointerUp => {
                self.drag = None;
                Ok(())
            }
            ViewEvent::MenuActivate => {
                if let Some(menu) = self.menu.take() {
                    if self.index_of(menu.frame).is_some() {
                        self.send_definition(menu.frame, menu.line, menu.character);
                    }
                }
                Ok(())
            }
            ViewEvent::Message(message) => self.receive(message),
        }
    }

    fn receive(&mut self, message: ControllerMessage) -> Result<()> {
        match message {
            ControllerMessage::CleanupStoredData { valid_keys } => {
                let removed = self.store.prune(&valid_keys)?;
                debug!(?removed, "stored view state pruned");
                self.outbox.push(ViewMessage::CleanupComplete);
                Ok(())
            }
        }
    }

    fn click(&mut self, target: Target, x: f32) -> Result<()> {
        let Some(index) = self.lookup(target) else {
            return Ok(());
        };
        if target.role != Role::Search {
            self.mapper.blur();
        }
        if !matches!(target.role, Role::Line(_) | Role::Match(_)) {
            self.focused_line = None;
        }
        match target.role {
            Role::Open => self.outbox.push(ViewMessage::OpenFile {
                frame_id: target.frame,
            }),
            Role::Remove => self.outbox.push(ViewMessage::RemoveFrame {
                frame_id: target.frame,
            }),
            Role::Search => {
                let term = self.frames[index].search_term().to_owned();
                self.mapper.focus_search(target.frame, &term);
            }
            Role::SearchPrev => return self.step_search(index, Direction::Previous),
            Role::SearchNext => return self.step_search(index, Direction::Next),
            Role::Match(ordinal) => return self.select_match(index, ordinal),
            Role::Line(line) => self.plant_caret(index, line, x),
            Role::SearchCount | Role::Body => {}
        }
        Ok(())
    }

    fn context_click(&mut self, target: Target, x: f32) {
        let Some(index) = self.lookup(target) else {
            return;
        };
        let Role::Line(line) = target.role else {
            return;
        };
        let Some(text) = self.frames[index].line_text(line) else {
            return;
        };
        let character = char_at_offset(text, self.metrics.as_ref(), x);
        self.menu = Some(ContextMenu {
            frame: target.frame,
            line,
            character,
        });
    }

    fn focus(&mut self, target: Target) {
        let Some(index) = self.lookup(target) else {
            return;
        };
        match target.role {
            Role::Line(line) => {
                self.mapper.blur();
                self.focused_line = Some((target.frame, line));
            }
            Role::Search => {
                let term = self.frames[index].search_term().to_owned();
                self.mapper.focus_search(target.frame, &term);
                self.focused_line = None;
            }
            _ => {
                self.mapper.blur();
                self.focused_line = None;
            }
        }
    }

    fn key(&mut self, event: Event) -> Result<()> {
        match self.mapper.map_event(event) {
            KeyIntent::FocusSearch => {
                let frame = self
                    .hovered
                    .filter(|id| self.index_of(*id).is_some())
                    .or_else(|| self.frames.first().map(|frame| frame.id));
                if let Some(frame) = frame {
                    self.focus(Target::new(frame, Role::Search));
                }
                Ok(())
            }
            KeyIntent::GoToDefinition => {
                self.definition_from_keyboard();
                Ok(())
            }
            KeyIntent::SearchQueryChanged { frame, query } => self.search(frame, &query),
            KeyIntent::SearchStep { frame, direction } => match self.index_of(frame) {
                Some(index) => self.step_search(index, direction),
                None => Ok(()),
            },
            KeyIntent::SearchCancel { frame } => self.search(frame, ""),
            KeyIntent::None => Ok(()),
        }
    }

    /// Rebuilds a frame's search for `term`, dropping highlights when it is empty.
    fn search(&mut self, frame: FrameId, term: &str) -> Result<()> {
        let Some(index) = self.index_of(frame) else {
            return Ok(());
        };
        self.registry
            .retain(|(id, role), _| !(*id == frame && matches!(role, Role::Match(_))));

        let view = &mut self.frames[index];
        let state = SearchState::build(term, &view.texts());
        let total = state.as_ref().map_or(0, |state| state.total());
        view.search = state;
        for ordinal in 0..total {
            self.registry.insert((frame, Role::Match(ordinal)), index);
        }
        debug!(%frame, total, "search rebuilt");
        self.center_current_match(index)
    }

    fn step_search(&mut self, index: usize, direction: Direction) -> Result<()> {
        let moved = self.frames[index]
            .search
            .as_mut()
            .and_then(|state| state.step(direction))
            .is_some();
        if moved {
            self.center_current_match(index)?;
        }
        Ok(())
    }

    fn select_match(&mut self, index: usize, ordinal: usize) -> Result<()> {
        let selected = self.frames[index]
            .search
            .as_mut()
            .and_then(|state| state.select(ordinal))
            .is_some();
        if selected {
            self.center_current_match(index)?;
        }
        Ok(())
    }

    fn center_current_match(&mut self, index: usize) -> Result<()> {
        let line = self.frames[index]
            .search
            .as_ref()
            .and_then(|state| state.current_match())
            .map(|found| found.line);
        match line {
            Some(line) => {
                self.center_line(index, line);
                self.persist()
            }
            None => Ok(()),
        }
    }

    fn center_line(&mut self, index: usize, line: usize) {
        let line_height = self.config.line_height_px;
        let viewport = self.frames[index].height_px(&self.config);
        let view = &mut self.frames[index];
        let content = view.lines.len() as f32 * line_height;
        let max = (content - viewport).max(0.0);
        let target = line as f32 * line_height - viewport / 2.0 + line_height / 2.0;
        view.scroll_offset = target.clamp(0.0, max);
    }

    fn plant_caret(&mut self, index: usize, line: usize, x: f32) {
        let frame = self.frames[index].id;
        let Some(text) = self.frames[index].line_text(line) else {
            return;
        };
        self.caret = Some(Caret::plant(frame, line, text, self.metrics.as_ref(), x));
        self.focused_line = Some((frame, line));
    }

    fn definition_from_keyboard(&mut self) {
        let target = self
            .focused_line
            .or_else(|| self.caret.map(|caret| (caret.frame, caret.line)));
        let Some((frame, line)) = target else {
            return;
        };
        let Some(index) = self.index_of(frame) else {
            return;
        };
        let Some(text) = self.frames[index].line_text(line) else {
            return;
        };
        let character = match self.caret {
            Some(caret) if caret.frame == frame && caret.line == line => {
                char_at_caret(text, self.metrics.as_ref(), caret.x)
            }
            _ => 0,
        };
        self.send_definition(frame, line, character);
    }

    fn send_definition(&mut self, frame: FrameId, line: usize, character: usize) {
        self.outbox.push(ViewMessage::GoToDefinition {
            frame_id: frame,
            line: line as u32,
            character: character as u32,
        });
    }

    fn begin_resize(&mut self, frame: FrameId, y: f32) {
        let Some(index) = self.index_of(frame) else {
            return;
        };
        let height = self.frames[index].height_px(&self.config);
        if y >= height - self.config.resize_margin_px {
            self.drag = Some(ResizeDrag {
                frame,
                start_y: y,
                start_height: height,
            });
        }
    }

    fn resize_to(&mut self, y: f32) -> Result<()> {
        let Some(drag) = self.drag else {
            return Ok(());
        };
        let Some(index) = self.index_of(drag.frame) else {
            self.drag = None;
            return Ok(());
        };
        let height = (drag.start_height + (y - drag.start_y)).max(self.config.min_height_px);
        self.frames[index].height = Some(FrameHeight::Pixels(height));
        self.persist()
    }

    fn restore(&mut self) {
        for frame in &mut self.frames {
            if let Some(record) = self.store.get(&frame.slot_key) {
                frame.height = Some(record.height);
                frame.scroll_offset = record.scroll_offset;
            }
        }
    }

    fn persist(&mut self) -> Result<()> {
        let records: Vec<(SlotKey, ViewStateRecord)> = self
            .frames
            .iter()
            .map(|frame| (frame.slot_key.clone(), frame.record(&self.config)))
            .collect();
        self.store.persist(records)
    }

    fn attach_registry(&mut self) {
        self.registry.clear();
        for (index, frame) in self.frames.iter().enumerate() {
            for role in [
                Role::Open,
                Role::Remove,
                Role::Search,
                Role::SearchPrev,
                Role::SearchNext,
                Role::SearchCount,
                Role::Body,
            ] {
                self.registry.insert((frame.id, role), index);
            }
            for line in 0..frame.lines.len() {
                self.registry.insert((frame.id, Role::Line(line)), index);
            }
        }
    }

    fn lookup(&self, target: Target) -> Option<usize> {
        let found = self.registry.get(&(target.frame, target.role)).copied();
        if found.is_none() {
            debug!(frame = %target.frame, role = ?target.role, "ignoring event for unknown target");
        }
        found
    }

    fn index_of(&self, id: FrameId) -> Option<usize> {
        self.frames.iter().position(|frame| frame.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::MonospaceMetrics;
    use crate::state::MemoryViewStorage;
    use codestack_core::{ContentRenderer, FrameStack, Range, SourceId};
    use codestack_render::HtmlRenderer;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

    fn payload(frames: &[(&str, Range)]) -> ViewPayload {
        let mut stack = FrameStack::new();
        for (content, anchor) in frames {
            stack.push(SourceId::new("/work/src/lib.rs"), *anchor, (*content).to_owned());
        }
        HtmlRenderer::default().render(stack.frames())
    }

    fn session_with(payload: &ViewPayload, storage: Arc<MemoryViewStorage>) -> ViewSession {
        ViewSession::open(
            payload,
            storage,
            Box::new(MonospaceMetrics { cell_width: 8.0 }),
            ViewConfig::default(),
        )
        .unwrap()
    }

    fn session(payload: &ViewPayload) -> ViewSession {
        session_with(payload, Arc::new(MemoryViewStorage::new()))
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> ViewEvent {
        ViewEvent::Key(Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }))
    }

    fn click(frame: FrameId, role: Role, x: f32) -> ViewEvent {
        ViewEvent::Click {
            target: Target::new(frame, role),
            x,
        }
    }

    fn type_search(session: &mut ViewSession, frame: FrameId, term: &str) {
        session.handle(click(frame, Role::Search, 0.0)).unwrap();
        for ch in term.chars() {
            session
                .handle(key(KeyCode::Char(ch), KeyModifiers::NONE))
                .unwrap();
        }
    }

    const FOO_FILE: &str = "fn main() {\n    foo();\n    bar();\n    baz();\n    let x = foo;\n}";

    #[test]
    fn typing_a_term_counts_matches_on_two_lines() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let mut session = session(&payload);
        let frame = FrameId::new(0);

        type_search(&mut session, frame, "foo");

        let view = session.frame(frame).unwrap();
        let state = view.search().unwrap();
        let lines: Vec<_> = state.matches().iter().map(|m| m.line + 1).collect();
        assert_eq!(lines, vec![2, 5]);
        assert_eq!(state.current(), Some(0));
        assert_eq!(view.counter(), "1/2");
        assert!(view.nav_enabled());
        assert!(session.is_registered(Target::new(frame, Role::Match(1))));
        assert_eq!(
            view.line_html(1).unwrap(),
            "    <span class=\"search-highlight current\" data-frame-id=\"0\" data-role=\"match\" data-match=\"0\">foo</span>();"
        );
    }

    #[test]
    fn navigation_buttons_wrap_and_enter_steps() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let mut session = session(&payload);
        let frame = FrameId::new(0);
        type_search(&mut session, frame, "foo");

        session.handle(click(frame, Role::SearchPrev, 0.0)).unwrap();
        assert_eq!(session.frame(frame).unwrap().counter(), "2/2");
        session.handle(click(frame, Role::SearchNext, 0.0)).unwrap();
        assert_eq!(session.frame(frame).unwrap().counter(), "1/2");

        session.handle(click(frame, Role::Search, 0.0)).unwrap();
        session
            .handle(key(KeyCode::Enter, KeyModifiers::NONE))
            .unwrap();
        assert_eq!(session.frame(frame).unwrap().counter(), "2/2");
        session
            .handle(key(KeyCode::Enter, KeyModifiers::SHIFT))
            .unwrap();
        assert_eq!(session.frame(frame).unwrap().counter(), "1/2");
    }

    #[test]
    fn no_matches_disables_navigation() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let mut session = session(&payload);
        let frame = FrameId::new(0);
        type_search(&mut session, frame, "quux");

        let view = session.frame(frame).unwrap();
        assert_eq!(view.counter(), "");
        assert!(!view.nav_enabled());
        session.handle(click(frame, Role::SearchNext, 0.0)).unwrap();
        assert_eq!(session.frame(frame).unwrap().search().unwrap().current(), None);
    }

    #[test]
    fn escape_restores_unhighlighted_lines() {
        let content = "a <b> & 'c'\nfoo";
        let payload = payload(&[(content, Range::lines(0, 0))]);
        let mut session = session(&payload);
        let frame = FrameId::new(0);
        type_search(&mut session, frame, "b");
        assert!(session.frame(frame).unwrap().search().is_some());

        session.handle(key(KeyCode::Esc, KeyModifiers::NONE)).unwrap();

        let view = session.frame(frame).unwrap();
        assert!(view.search().is_none());
        assert_eq!(view.counter(), "");
        assert_eq!(view.line_html(0).unwrap(), payload.frames[0].lines[0].escaped);
        assert_eq!(view.line_text(0).unwrap(), "a <b> & 'c'");
        assert!(!session.is_registered(Target::new(frame, Role::Match(0))));
        assert_eq!(session.input_mode(), InputMode::Normal);
    }

    #[test]
    fn clicking_a_match_makes_it_current() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let mut session = session(&payload);
        let frame = FrameId::new(0);
        type_search(&mut session, frame, "foo");

        session.handle(click(frame, Role::Match(1), 0.0)).unwrap();
        assert_eq!(session.frame(frame).unwrap().counter(), "2/2");
    }

    #[test]
    fn keyboard_definition_uses_planted_caret() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let mut session = session(&payload);
        let frame = FrameId::new(0);

        session.handle(click(frame, Role::Line(1), 37.0)).unwrap();
        let caret = session.caret().unwrap();
        assert_eq!(caret.character, 5);
        assert_eq!(caret.x, 40.0);

        session
            .handle(key(
                KeyCode::F(12),
                KeyModifiers::ALT | KeyModifiers::CONTROL,
            ))
            .unwrap();
        assert_eq!(
            session.drain_messages(),
            vec![ViewMessage::GoToDefinition {
                frame_id: frame,
                line: 1,
                character: 5
            }]
        );
    }

    #[test]
    fn keyboard_definition_from_focused_line_without_caret_uses_column_zero() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let mut session = session(&payload);
        let frame = FrameId::new(0);

        session.handle(click(frame, Role::Line(1), 37.0)).unwrap();
        session
            .handle(ViewEvent::Focus(Target::new(frame, Role::Line(4))))
            .unwrap();
        session
            .handle(key(KeyCode::F(12), KeyModifiers::ALT | KeyModifiers::SUPER))
            .unwrap();
        assert_eq!(
            session.drain_messages(),
            vec![ViewMessage::GoToDefinition {
                frame_id: frame,
                line: 4,
                character: 0
            }]
        );
    }

    #[test]
    fn keyboard_definition_without_focus_or_caret_does_nothing() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let mut session = session(&payload);
        session
            .handle(key(KeyCode::F(12), KeyModifiers::ALT | KeyModifiers::CONTROL))
            .unwrap();
        assert!(session.drain_messages().is_empty());
    }

    #[test]
    fn context_menu_sends_definition_and_any_click_dismisses_it() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let mut session = session(&payload);
        let frame = FrameId::new(0);

        session
            .handle(ViewEvent::ContextClick {
                target: Target::new(frame, Role::Line(0)),
                x: 9.0,
            })
            .unwrap();
        let menu = session.context_menu().unwrap();
        assert_eq!(menu.label(), "Go to Definition (StackView)");
        assert_eq!(menu.character, 1);

        session.handle(ViewEvent::MenuActivate).unwrap();
        assert_eq!(
            session.drain_messages(),
            vec![ViewMessage::GoToDefinition {
                frame_id: frame,
                line: 0,
                character: 1
            }]
        );
        assert!(session.context_menu().is_none());

        session
            .handle(ViewEvent::ContextClick {
                target: Target::new(frame, Role::Line(2)),
                x: 0.0,
            })
            .unwrap();
        session.handle(click(frame, Role::Body, 0.0)).unwrap();
        assert!(session.context_menu().is_none());
        session.handle(ViewEvent::MenuActivate).unwrap();
        assert!(session.drain_messages().is_empty());
    }

    #[test]
    fn header_buttons_queue_messages_by_frame_id() {
        let payload = payload(&[
            (FOO_FILE, Range::lines(0, 0)),
            (FOO_FILE, Range::lines(2, 2)),
        ]);
        let mut session = session(&payload);

        session
            .handle(click(FrameId::new(1), Role::Open, 0.0))
            .unwrap();
        session
            .handle(click(FrameId::new(0), Role::Remove, 0.0))
            .unwrap();
        assert_eq!(
            session.drain_messages(),
            vec![
                ViewMessage::OpenFile {
                    frame_id: FrameId::new(1)
                },
                ViewMessage::RemoveFrame {
                    frame_id: FrameId::new(0)
                },
            ]
        );
    }

    #[test]
    fn events_for_unregistered_targets_are_ignored() {
        let first = payload(&[
            (FOO_FILE, Range::lines(0, 0)),
            (FOO_FILE, Range::lines(1, 1)),
        ]);
        let mut session = session(&first);
        session
            .handle(click(FrameId::new(7), Role::Remove, 0.0))
            .unwrap();
        session
            .handle(click(FrameId::new(0), Role::Line(99), 0.0))
            .unwrap();
        assert!(session.drain_messages().is_empty());
        assert!(session.caret().is_none());

        let mut stack = FrameStack::new();
        stack.push(SourceId::new("a.rs"), Range::lines(0, 0), "x".into());
        let second_id = stack.push(SourceId::new("b.rs"), Range::lines(0, 0), "y".into());
        stack.remove(0);
        session.load(&HtmlRenderer::default().render(stack.frames()));

        session
            .handle(click(FrameId::new(0), Role::Open, 0.0))
            .unwrap();
        assert!(session.drain_messages().is_empty());
        session.handle(click(second_id, Role::Open, 0.0)).unwrap();
        assert_eq!(
            session.drain_messages(),
            vec![ViewMessage::OpenFile {
                frame_id: second_id
            }]
        );
    }

    #[test]
    fn ctrl_f_focuses_hovered_frame_else_first() {
        let payload = payload(&[
            (FOO_FILE, Range::lines(0, 0)),
            (FOO_FILE, Range::lines(0, 0)),
        ]);
        let mut session = session(&payload);

        session
            .handle(key(KeyCode::Char('f'), KeyModifiers::CONTROL))
            .unwrap();
        assert_eq!(session.input_mode(), InputMode::Search(FrameId::new(0)));

        session
            .handle(ViewEvent::Hover(Some(FrameId::new(1))))
            .unwrap();
        session
            .handle(key(KeyCode::Char('f'), KeyModifiers::SUPER))
            .unwrap();
        assert_eq!(session.input_mode(), InputMode::Search(FrameId::new(1)));

        session
            .handle(key(KeyCode::Char('a'), KeyModifiers::NONE))
            .unwrap();
        assert_eq!(session.frame(FrameId::new(1)).unwrap().search_term(), "a");
        assert!(session.frame(FrameId::new(0)).unwrap().search().is_none());
    }

    #[test]
    fn dragging_the_bottom_edge_resizes_and_persists() {
        let payload = payload(&[(FOO_FILE, Range::lines(0, 0))]);
        let storage = Arc::new(MemoryViewStorage::new());
        let mut session = session_with(&payload, storage.clone());
        let frame = FrameId::new(0);
        assert_eq!(session.frame(frame).unwrap().height_px(&ViewConfig::default()), 200.0);

        session
            .handle(ViewEvent::PointerDown { frame, y: 50.0 })
            .unwrap();
        assert!(!session.is_resizing());

        session
            .handle(ViewEvent::PointerDown { frame, y: 195.0 })
            .unwrap();
        assert!(session.is_resizing());
        session.handle(ViewEvent::PointerMove { y: 45.0 }).unwrap();
        assert_eq!(
            session.frame(frame).unwrap().height(),
            Some(FrameHeight::Pixels(100.0))
        );
        session.handle(ViewEvent::PointerMove { y: 245.0 }).unwrap();
        session.handle(ViewEvent::PointerUp).unwrap();
        assert!(!session.is_resizing());
        session.handle(ViewEvent::PointerMove { y: 900.0 }).unwrap();

        let store = ViewStateStore::open(storage).unwrap();
        assert_eq!(
            store.get(&frame.slot_key()).map(|record| record.height),
            Some(FrameHeight::Pixels(250.0))
        );
    }

    #[test]
    fn cleanup_prunes_and_acknowledges() {
        let payload = payload(&[
            (FOO_FILE, Range::lines(0, 0)),
            (FOO_FILE, Range::lines(0, 0)),
            (FOO_FILE, Range::lines(0, 0)),
        ]);
        let mut session = session(&payload);
        session
            .handle(ViewEvent::Scroll {
                frame: FrameId::new(1),
                offset: 12.0,
            })
            .unwrap();
        for id in 0..3 {
            assert!(session.stored_state(&FrameId::new(id).slot_key()).is_some());
        }

        session
            .handle(ViewEvent::Message(ControllerMessage::CleanupStoredData {
                valid_keys: vec![FrameId::new(0).slot_key(), FrameId::new(1).slot_key()],
            }))
            .unwrap();

        assert_eq!(session.drain_messages(), vec![ViewMessage::CleanupComplete]);
        assert!(session.stored_state(&FrameId::new(2).slot_key()).is_none());
        assert_eq!(
            session
                .stored_state(&FrameId::new(1).slot_key())
                .map(|record| record.scroll_offset),
            Some(12.0)
        );
    }

    #[test]
    fn load_restores_stored_state_and_centers_the_rest() {
        let content = (0..40)
            .map(|n| format!("line {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let payload = payload(&[
            (content.as_str(), Range::lines(20, 20)),
            (content.as_str(), Range::lines(20, 20)),
        ]);
        let storage = Arc::new(MemoryViewStorage::new());
        let mut store = ViewStateStore::open(storage.clone()).unwrap();
        store
            .persist([(
                FrameId::new(0).slot_key(),
                ViewStateRecord {
                    height: FrameHeight::Pixels(300.0),
                    scroll_offset: 42.0,
                },
            )])
            .unwrap();

        let session = session_with(&payload, storage);

        let restored = session.frame(FrameId::new(0)).unwrap();
        assert_eq!(restored.height(), Some(FrameHeight::Pixels(300.0)));
        assert_eq!(restored.scroll_offset(), 42.0);

        // 20 * 18 - 200 / 2 + 18 / 2
        let centered = session.frame(FrameId::new(1)).unwrap();
        assert_eq!(centered.height(), None);
        assert_eq!(centered.scroll_offset(), 269.0);
    }

    #[test]
    fn centering_is_clamped_to_content() {
        let payload = payload(&[(FOO_FILE, Range::lines(5, 5))]);
        let session = session(&payload);
        assert_eq!(session.frame(FrameId::new(0)).unwrap().scroll_offset(), 0.0);
    }

    #[test]
    fn targets_decode_from_role_names() {
        let line: Target = serde_json::from_str(r#"{"frameId":2,"role":{"line":4}}"#).unwrap();
        assert_eq!(line, Target::new(FrameId::new(2), Role::Line(4)));
        let next: Target = serde_json::from_str(r#"{"frameId":0,"role":"searchNext"}"#).unwrap();
        assert_eq!(next, Target::new(FrameId::new(0), Role::SearchNext));
        assert!(serde_json::from_str::<Target>(r#"{"frameId":0,"role":"nope"}"#).is_err());
    }
}
