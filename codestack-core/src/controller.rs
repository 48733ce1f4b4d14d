use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::protocol::{ControllerMessage, ViewMessage};
use crate::stack::FrameStack;
use crate::{
    ContentRenderer, EditorHost, Frame, FrameId, Position, Range, SourceAccessor, SourceId,
    StackError, SymbolResolver, ViewHost, NO_DEFINITION_MESSAGE,
};

/// Entry points exposed to the surrounding host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    JumpToDefinition,
    ClearStack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    FramePushed(FrameId),
    FrameRemoved(FrameId),
    StackCleared,
    Rendered { frames: usize },
    CleanupAcknowledged,
    ViewClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed(FrameId),
    NoDefinition,
    /// A newer lookup started before this one returned.
    Superseded,
    StaleFrame,
}

pub struct Collaborators {
    pub renderer: Arc<dyn ContentRenderer>,
    pub sources: Arc<dyn SourceAccessor>,
    pub resolver: Arc<dyn SymbolResolver>,
    pub editor: Arc<dyn EditorHost>,
    pub view: Arc<dyn ViewHost>,
}

pub struct Controller {
    stack: Mutex<FrameStack>,
    renderer: Arc<dyn ContentRenderer>,
    sources: Arc<dyn SourceAccessor>,
    resolver: Arc<dyn SymbolResolver>,
    editor: Arc<dyn EditorHost>,
    view: Arc<dyn ViewHost>,
    generation: AtomicU64,
    events: Mutex<Vec<ControllerEvent>>,
}

impl Controller {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            stack: Mutex::new(FrameStack::new()),
            renderer: collaborators.renderer,
            sources: collaborators.sources,
            resolver: collaborators.resolver,
            editor: collaborators.editor,
            view: collaborators.view,
            generation: AtomicU64::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Takes every event recorded since the last call.
    pub fn drain_events(&self) -> Vec<ControllerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.stack.lock().frames().to_vec()
    }

    pub fn len(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.lock().is_empty()
    }

    #[instrument(skip(self))]
    pub async fn push(&self, source: SourceId, anchor: Range) -> Result<FrameId, StackError> {
        let content = self
            .sources
            .read(&source)
            .await
            .map_err(|err| StackError::DocumentAccess {
                source_id: source.clone(),
                source: err,
            })?;
        let id = self.stack.lock().push(source, anchor, content);
        info!(frame = %id, "pushed frame");
        self.events.lock().push(ControllerEvent::FramePushed(id));
        let column = self.view.reveal();
        debug!(?column, "view revealed");
        self.render();
        Ok(id)
    }

    /// Looks up the definition at `position` and pushes the first candidate.
    ///
    /// Only the lookup is superseded by a newer request; once a lookup wins, the
    /// document read that follows always completes and pushes its frame.
    #[instrument(skip(self))]
    pub async fn resolve_and_push(
        &self,
        source: SourceId,
        position: Position,
    ) -> Result<PushOutcome, StackError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let candidates = match self.resolver.definitions(&source, position).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(?err, "definition lookup failed");
                Vec::new()
            }
        };

        if self.generation.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "discarding superseded definition lookup");
            return Ok(PushOutcome::Superseded);
        }

        let Some(candidate) = candidates.into_iter().next() else {
            self.editor.show_info(NO_DEFINITION_MESSAGE);
            return Ok(PushOutcome::NoDefinition);
        };
        let (target, range) = candidate.into_target();
        let id = self.push(target, range).await?;
        Ok(PushOutcome::Pushed(id))
    }

    pub async fn go_to_definition(
        &self,
        id: FrameId,
        line: u32,
        character: u32,
    ) -> Result<PushOutcome, StackError> {
        let source = self.stack.lock().get(id).map(|frame| frame.source().clone());
        let Some(source) = source else {
            debug!(frame = %id, "ignoring definition request for stale frame");
            return Ok(PushOutcome::StaleFrame);
        };
        self.resolve_and_push(source, Position::new(line, character))
            .await
    }

    pub fn open_file(&self, id: FrameId) -> bool {
        let target = self
            .stack
            .lock()
            .get(id)
            .map(|frame| (frame.source().clone(), frame.anchor()));
        let Some((source, anchor)) = target else {
            debug!(frame = %id, "ignoring open request for stale frame");
            return false;
        };
        let column = self.view.column().map(|column| column.opposite());
        self.editor.open_document(&source, anchor, column);
        true
    }

    pub fn remove_at(&self, index: usize) -> Option<FrameId> {
        let removed = self.stack.lock().remove(index);
        let Some(frame) = removed else {
            debug!(index, "ignoring removal of stale frame index");
            return None;
        };
        self.after_removal(frame.id());
        Some(frame.id())
    }

    pub fn remove_frame(&self, id: FrameId) -> bool {
        let removed = self.stack.lock().remove_id(id);
        if removed.is_none() {
            debug!(frame = %id, "ignoring removal of stale frame");
            return false;
        }
        self.after_removal(id);
        true
    }

    /// Empties the stack and renders once, even when it was already empty.
    pub fn clear(&self) {
        self.stack.lock().clear();
        self.events.lock().push(ControllerEvent::StackCleared);
        self.render();
        self.send_cleanup();
    }

    /// Drops every frame once the user closes the view.
    pub fn close_view(&self) {
        self.stack.lock().clear();
        self.events.lock().push(ControllerEvent::ViewClosed);
    }

    pub async fn execute(&self, command: Command) -> Result<Option<PushOutcome>, StackError> {
        match command {
            Command::JumpToDefinition => {
                let Some((source, position)) = self.editor.active_cursor() else {
                    return Ok(None);
                };
                self.resolve_and_push(source, position).await.map(Some)
            }
            Command::ClearStack => {
                self.clear();
                Ok(None)
            }
        }
    }

    pub async fn handle_message(&self, message: ViewMessage) -> Result<(), StackError> {
        match message {
            ViewMessage::OpenFile { frame_id } => {
                self.open_file(frame_id);
            }
            ViewMessage::GoToDefinition {
                frame_id,
                line,
                character,
            } => {
                self.go_to_definition(frame_id, line, character).await?;
            }
            ViewMessage::RemoveFrame { frame_id } => {
                self.remove_frame(frame_id);
            }
            ViewMessage::CleanupComplete => {
                debug!("view finished pruning stored state");
                self.events.lock().push(ControllerEvent::CleanupAcknowledged);
            }
        }
        Ok(())
    }

    fn after_removal(&self, id: FrameId) {
        info!(frame = %id, "removed frame");
        self.events.lock().push(ControllerEvent::FrameRemoved(id));
        self.render();
        self.send_cleanup();
    }

    fn render(&self) {
        let payload = {
            let stack = self.stack.lock();
            self.renderer.render(stack.frames())
        };
        let frames = payload.frames.len();
        self.view.render(payload);
        self.events.lock().push(ControllerEvent::Rendered { frames });
    }

    fn send_cleanup(&self) {
        if !self.view.is_open() {
            return;
        }
        let valid_keys = self.stack.lock().slot_keys();
        self.view
            .post(ControllerMessage::CleanupStoredData { valid_keys });
    }
}
