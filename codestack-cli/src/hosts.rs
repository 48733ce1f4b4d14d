use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use codestack_core::config::ViewConfig;
use codestack_core::{
    ControllerMessage, EditorHost, FrameId, Position, Range, SourceId, ViewColumn, ViewHost,
    ViewMessage, ViewPayload,
};
use codestack_view::{InputMode, MemoryViewStorage, MonospaceMetrics, ViewEvent, ViewSession};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

/// Notices the bridge writes for the host next to controller messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostNotice {
    Rendered {
        frames: usize,
    },
    #[serde(rename_all = "camelCase")]
    OpenDocument {
        source: SourceId,
        selection: Range,
        column: Option<ViewColumn>,
    },
    ShowInfo {
        message: String,
    },
    Error {
        message: String,
    },
    /// What the hosted view shows after an input event.
    #[serde(rename_all = "camelCase")]
    ViewState {
        frames: Vec<FrameStatus>,
        caret: Option<LineStatus>,
        context_menu: Option<LineStatus>,
        searching: Option<FrameId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStatus {
    pub frame_id: FrameId,
    pub label: String,
    pub height_px: f32,
    pub scroll_offset: f32,
    pub search_term: String,
    pub counter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStatus {
    pub frame_id: FrameId,
    pub line: usize,
    pub character: usize,
}

/// Newline-delimited JSON writer shared by every host handle.
#[derive(Clone)]
pub struct JsonLines {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl JsonLines {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    pub fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let line = serde_json::to_string(message).context("failed to encode bridge output")?;
        let mut out = self.out.lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }

    fn send_or_log<T: Serialize>(&self, message: &T) {
        if let Err(err) = self.send(message) {
            error!(?err, "failed to write bridge output");
        }
    }
}

/// The view as seen from the command line: an HTML file, a message stream and
/// the interactive session fed by both.
pub struct BridgeView {
    open: AtomicBool,
    html_path: Option<PathBuf>,
    sink: Option<JsonLines>,
    last: Mutex<Option<ViewPayload>>,
    config: ViewConfig,
    session: Mutex<ViewSession>,
}

impl BridgeView {
    pub fn new(
        html_path: Option<PathBuf>,
        sink: Option<JsonLines>,
        config: ViewConfig,
    ) -> Result<Self> {
        let session = fresh_session(&config)?;
        Ok(Self {
            open: AtomicBool::new(false),
            html_path,
            sink,
            last: Mutex::new(None),
            config,
            session: Mutex::new(session),
        })
    }

    /// Hides the view; its stored per-frame state goes with it.
    pub fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        *self.session.lock() = fresh_session(&self.config)?;
        debug!("view closed");
        Ok(())
    }

    pub fn handle(&self, event: ViewEvent) -> Result<()> {
        self.session.lock().handle(event)
    }

    /// Messages the view queued for the controller.
    pub fn drain_messages(&self) -> Vec<ViewMessage> {
        self.session.lock().drain_messages()
    }

    pub fn status(&self) -> HostNotice {
        let session = self.session.lock();
        HostNotice::ViewState {
            frames: session
                .frames()
                .iter()
                .map(|frame| FrameStatus {
                    frame_id: frame.id(),
                    label: frame.label().to_owned(),
                    height_px: frame.height_px(&self.config),
                    scroll_offset: frame.scroll_offset(),
                    search_term: frame.search_term().to_owned(),
                    counter: frame.counter(),
                })
                .collect(),
            caret: session.caret().map(|caret| LineStatus {
                frame_id: caret.frame,
                line: caret.line,
                character: caret.character,
            }),
            context_menu: session.context_menu().map(|menu| LineStatus {
                frame_id: menu.frame,
                line: menu.line,
                character: menu.character,
            }),
            searching: match session.input_mode() {
                InputMode::Search(frame) => Some(frame),
                InputMode::Normal => None,
            },
        }
    }

    pub fn last_payload(&self) -> Option<ViewPayload> {
        self.last.lock().clone()
    }

    fn write_html(&self, html: &str) -> Result<()> {
        let Some(path) = &self.html_path else {
            return Ok(());
        };
        fs::write(path, html).with_context(|| format!("failed to write view html to {:?}", path))
    }
}

fn fresh_session(config: &ViewConfig) -> Result<ViewSession> {
    ViewSession::new(
        Arc::new(MemoryViewStorage::new()),
        Box::new(MonospaceMetrics {
            cell_width: config.char_width_px,
        }),
        config.clone(),
    )
}

impl ViewHost for BridgeView {
    fn reveal(&self) -> ViewColumn {
        if !self.open.swap(true, Ordering::SeqCst) {
            debug!("view opened");
        }
        ViewColumn::Two
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn column(&self) -> Option<ViewColumn> {
        self.is_open().then_some(ViewColumn::Two)
    }

    fn render(&self, payload: ViewPayload) {
        if let Err(err) = self.write_html(&payload.html) {
            error!(?err, "failed to write rendered view");
        }
        if let Some(sink) = &self.sink {
            sink.send_or_log(&HostNotice::Rendered {
                frames: payload.frames.len(),
            });
        }
        self.session.lock().load(&payload);
        *self.last.lock() = Some(payload);
    }

    fn post(&self, message: ControllerMessage) {
        if let Some(sink) = &self.sink {
            sink.send_or_log(&message);
        }
        if let Err(err) = self.session.lock().handle(ViewEvent::Message(message)) {
            error!(?err, "view failed to handle controller message");
        }
    }
}

/// Editor surface that reports requests as notices and tracks the host's cursor.
pub struct BridgeEditor {
    sink: Option<JsonLines>,
    cursor: Mutex<Option<(SourceId, Position)>>,
}

impl BridgeEditor {
    pub fn new(sink: Option<JsonLines>) -> Self {
        Self {
            sink,
            cursor: Mutex::new(None),
        }
    }

    pub fn set_cursor(&self, source: SourceId, position: Position) {
        *self.cursor.lock() = Some((source, position));
    }
}

impl EditorHost for BridgeEditor {
    fn open_document(&self, source: &SourceId, selection: Range, column: Option<ViewColumn>) {
        if let Some(sink) = &self.sink {
            sink.send_or_log(&HostNotice::OpenDocument {
                source: source.clone(),
                selection,
                column,
            });
        }
    }

    fn show_info(&self, message: &str) {
        match &self.sink {
            Some(sink) => sink.send_or_log(&HostNotice::ShowInfo {
                message: message.to_owned(),
            }),
            None => info!(%message, "editor notice"),
        }
    }

    fn active_cursor(&self) -> Option<(SourceId, Position)> {
        self.cursor.lock().clone()
    }
}
