use anyhow::{bail, Result};
use codestack_core::{Command, Controller, FrameId, Position, Range, SourceId, ViewMessage};
use codestack_view::{Target, ViewEvent};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::hosts::{BridgeEditor, BridgeView, HostNotice, JsonLines};

/// Requests from the surrounding host. Lines and characters are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostCommand {
    Push {
        source: SourceId,
        line: u32,
        #[serde(default)]
        character: u32,
    },
    JumpToDefinition {
        source: SourceId,
        line: u32,
        character: u32,
    },
    Clear,
    Close,
}

/// Pointer, focus and key input for the hosted view. Offsets are pixels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ViewInput {
    Click {
        target: Target,
        #[serde(default)]
        x: f32,
    },
    ContextClick {
        target: Target,
        #[serde(default)]
        x: f32,
    },
    Focus {
        target: Target,
    },
    Key(KeyInput),
    #[serde(rename_all = "camelCase")]
    Hover {
        frame_id: Option<FrameId>,
    },
    #[serde(rename_all = "camelCase")]
    Scroll {
        frame_id: FrameId,
        offset: f32,
    },
    #[serde(rename_all = "camelCase")]
    PointerDown {
        frame_id: FrameId,
        y: f32,
    },
    PointerMove {
        y: f32,
    },
    PointerUp,
    MenuActivate,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyInput {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyInput {
    fn to_event(&self) -> Result<Event> {
        let mut modifiers = KeyModifiers::NONE;
        for (held, modifier) in [
            (self.ctrl, KeyModifiers::CONTROL),
            (self.shift, KeyModifiers::SHIFT),
            (self.alt, KeyModifiers::ALT),
            (self.meta, KeyModifiers::SUPER),
        ] {
            if held {
                modifiers |= modifier;
            }
        }
        Ok(Event::Key(KeyEvent::new(key_code(&self.key)?, modifiers)))
    }
}

fn key_code(name: &str) -> Result<KeyCode> {
    let code = match name {
        "Enter" => KeyCode::Enter,
        "Escape" | "Esc" => KeyCode::Esc,
        "Backspace" => KeyCode::Backspace,
        "Tab" => KeyCode::Tab,
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => KeyCode::Char(ch),
                _ => match name.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
                    Some(n) if (1..=24).contains(&n) => KeyCode::F(n),
                    _ => bail!("unknown key `{name}`"),
                },
            }
        }
    };
    Ok(code)
}

impl ViewInput {
    pub fn into_event(self) -> Result<ViewEvent> {
        let event = match self {
            ViewInput::Click { target, x } => ViewEvent::Click { target, x },
            ViewInput::ContextClick { target, x } => ViewEvent::ContextClick { target, x },
            ViewInput::Focus { target } => ViewEvent::Focus(target),
            ViewInput::Key(key) => ViewEvent::Key(key.to_event()?),
            ViewInput::Hover { frame_id } => ViewEvent::Hover(frame_id),
            ViewInput::Scroll { frame_id, offset } => ViewEvent::Scroll {
                frame: frame_id,
                offset,
            },
            ViewInput::PointerDown { frame_id, y } => ViewEvent::PointerDown { frame: frame_id, y },
            ViewInput::PointerMove { y } => ViewEvent::PointerMove { y },
            ViewInput::PointerUp => ViewEvent::PointerUp,
            ViewInput::MenuActivate => ViewEvent::MenuActivate,
        };
        Ok(event)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BridgeInput {
    Host(HostCommand),
    View(ViewMessage),
    Event(ViewInput),
}

pub struct Bridge<'a> {
    pub controller: &'a Controller,
    pub view: &'a BridgeView,
    pub editor: &'a BridgeEditor,
    pub sink: JsonLines,
}

impl Bridge<'_> {
    /// Processes input lines until the reader is exhausted.
    pub async fn run<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let outcome = match serde_json::from_str::<BridgeInput>(line) {
                Ok(input) => self.dispatch(input).await,
                Err(err) => Err(anyhow::Error::new(err).context("unrecognized bridge input")),
            };
            if let Err(err) = outcome {
                warn!(?err, "bridge request failed");
                self.sink.send(&HostNotice::Error {
                    message: format!("{err:#}"),
                })?;
            }
            for event in self.controller.drain_events() {
                debug!(?event, "controller event");
            }
        }
        debug!("bridge input closed");
        Ok(())
    }

    async fn dispatch(&self, input: BridgeInput) -> Result<()> {
        let report = matches!(input, BridgeInput::Event(_));
        match input {
            BridgeInput::Event(input) => self.view.handle(input.into_event()?)?,
            BridgeInput::View(message) => self.controller.handle_message(message).await?,
            BridgeInput::Host(HostCommand::Push {
                source,
                line,
                character,
            }) => {
                let at = Position::new(line, character);
                self.controller.push(source, Range::new(at, at)).await?;
            }
            BridgeInput::Host(HostCommand::JumpToDefinition {
                source,
                line,
                character,
            }) => {
                self.editor
                    .set_cursor(source, Position::new(line, character));
                let outcome = self.controller.execute(Command::JumpToDefinition).await?;
                debug!(?outcome, "jump finished");
            }
            BridgeInput::Host(HostCommand::Clear) => {
                self.controller.execute(Command::ClearStack).await?;
            }
            BridgeInput::Host(HostCommand::Close) => {
                self.view.close()?;
                self.controller.close_view();
            }
        }
        self.pump().await?;
        if report {
            self.sink.send(&self.view.status())?;
        }
        Ok(())
    }

    /// Delivers what the hosted view queued for the controller until it settles.
    async fn pump(&self) -> Result<()> {
        loop {
            let messages = self.view.drain_messages();
            if messages.is_empty() {
                return Ok(());
            }
            for message in messages {
                debug!(?message, "view message");
                self.controller.handle_message(message).await?;
            }
        }
    }
}
