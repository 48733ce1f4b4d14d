use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use codestack_core::{
    Collaborators, Config, Controller, LocationCandidate, Position, SourceId, SymbolResolver,
};
use codestack_render::HtmlRenderer;
use directories::ProjectDirs;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

mod bridge;
mod frame_arg;
mod hosts;
mod sources;
mod tags;

use bridge::Bridge;
use frame_arg::FrameArg;
use hosts::{BridgeEditor, BridgeView, JsonLines};
use sources::FsSourceAccessor;
use tags::TagsResolver;

#[derive(Debug, Parser)]
#[command(
    name = "codestack",
    version,
    about = "Stack of code frames collected by following definitions"
)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Push the given locations and print the rendered view
    Render {
        /// FILE:LINE[:COL][-ENDLINE], 1-based; repeat to stack several frames
        #[arg(long = "frame", required = true)]
        frames: Vec<FrameArg>,

        /// Write the HTML here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Drive a controller and its view with JSON lines on stdin and stdout
    Bridge {
        /// ctags file used to resolve definitions
        #[arg(long)]
        tags: Option<PathBuf>,

        /// Rewrite this HTML file on every render
        #[arg(long)]
        html: Option<PathBuf>,
    },
}

/// Resolver used when no tags file is configured.
struct NoDefinitions;

#[async_trait::async_trait]
impl SymbolResolver for NoDefinitions {
    async fn definitions(
        &self,
        _source: &SourceId,
        _position: Position,
    ) -> Result<Vec<LocationCandidate>> {
        Ok(Vec::new())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "codestack", "codestack")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join("config.toml"));
    let config = Config::load(&config_path)?;
    let _log_guard = init_logging(&project_dirs, &config.log.level)?;

    match args.mode {
        Mode::Render { frames, out } => run_render(&config, frames, out).await,
        Mode::Bridge { tags, html } => run_bridge(&config, tags, html).await,
    }
}

async fn run_render(config: &Config, frames: Vec<FrameArg>, out: Option<PathBuf>) -> Result<()> {
    let view = Arc::new(BridgeView::new(None, None, config.view.clone())?);
    let controller = Controller::new(Collaborators {
        renderer: Arc::new(HtmlRenderer::new(config.render.clone())),
        sources: Arc::new(FsSourceAccessor),
        resolver: Arc::new(NoDefinitions),
        editor: Arc::new(BridgeEditor::new(None)),
        view: view.clone(),
    });

    for frame in frames {
        controller
            .push(SourceId::from_path(&frame.path), frame.range)
            .await
            .with_context(|| format!("failed to push {:?}", frame.path))?;
    }

    let payload = view
        .last_payload()
        .ok_or_else(|| anyhow!("nothing was rendered"))?;
    info!(frames = payload.frames.len(), "rendered view");
    match out {
        Some(path) => fs::write(&path, &payload.html)
            .with_context(|| format!("failed to write {:?}", path))?,
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(payload.html.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn run_bridge(config: &Config, tags: Option<PathBuf>, html: Option<PathBuf>) -> Result<()> {
    let sink = JsonLines::new(Box::new(io::stdout()));
    let sources = Arc::new(FsSourceAccessor);
    let resolver: Arc<dyn SymbolResolver> = match tags {
        Some(path) => Arc::new(TagsResolver::load(&path, sources.clone())?),
        None => {
            warn!("no tags file given; definition lookups will find nothing");
            Arc::new(NoDefinitions)
        }
    };
    let view = Arc::new(BridgeView::new(
        html,
        Some(sink.clone()),
        config.view.clone(),
    )?);
    let editor = Arc::new(BridgeEditor::new(Some(sink.clone())));
    let controller = Controller::new(Collaborators {
        renderer: Arc::new(HtmlRenderer::new(config.render.clone())),
        sources,
        resolver,
        editor: editor.clone(),
        view: view.clone(),
    });

    let bridge = Bridge {
        controller: &controller,
        view: &view,
        editor: &editor,
        sink,
    };
    bridge
        .run(tokio::io::BufReader::new(tokio::io::stdin()))
        .await
}

fn init_logging(project_dirs: &ProjectDirs, level: &str) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "codestack.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
