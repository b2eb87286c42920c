use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::Event;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::display::RawModeGuard;
use crate::display::input::InputHandler;
use crate::display::renderer::Renderer;
use crate::session::event_loop::{self, Io, SourceFile, display_name};
use crate::session::runner::ExecutionSession;
use crate::session::transport::{Transport, WsConnector};

pub struct RunConfig {
    pub file: PathBuf,
    pub language: Option<String>,
    pub config: Config,
    /// Put the terminal in raw mode (off when stdout is not a terminal).
    pub raw_mode: bool,
}

/// Run a source file in an interactive session until the user exits.
pub async fn run<W: Write>(
    config: RunConfig,
    term_rx: mpsc::UnboundedReceiver<Event>,
    writer: W,
) -> Result<()> {
    let source = SourceFile::new(config.file, config.language)?;
    let settings = config.config;

    let (app_tx, app_rx) = mpsc::unbounded_channel();
    let transport = Transport::new(WsConnector, settings.endpoint.clone(), app_tx.clone())
        .with_reconnect_delay(settings.reconnect_delay());
    let mut session = ExecutionSession::new(transport, settings.suggestion_service(), app_tx);
    let mut io = Io::new(app_rx, term_rx);
    let mut renderer = Renderer::with_writer(writer);
    let mut input = InputHandler::new();

    let _raw = RawModeGuard::acquire(config.raw_mode)?;
    renderer.render_session_header(
        &display_name(&source.path),
        &source.language,
        source
            .needs_connection()
            .then_some(settings.endpoint.as_str()),
    );
    renderer.render_help();

    event_loop::run_session(&mut session, &source, &mut renderer, &mut input, &mut io).await
}
