use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossterm::event::Event;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::display::input::{InputAction, InputHandler};
use crate::display::renderer::Renderer;
use crate::error::SessionError;
use crate::event::AppEvent;
use crate::language::Language;
use crate::lint;

use super::runner::{ExecutionSession, SessionUpdate};
use super::transport::Connector;

/// Everything the interactive loop waits on.
#[derive(Debug)]
pub enum IoEvent {
    App(AppEvent),
    Terminal(Event),
}

/// The two event sources of an interactive session.
pub struct Io {
    app_rx: mpsc::UnboundedReceiver<AppEvent>,
    term_rx: mpsc::UnboundedReceiver<Event>,
}

impl Io {
    pub fn new(
        app_rx: mpsc::UnboundedReceiver<AppEvent>,
        term_rx: mpsc::UnboundedReceiver<Event>,
    ) -> Self {
        Self { app_rx, term_rx }
    }

    /// Next event from either source. `None` once the terminal stream has
    /// ended, since there is no way left for the user to drive the session.
    pub async fn next_event(&mut self) -> Option<IoEvent> {
        tokio::select! {
            biased;
            Some(event) = self.app_rx.recv() => Some(IoEvent::App(event)),
            term = self.term_rx.recv() => term.map(IoEvent::Terminal),
        }
    }
}

/// The program being edited: a file on disk plus the language it runs as.
pub struct SourceFile {
    pub path: PathBuf,
    /// Language id as given by the user or inferred from the extension.
    /// Validated on every submit.
    pub language: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, language: Option<String>) -> Result<Self> {
        let path = path.into();
        let language = match language {
            Some(language) => language,
            None => Language::from_path(&path)
                .map(|l| l.id().to_string())
                .with_context(|| {
                    format!(
                        "cannot infer a language from {}; pass --language ({})",
                        path.display(),
                        Language::supported_list()
                    )
                })?,
        };
        Ok(Self { path, language })
    }

    /// Whether runs need the execution service. Unknown languages count as
    /// remote so the submit itself reports them.
    pub fn needs_connection(&self) -> bool {
        self.language
            .parse::<Language>()
            .map_or(true, Language::executes_remotely)
    }

    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))
    }
}

/// Per-loop state not owned by the session.
struct LoopLocals {
    /// A run was requested while the connection was not open. It goes out as
    /// soon as the next `Connected` arrives.
    pending_submit: bool,
}

/// Run an interactive session until the user exits.
///
/// The file is submitted once on start (after the connection opens for remote
/// languages) and again on every Ctrl+R, which first stops any active run.
pub async fn run_session<C: Connector, W: Write>(
    session: &mut ExecutionSession<C>,
    source: &SourceFile,
    renderer: &mut Renderer<W>,
    input: &mut InputHandler,
    io: &mut Io,
) -> Result<()> {
    let mut locals = LoopLocals {
        pending_submit: false,
    };
    if source.needs_connection() {
        session.connect();
    }
    submit_file(session, source, renderer, input, &mut locals).await;

    while let Some(io_event) = io.next_event().await {
        match io_event {
            IoEvent::App(event) => {
                let updates = session.handle_event(event);
                let connected = updates.contains(&SessionUpdate::Connected);
                apply_updates(&updates, renderer, input);
                if connected && locals.pending_submit {
                    submit_file(session, source, renderer, input, &mut locals).await;
                }
            }
            IoEvent::Terminal(Event::Key(key)) => match input.handle_key(&key) {
                InputAction::None => {}
                InputAction::Activated | InputAction::Edited => {
                    renderer.show_input(input.buffer(), input.placeholder());
                }
                InputAction::Cancel => renderer.hide_input(),
                InputAction::Submit(line) => {
                    renderer.hide_input();
                    match session.submit_input(&line) {
                        Ok(updates) => apply_updates(&updates, renderer, input),
                        Err(e) => renderer.render_error(&e),
                    }
                }
                InputAction::Stop => {
                    if !session.state().is_running() {
                        break;
                    }
                    renderer.hide_input();
                    input.deactivate();
                    let updates = session.stop();
                    apply_updates(&updates, renderer, input);
                }
                InputAction::Rerun => {
                    let updates = session.stop();
                    apply_updates(&updates, renderer, input);
                    submit_file(session, source, renderer, input, &mut locals).await;
                }
                InputAction::Clear => {
                    let updates = session.clear();
                    apply_updates(&updates, renderer, input);
                }
                InputAction::Exit => break,
            },
            IoEvent::Terminal(_) => {}
        }
    }

    renderer.hide_input();
    let updates = session.shutdown();
    apply_updates(&updates, renderer, input);
    renderer.render_exit();
    info!("Session closed");
    Ok(())
}

/// Read the file, lint it, and submit it. An unreadable file is reported and
/// leaves the session as it was; Ctrl+R tries again.
async fn submit_file<C: Connector, W: Write>(
    session: &mut ExecutionSession<C>,
    source: &SourceFile,
    renderer: &mut Renderer<W>,
    input: &mut InputHandler,
    locals: &mut LoopLocals,
) {
    locals.pending_submit = false;
    let code = match source.read().await {
        Ok(code) => code,
        Err(e) => {
            warn!(path = %source.path.display(), "{e:#}");
            renderer.render_error(&format!("{e:#}"));
            return;
        }
    };

    if let Ok(language) = source.language.parse::<Language>()
        && let Some(warning) = lint::check(language, &code)
    {
        renderer.render_warning(&warning);
    }

    match session.submit(&code, &source.language) {
        Ok(updates) => {
            renderer.hide_input();
            input.deactivate();
            apply_updates(&updates, renderer, input);
        }
        Err(SessionError::TransportUnavailable) => {
            debug!(path = %source.path.display(), "Deferring run until connected");
            locals.pending_submit = true;
            renderer.render_waiting_for_connection();
        }
        Err(e) => renderer.render_error(&e),
    }
}

/// Render session updates and keep the input line in step with the prompt
/// state: it opens (with the language's hint) when a prompt is detected, and
/// is redrawn below any output that arrived while it was open.
fn apply_updates<W: Write>(
    updates: &[SessionUpdate],
    renderer: &mut Renderer<W>,
    input: &mut InputHandler,
) {
    if updates.is_empty() {
        return;
    }
    renderer.hide_input();
    for update in updates {
        renderer.render_update(update);
        match update {
            SessionUpdate::PromptDetected { hint, .. } if !input.is_active() => {
                input.activate(Some(*hint));
            }
            SessionUpdate::RunEnded(_) | SessionUpdate::PromptCleared
                if input.is_active() && input.buffer().is_empty() =>
            {
                input.deactivate();
            }
            _ => {}
        }
    }
    if input.is_active() {
        renderer.show_input(input.buffer(), input.placeholder());
    }
}

/// Short name of a source file for headers.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
