use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::event::AppEvent;
use crate::language::Language;
use crate::prompt::{PromptDetector, PromptState};
use crate::protocol::emit::{input_line, run_request};
use crate::protocol::parse::parse_message;
use crate::protocol::types::{InboundMessage, RUN_RECEIVED};
use crate::suggest::{SuggestionRequest, SuggestionService, spawn_suggestion};
use crate::transcript::Transcript;

use super::state::{ConnectionState, RunState, SessionState};
use super::transport::{Connector, Transport, TransportSignal, WsConnector};

/// Why a run went back to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Stopped,
    RemoteError,
    Disconnected,
}

/// A change the presentation layer should reflect, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Connected,
    Disconnected { retry_in: Option<Duration> },
    Reconnecting,
    RunStarted { run_id: u64, language: Language },
    RunAcknowledged,
    /// A local preview replaced the transcript.
    Preview(String),
    Output(String),
    InputEchoed(String),
    PromptDetected { prompt: String, hint: &'static str },
    PromptCleared,
    RemoteError(String),
    Suggestion(String),
    RunEnded(RunEnd),
    Cleared,
    Warning(String),
}

/// Orchestrates run lifecycles over an injected transport.
///
/// All state changes happen inside `submit`, `submit_input`, `stop`, `clear`
/// and `handle_event`, each of which runs to completion before the next.
pub struct ExecutionSession<C: Connector = WsConnector> {
    transport: Transport<C>,
    suggester: Arc<dyn SuggestionService>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    state: SessionState,
    transcript: Transcript,
    detector: PromptDetector,
}

impl<C: Connector> ExecutionSession<C> {
    pub fn new(
        transport: Transport<C>,
        suggester: Arc<dyn SuggestionService>,
        event_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            transport,
            suggester,
            event_tx,
            state: SessionState::default(),
            transcript: Transcript::new(),
            detector: PromptDetector::new(),
        }
    }

    #[must_use]
    pub fn with_detector(mut self, detector: PromptDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn transport(&self) -> &Transport<C> {
        &self.transport
    }

    pub fn connect(&mut self) {
        self.transport.connect();
    }

    /// Tear down: close the socket and cancel any pending reconnect.
    pub fn shutdown(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        if self.state.is_running() {
            updates.extend(self.end_run(RunEnd::Disconnected));
        }
        self.transport.disconnect();
        updates
    }

    /// Start a run.
    ///
    /// Local-preview languages never touch the transport: the code becomes the
    /// transcript and the session stays idle.
    pub fn submit(
        &mut self,
        code: &str,
        language: &str,
    ) -> Result<Vec<SessionUpdate>, SessionError> {
        if self.state.is_running() {
            return Err(SessionError::RunInProgress);
        }
        let language = match language.parse::<Language>() {
            Ok(language) => language,
            Err(e) => {
                self.state.error = Some(e.clone());
                self.state.suggestion = None;
                return Err(e);
            }
        };

        if !language.executes_remotely() {
            self.begin_run(code, language);
            self.transcript.replace(code);
            debug!(run_id = self.state.run_id, %language, "Local preview");
            return Ok(vec![SessionUpdate::Preview(code.to_string())]);
        }

        if !self.transport.is_open() {
            return Err(SessionError::TransportUnavailable);
        }
        self.transport.send(&run_request(code, language.id()))?;

        self.begin_run(code, language);
        self.state.run_state = RunState::Running;
        info!(run_id = self.state.run_id, %language, "Run started");
        Ok(vec![SessionUpdate::RunStarted {
            run_id: self.state.run_id,
            language,
        }])
    }

    /// Relay one line of user input to the running program.
    pub fn submit_input(&mut self, line: &str) -> Result<Vec<SessionUpdate>, SessionError> {
        if !self.state.is_running() {
            return Err(SessionError::NoActiveRun);
        }
        self.transport.send(&input_line(line))?;

        let echoed = format!("{line}\n");
        self.transcript.echo_input(&echoed);
        let mut updates = vec![SessionUpdate::InputEchoed(echoed)];
        updates.extend(self.clear_prompt());
        Ok(updates)
    }

    /// Stop waiting on the current run. The remote program is not told and may
    /// keep running server-side.
    pub fn stop(&mut self) -> Vec<SessionUpdate> {
        if self.state.is_running() {
            info!(run_id = self.state.run_id, "Run stopped by user");
            self.end_run(RunEnd::Stopped)
        } else {
            Vec::new()
        }
    }

    /// Clear the transcript and any shown error or suggestion.
    pub fn clear(&mut self) -> Vec<SessionUpdate> {
        self.transcript.clear();
        self.state.error = None;
        self.state.suggestion = None;
        vec![SessionUpdate::Cleared]
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Vec<SessionUpdate> {
        match event {
            AppEvent::Transport(event) => match self.transport.handle(event) {
                TransportSignal::Opened => vec![SessionUpdate::Connected],
                TransportSignal::Frame(text) => self.handle_frame(&text),
                TransportSignal::Closed { retry_in } => {
                    let mut updates = Vec::new();
                    if self.state.is_running() {
                        warn!(run_id = self.state.run_id, "Connection lost mid-run");
                        updates.extend(self.end_run(RunEnd::Disconnected));
                    }
                    updates.push(SessionUpdate::Disconnected { retry_in });
                    updates
                }
                TransportSignal::Reconnecting => vec![SessionUpdate::Reconnecting],
                TransportSignal::Ignored => Vec::new(),
            },
            AppEvent::Suggestion { run_id, text } => {
                if run_id == self.state.run_id {
                    self.state.suggestion = Some(text.clone());
                    vec![SessionUpdate::Suggestion(text)]
                } else {
                    debug!(run_id, current = self.state.run_id, "Discarding stale suggestion");
                    Vec::new()
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: &str) -> Vec<SessionUpdate> {
        match parse_message(frame) {
            Ok(Some(message)) => self.handle_inbound(message),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, frame, "Dropping malformed message");
                vec![SessionUpdate::Warning(e.to_string())]
            }
        }
    }

    fn handle_inbound(&mut self, message: InboundMessage) -> Vec<SessionUpdate> {
        match message {
            InboundMessage::Stdout { data } => self.handle_stdout(&data),
            InboundMessage::Stderr { data } => self.handle_stderr(data),
            InboundMessage::Run { message } => {
                if message == RUN_RECEIVED {
                    vec![SessionUpdate::RunAcknowledged]
                } else {
                    debug!(message, "Unrecognised run message");
                    Vec::new()
                }
            }
            InboundMessage::Input { input_data } => {
                let appended = self.transcript.append_input_echo(&input_data);
                if appended.is_empty() {
                    debug!("Suppressed remote input echo");
                    Vec::new()
                } else {
                    vec![SessionUpdate::InputEchoed(appended.to_string())]
                }
            }
        }
    }

    /// New output supersedes any shown error, and re-evaluates the prompt
    /// state from scratch while a run is active.
    fn handle_stdout(&mut self, data: &str) -> Vec<SessionUpdate> {
        self.transcript.append_output(data);
        self.state.error = None;
        self.state.suggestion = None;

        let mut updates = Vec::new();
        if data.is_empty() {
            return updates;
        }
        updates.push(SessionUpdate::Output(data.to_string()));
        if self.state.is_running() {
            updates.extend(self.evaluate_prompt(data));
        }
        updates
    }

    fn handle_stderr(&mut self, data: String) -> Vec<SessionUpdate> {
        self.state.error = Some(SessionError::RemoteRuntimeError(data.clone()));
        self.state.suggestion = None;
        let mut updates = vec![SessionUpdate::RemoteError(data.clone())];
        if !self.state.is_running() {
            return updates;
        }

        updates.extend(self.end_run(RunEnd::RemoteError));
        if let Some(language) = self.state.language {
            let request = SuggestionRequest {
                run_id: self.state.run_id,
                code: self.state.code.clone(),
                error: data,
                language,
            };
            spawn_suggestion(Arc::clone(&self.suggester), request, self.event_tx.clone());
        }
        updates
    }

    /// Whitespace-only chunks leave the prompt state alone.
    fn evaluate_prompt(&mut self, chunk: &str) -> Vec<SessionUpdate> {
        if chunk.trim().is_empty() {
            return Vec::new();
        }
        let Some(language) = self.state.language else {
            return Vec::new();
        };
        match self.detector.detect(language, chunk) {
            Some(prompt) => {
                debug!(prompt, "Program appears to be waiting for input");
                self.state.prompt = PromptState::awaiting(prompt.clone());
                vec![SessionUpdate::PromptDetected {
                    prompt,
                    hint: language.input_hint(),
                }]
            }
            None => self.clear_prompt(),
        }
    }

    fn clear_prompt(&mut self) -> Vec<SessionUpdate> {
        if self.state.prompt.awaiting_input {
            self.state.prompt = PromptState::default();
            vec![SessionUpdate::PromptCleared]
        } else {
            Vec::new()
        }
    }

    fn begin_run(&mut self, code: &str, language: Language) {
        self.state.run_id += 1;
        self.state.language = Some(language);
        self.state.code = code.to_string();
        self.state.error = None;
        self.state.suggestion = None;
        self.state.prompt = PromptState::default();
        self.transcript.clear();
    }

    fn end_run(&mut self, reason: RunEnd) -> Vec<SessionUpdate> {
        self.state.run_state = RunState::Idle;
        let mut updates = self.clear_prompt();
        updates.push(SessionUpdate::RunEnded(reason));
        updates
    }
}
