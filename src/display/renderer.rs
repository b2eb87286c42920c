use std::fmt;
use std::io::Write;
use std::time::Duration;

use crossterm::style::Print;
use crossterm::{cursor, queue, terminal};

use super::theme;
use crate::language::Language;
use crate::session::runner::{RunEnd, SessionUpdate};

/// Produces colored terminal output for a session.
///
/// Everything goes through `\r\n` line endings since the terminal is in raw
/// mode while a session is open.
pub struct Renderer<W: Write> {
    /// Whether the cursor sits at the start of a line. Program output often
    /// stops mid-line (prompts), and status lines must not be glued onto it.
    at_line_start: bool,
    /// Whether an input line is currently drawn at the saved cursor position.
    input_shown: bool,
    out: W,
}

impl<W: Write> Renderer<W> {
    pub fn with_writer(writer: W) -> Self {
        Self {
            at_line_start: true,
            input_shown: false,
            out: writer,
        }
    }

    // --- Session lifecycle ---

    pub fn render_help(&mut self) {
        let help = "type to send input · Ctrl+R re-run · Ctrl+C stop · Ctrl+L clear · Ctrl+D exit";
        self.status_line(theme::dim().apply(help));
    }

    pub fn render_session_header(&mut self, file: &str, language: &str, endpoint: Option<&str>) {
        let header = match endpoint {
            Some(endpoint) => format!("{file} ({language}) via {endpoint}"),
            None => format!("{file} ({language}) local preview"),
        };
        self.status_line(theme::dim().apply(header));
    }

    pub fn render_update(&mut self, update: &SessionUpdate) {
        match update {
            SessionUpdate::Connected => {
                self.status_line(theme::dim().apply("Connected to execution service"));
            }
            SessionUpdate::Disconnected {
                retry_in: Some(delay),
            } => {
                let text = format!(
                    "Connection lost. Reconnecting in {}",
                    format_delay(*delay)
                );
                self.status_line(theme::warning().apply(text));
            }
            SessionUpdate::Disconnected { retry_in: None } => {
                self.status_line(theme::dim().apply("Disconnected"));
            }
            SessionUpdate::Reconnecting => {
                self.status_line(theme::dim().apply("Reconnecting..."));
            }
            SessionUpdate::RunStarted { run_id, language } => {
                self.render_run_header(*run_id, *language);
            }
            SessionUpdate::RunAcknowledged => {
                self.status_line(theme::dim().apply("Code execution started"));
            }
            SessionUpdate::Preview(source) => {
                self.status_line(theme::dim().apply("Preview (rendered locally, not executed)"));
                self.write_text(source);
                self.finish_line();
            }
            SessionUpdate::Output(text) => self.write_text(text),
            SessionUpdate::InputEchoed(text) => {
                queue!(self.out, Print(theme::input_echo().apply(crlf(text)))).ok();
                self.track(text);
            }
            // The input line itself is drawn by `show_input`.
            SessionUpdate::PromptDetected { .. } | SessionUpdate::PromptCleared => {}
            SessionUpdate::RemoteError(text) => {
                self.finish_line();
                queue!(self.out, Print(theme::error().apply(crlf(text.trim_end())))).ok();
                self.at_line_start = false;
                self.finish_line();
            }
            SessionUpdate::Suggestion(text) => self.render_suggestion(text),
            SessionUpdate::RunEnded(reason) => self.render_run_end(*reason),
            SessionUpdate::Cleared => {
                queue!(
                    self.out,
                    terminal::Clear(terminal::ClearType::All),
                    cursor::MoveTo(0, 0),
                )
                .ok();
                self.at_line_start = true;
            }
            SessionUpdate::Warning(text) => self.render_warning(text),
        }
        self.out.flush().ok();
    }

    fn render_run_header(&mut self, run_id: u64, language: Language) {
        self.finish_line();
        queue!(
            self.out,
            Print(theme::run_header().apply(format!("Run {run_id}"))),
            Print(theme::dim().apply(format!(" · {language}"))),
            Print("\r\n"),
        )
        .ok();
        self.at_line_start = true;
    }

    fn render_run_end(&mut self, reason: RunEnd) {
        match reason {
            RunEnd::Stopped => self.status_line(theme::dim().apply("Stopped")),
            RunEnd::RemoteError => self.status_line(theme::error().apply("Run failed")),
            RunEnd::Disconnected => {
                self.status_line(theme::error().apply("Run interrupted: connection lost"));
            }
        }
    }

    fn render_suggestion(&mut self, text: &str) {
        self.status_line(theme::suggestion_heading().apply("Suggestion"));
        self.write_text(text.trim_end());
        self.finish_line();
    }

    pub fn render_warning(&mut self, message: &str) {
        self.status_line(theme::warning().apply(format!("Warning: {message}")));
        self.out.flush().ok();
    }

    pub fn render_error(&mut self, error: &impl fmt::Display) {
        self.finish_line();
        queue!(
            self.out,
            Print(theme::error().apply(crlf(&error.to_string()))),
            Print("\r\n")
        )
        .ok();
        self.at_line_start = true;
        self.out.flush().ok();
    }

    pub fn render_waiting_for_connection(&mut self) {
        self.status_line(theme::dim().apply("Waiting for connection, will run once connected"));
        self.out.flush().ok();
    }

    pub fn render_exit(&mut self) {
        self.status_line(theme::dim().apply("Bye"));
        self.out.flush().ok();
    }

    // --- Input line ---

    /// Draw the input line at the cursor: the buffer, or the dim placeholder
    /// while it is empty. Any previously drawn input line is replaced.
    pub fn show_input(&mut self, buffer: &str, placeholder: Option<&str>) {
        if self.input_shown {
            queue!(
                self.out,
                cursor::RestorePosition,
                terminal::Clear(terminal::ClearType::UntilNewLine),
            )
            .ok();
        } else {
            queue!(self.out, cursor::SavePosition).ok();
            self.input_shown = true;
        }
        match (buffer.is_empty(), placeholder) {
            (true, Some(hint)) => {
                queue!(
                    self.out,
                    Print(theme::dim_italic().apply(format!("({hint})"))),
                    cursor::RestorePosition,
                )
                .ok();
            }
            _ => {
                queue!(self.out, Print(buffer)).ok();
            }
        }
        self.out.flush().ok();
    }

    /// Erase the input line, leaving the cursor where it started.
    pub fn hide_input(&mut self) {
        if !self.input_shown {
            return;
        }
        queue!(
            self.out,
            cursor::RestorePosition,
            terminal::Clear(terminal::ClearType::UntilNewLine),
        )
        .ok();
        self.input_shown = false;
        self.out.flush().ok();
    }

    // --- Helpers ---

    /// Write program text, converting line endings for raw mode.
    fn write_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        queue!(self.out, Print(crlf(text))).ok();
        self.track(text);
    }

    fn track(&mut self, text: &str) {
        if !text.is_empty() {
            self.at_line_start = text.ends_with('\n');
        }
    }

    /// End the current line if output stopped mid-line.
    fn finish_line(&mut self) {
        if !self.at_line_start {
            queue!(self.out, Print("\r\n")).ok();
            self.at_line_start = true;
        }
    }

    fn status_line(&mut self, styled: impl std::fmt::Display) {
        self.finish_line();
        queue!(self.out, Print(styled), Print("\r\n")).ok();
        self.at_line_start = true;
    }

    pub fn into_writer(self) -> W {
        self.out
    }
}

/// Normalize line endings to `\r\n`.
fn crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

fn format_delay(delay: Duration) -> String {
    let millis = delay.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}
