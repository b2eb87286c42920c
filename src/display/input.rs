use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Result of processing a key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Nothing for the caller to do.
    None,
    /// First character typed while inactive. The caller should draw the
    /// input line.
    Activated,
    /// The buffer changed; redraw it.
    Edited,
    /// User pressed Enter. The line may be empty: a bare Enter is valid input
    /// for a program reading a line.
    Submit(String),
    /// User cancelled input (Escape).
    Cancel,
    /// Ctrl-C: stop the running program, or quit when nothing is running.
    Stop,
    /// Ctrl-D.
    Exit,
    /// Ctrl-R: re-read the source file and run it again.
    Rerun,
    /// Ctrl-L.
    Clear,
}

/// Single-line editor for program input in raw mode.
///
/// Only tracks the buffer; drawing is left to the renderer so that the input
/// line can be erased and redrawn around incoming output.
#[derive(Default)]
pub struct InputHandler {
    buffer: String,
    active: bool,
    placeholder: Option<&'static str>,
}

impl InputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Hint shown while the buffer is empty.
    pub fn placeholder(&self) -> Option<&'static str> {
        self.placeholder
    }

    /// Open the input line with an empty buffer.
    pub fn activate(&mut self, placeholder: Option<&'static str>) {
        self.buffer.clear();
        self.active = true;
        self.placeholder = placeholder;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.buffer.clear();
        self.placeholder = None;
    }

    /// Process a terminal key event. Returns the action to take.
    pub fn handle_key(&mut self, event: &KeyEvent) -> InputAction {
        if event.kind == KeyEventKind::Release {
            return InputAction::None;
        }
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            return match event.code {
                KeyCode::Char('c') => InputAction::Stop,
                KeyCode::Char('d') => InputAction::Exit,
                KeyCode::Char('r') => InputAction::Rerun,
                KeyCode::Char('l') => InputAction::Clear,
                _ => InputAction::None,
            };
        }

        if !self.active {
            return match event.code {
                KeyCode::Char(c) => {
                    self.activate(None);
                    self.buffer.push(c);
                    InputAction::Activated
                }
                _ => InputAction::None,
            };
        }

        match event.code {
            KeyCode::Char(c) => {
                self.buffer.push(c);
                InputAction::Edited
            }
            KeyCode::Backspace => {
                if self.buffer.pop().is_some() {
                    InputAction::Edited
                } else {
                    InputAction::None
                }
            }
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.buffer);
                self.deactivate();
                InputAction::Submit(text)
            }
            KeyCode::Esc => {
                self.deactivate();
                InputAction::Cancel
            }
            _ => InputAction::None,
        }
    }
}
