use crate::error::SessionError;
use crate::language::Language;
use crate::prompt::PromptState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    #[default]
    Closed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// Tracks accumulated session state across events.
#[derive(Debug, Default)]
pub struct SessionState {
    pub run_state: RunState,
    /// Language of the most recent run.
    pub language: Option<Language>,
    /// Incremented by every run, local previews included. Suggestions carry
    /// the id of the run they were requested for.
    pub run_id: u64,
    /// Source of the most recent run, kept for suggestion requests.
    pub code: String,
    /// Last error shown to the user.
    pub error: Option<SessionError>,
    /// Explanation for `error`, once the suggestion service answers.
    pub suggestion: Option<String>,
    pub prompt: PromptState,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }
}
