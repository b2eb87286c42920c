use crate::language::Language;

/// Everything the session can refuse or report. None of these are fatal: the
/// worst outcome is the session returning to idle with the error displayed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("not connected to the execution service")]
    TransportUnavailable,
    #[error("Language \"{attempted}\" is not supported.\nSupported languages: {}", Language::supported_list())]
    UnsupportedLanguage { attempted: String },
    #[error("a run is already in progress")]
    RunInProgress,
    #[error("no program is running")]
    NoActiveRun,
    #[error("remote program failed: {0}")]
    RemoteRuntimeError(String),
    #[error("suggestion service failed: {0}")]
    SuggestionServiceFailure(String),
    #[error("malformed message from execution service: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_names_the_supported_set() {
        let err = SessionError::UnsupportedLanguage {
            attempted: "cobol".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("Language \"cobol\" is not supported."));
        assert!(text.ends_with("python, javascript, html, java, cpp, rust, php"));
    }
}
