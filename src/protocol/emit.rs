use super::types::OutboundMessage;

/// Build the run request for `code`. The initial input is always empty;
/// interactive input is relayed separately.
pub fn run_request(code: &str, language: &str) -> OutboundMessage {
    OutboundMessage::Run {
        code: code.to_string(),
        language: language.to_string(),
        input: String::new(),
    }
}

/// Build an input message for one line typed by the user. The trailing
/// newline the remote line-reader expects is appended here.
pub fn input_line(line: &str) -> OutboundMessage {
    OutboundMessage::Input {
        input: format!("{line}\n"),
    }
}

/// Serialize a message as a single JSON text frame.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen in practice).
pub fn to_frame(message: &OutboundMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}
