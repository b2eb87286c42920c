use crate::error::SessionError;

use super::types::InboundMessage;

/// Parse one WebSocket text frame into an `InboundMessage`.
///
/// Returns `Ok(None)` for blank frames.
/// Returns `Err` for malformed JSON or unknown message types; the caller logs
/// and drops the frame without tearing down the connection.
pub fn parse_message(frame: &str) -> Result<Option<InboundMessage>, SessionError> {
    let frame = frame.trim();
    if frame.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(frame)
        .map(Some)
        .map_err(|e| SessionError::ParseError(e.to_string()))
}
