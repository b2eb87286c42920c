use serde::{Deserialize, Serialize};

/// Acknowledgement text the execution service sends once it has accepted a run.
pub const RUN_RECEIVED: &str = "your message has receive";

/// A message from the execution service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// A chunk of the remote program's standard output.
    #[serde(rename = "stdout")]
    Stdout {
        #[serde(default)]
        data: String,
    },
    /// Terminal error output. Ends the run.
    #[serde(rename = "stderr")]
    Stderr {
        #[serde(default)]
        data: String,
    },
    /// Receipt of a run request.
    #[serde(rename = "run")]
    Run {
        #[serde(default)]
        message: String,
    },
    /// The service echoing input it forwarded to the program.
    #[serde(rename = "input")]
    Input {
        #[serde(default)]
        input_data: String,
    },
}

/// A message to the execution service.
///
/// Input payloads travel in the `input` field (never `data`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command")]
pub enum OutboundMessage {
    #[serde(rename = "run")]
    Run {
        code: String,
        language: String,
        input: String,
    },
    #[serde(rename = "input")]
    Input { input: String },
}
