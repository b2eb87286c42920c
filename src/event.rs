use crate::session::transport::TransportEvent;

/// Unified application event consumed by the session's event handler.
///
/// Everything that can change session state arrives through this one channel,
/// so handlers run one at a time and transcript appends never interleave.
#[derive(Debug)]
pub enum AppEvent {
    /// Socket lifecycle and inbound frames.
    Transport(TransportEvent),
    /// A suggestion (or its fallback text) for the given run.
    Suggestion { run_id: u64, text: String },
}
