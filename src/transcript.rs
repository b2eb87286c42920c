//! The output pane's text: remote output plus locally echoed input.

/// Append-only text for one run.
///
/// Local input is always echoed immediately. The service may repeat it as an
/// `input` event; an event equal to the pending line is dropped. Stdout is
/// never altered, so a program that prints back what it read keeps its output.
#[derive(Debug, Default)]
pub struct Transcript {
    text: String,
    /// The last submitted line, until the service's `input` event for it.
    pending_echo: Option<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.pending_echo = None;
    }

    /// Replace the whole transcript (local preview runs).
    pub fn replace(&mut self, text: &str) {
        self.clear();
        self.text.push_str(text);
    }

    /// Append a stdout chunk verbatim.
    pub fn append_output(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    /// Echo a line the user submitted. `line` includes its trailing newline.
    pub fn echo_input(&mut self, line: &str) {
        self.text.push_str(line);
        self.pending_echo = Some(line.to_string());
    }

    /// Reconcile an `input` echo from the service. Returns what was appended:
    /// nothing when it repeats the pending local echo.
    pub fn append_input_echo<'a>(&mut self, data: &'a str) -> &'a str {
        let appended = match self.pending_echo.take() {
            Some(pending) if is_echo_of(data, &pending) => "",
            _ => data,
        };
        self.text.push_str(appended);
        appended
    }
}

/// Whether `data` repeats `line`, tolerating a remote echo that dropped or
/// changed the trailing newline.
fn is_echo_of(data: &str, line: &str) -> bool {
    data.trim_end_matches(['\r', '\n']) == line.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_concatenates_in_order() {
        let mut t = Transcript::new();
        for chunk in ["a", "b\n", "", "c"] {
            t.append_output(chunk);
        }
        assert_eq!(t.as_str(), "ab\nc");
    }

    #[test]
    fn input_echo_event_is_suppressed() {
        let mut t = Transcript::new();
        t.append_output("Enter name:\n");
        t.echo_input("Alice\n");
        assert_eq!(t.append_input_echo("Alice\n"), "");
        assert_eq!(t.as_str(), "Enter name:\nAlice\n");
    }

    #[test]
    fn echo_without_newline_is_suppressed() {
        let mut t = Transcript::new();
        t.echo_input("7\n");
        assert_eq!(t.append_input_echo("7"), "");
        assert_eq!(t.as_str(), "7\n");
    }

    #[test]
    fn program_printing_its_input_keeps_its_output() {
        let mut t = Transcript::new();
        t.append_output("Name: ");
        t.echo_input("Alice\n");
        t.append_output("Alice\n");
        // The service's echo arriving after the program's own line.
        assert_eq!(t.append_input_echo("Alice\n"), "");
        assert_eq!(t.as_str(), "Name: Alice\nAlice\n");
    }

    #[test]
    fn echo_is_matched_only_once() {
        let mut t = Transcript::new();
        t.echo_input("5\n");
        assert_eq!(t.append_input_echo("5\n"), "");
        assert_eq!(t.append_input_echo("5\n"), "5\n");
        assert_eq!(t.as_str(), "5\n5\n");
    }

    #[test]
    fn different_input_event_is_kept() {
        let mut t = Transcript::new();
        t.echo_input("5\n");
        assert_eq!(t.append_input_echo("6\n"), "6\n");
        assert_eq!(t.as_str(), "5\n6\n");
    }

    #[test]
    fn unrelated_input_event_is_kept() {
        let mut t = Transcript::new();
        assert_eq!(t.append_input_echo("other\n"), "other\n");
        assert_eq!(t.as_str(), "other\n");
    }

    #[test]
    fn clear_forgets_pending_echo() {
        let mut t = Transcript::new();
        t.echo_input("x\n");
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.append_input_echo("x\n"), "x\n");
    }
}
