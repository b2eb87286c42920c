//! The fixed set of languages the execution service understands.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    Html,
    Java,
    Cpp,
    Rust,
    Php,
}

impl Language {
    /// All supported languages, in the order they are presented to users.
    pub const ALL: [Language; 7] = [
        Language::Python,
        Language::JavaScript,
        Language::Html,
        Language::Java,
        Language::Cpp,
        Language::Rust,
        Language::Php,
    ];

    /// Identifier used on the wire and on the command line.
    pub fn id(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Html => "html",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Rust => "rust",
            Language::Php => "php",
        }
    }

    /// Whether runs are sent to the execution service. Markup languages are
    /// previewed locally instead.
    pub fn executes_remotely(self) -> bool {
        !matches!(self, Language::Html)
    }

    /// Comma-separated list of supported identifiers.
    pub fn supported_list() -> String {
        Self::ALL.map(Language::id).join(", ")
    }

    /// Infer the language from a source file's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "py" => Some(Language::Python),
            "js" | "mjs" | "cjs" => Some(Language::JavaScript),
            "html" | "htm" => Some(Language::Html),
            "java" => Some(Language::Java),
            "cpp" | "cc" | "cxx" | "hpp" => Some(Language::Cpp),
            "rs" => Some(Language::Rust),
            "php" => Some(Language::Php),
            _ => None,
        }
    }

    /// Placeholder shown on the input line while the program waits for input.
    ///
    /// Runtimes that commonly read several whitespace-separated values from a
    /// single line get a hint about that shape; the line itself is always
    /// forwarded verbatim.
    pub fn input_hint(self) -> &'static str {
        match self {
            Language::Cpp | Language::Java => "values separated by spaces, then Enter",
            _ => "type input, then Enter",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.id() == s)
            .ok_or_else(|| SessionError::UnsupportedLanguage {
                attempted: s.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_id() {
        for lang in Language::ALL {
            assert_eq!(lang.id().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn rejects_unknown_language() {
        let err = "go".parse::<Language>().unwrap_err();
        assert_eq!(
            err,
            SessionError::UnsupportedLanguage {
                attempted: "go".to_string()
            }
        );
    }

    #[test]
    fn only_html_is_local() {
        let local: Vec<_> = Language::ALL
            .into_iter()
            .filter(|l| !l.executes_remotely())
            .collect();
        assert_eq!(local, vec![Language::Html]);
    }

    #[test]
    fn infers_from_extension() {
        assert_eq!(
            Language::from_path(Path::new("src/main.rs")),
            Some(Language::Rust)
        );
        assert_eq!(
            Language::from_path(Path::new("Solution.JAVA")),
            Some(Language::Java)
        );
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }
}
