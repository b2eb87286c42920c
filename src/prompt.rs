//! Heuristic detection of a remote program blocked on a line read.
//!
//! The execution service never says "waiting for input". Instead the trailing
//! line of each output chunk is matched against an ordered rule list for the
//! active language, then against a generic list. Both false positives
//! (ordinary output ending in a colon) and false negatives (unrecognised
//! prompts) are expected.

use std::collections::HashMap;

use regex_lite::Regex;
use tracing::warn;

use crate::language::Language;

/// Rules that apply to every language, checked after the language's own.
const GENERIC_RULES: &[&str] = &[
    r"[:?>]$",
    r"(?i)\benter\s+(a|an|the|your)?\s*(number|value|name|text|string|integer|word|input)s?\b",
    r"(?i)^(please\s+)?(input|type|provide)\b",
];

/// Per-language rules: constructs resembling the runtime's console read call,
/// plus the phrasing programs in that language commonly prompt with.
fn builtin_rules(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &[r"\binput\s*\(", r"(?i)\b(enter|type)\b"],
        Language::JavaScript => &[
            r"\breadline\b",
            r"\bprompt\s*\(",
            r"(?i)\b(enter|type)\b",
        ],
        Language::Java => &[r"(?i)\bscanner\b", r"(?i)\b(enter|type)\b"],
        Language::Cpp => &[r"\bcin\s*>>", r"(?i)\b(enter|type)\b"],
        Language::Rust => &[
            r"\bread_line\b",
            r"(?i)\bstdin\b",
            r"(?i)\b(enter|type)\b",
        ],
        Language::Php => &[
            r"\breadline\s*\(",
            r"fgets\s*\(\s*STDIN",
            r"(?i)\b(enter|type)\b",
        ],
        Language::Html => &[],
    }
}

/// Derived prompt state. Never stored independently of the transcript it was
/// computed from.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PromptState {
    pub awaiting_input: bool,
    pub prompt_text: String,
}

impl PromptState {
    pub fn awaiting(prompt_text: impl Into<String>) -> Self {
        Self {
            awaiting_input: true,
            prompt_text: prompt_text.into(),
        }
    }
}

/// Data-driven rule table: language → ordered patterns, plus a generic
/// fallback list.
pub struct PromptDetector {
    rules: HashMap<Language, Vec<Regex>>,
    generic: Vec<Regex>,
}

impl Default for PromptDetector {
    fn default() -> Self {
        let rules = Language::ALL
            .into_iter()
            .map(|lang| (lang, compile_all(builtin_rules(lang))))
            .collect();
        Self {
            rules,
            generic: compile_all(GENERIC_RULES),
        }
    }
}

impl PromptDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule for `language`, evaluated after the existing ones.
    pub fn with_rule(
        mut self,
        language: Language,
        pattern: &str,
    ) -> Result<Self, regex_lite::Error> {
        let re = Regex::new(pattern)?;
        self.rules.entry(language).or_default().push(re);
        Ok(self)
    }

    /// Append a rule to the generic fallback list.
    pub fn with_generic_rule(mut self, pattern: &str) -> Result<Self, regex_lite::Error> {
        self.generic.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Evaluate one freshly appended chunk.
    ///
    /// Returns the prompt text (the chunk's trailing non-empty line, trimmed)
    /// if any rule matches it.
    pub fn detect(&self, language: Language, chunk: &str) -> Option<String> {
        let line = last_line(chunk)?;
        let language_rules = self
            .rules
            .get(&language)
            .map(Vec::as_slice)
            .unwrap_or_default();
        language_rules
            .iter()
            .chain(&self.generic)
            .any(|re| re.is_match(line))
            .then(|| line.to_string())
    }
}

/// The trailing non-empty line of `chunk`, with surrounding whitespace removed.
pub fn last_line(chunk: &str) -> Option<&str> {
    chunk.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = *p, error = %e, "skipping invalid prompt rule");
                None
            }
        })
        .collect()
}
