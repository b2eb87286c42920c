//! Cheap local checks run before code is submitted.
//!
//! These only produce warnings; the run goes ahead regardless and the
//! execution service has the final word.

use crate::language::Language;

const BRACKETS: [(char, char); 3] = [('(', ')'), ('{', '}'), ('[', ']')];

/// Return a warning for obvious syntax problems in `code`, if any.
pub fn check(language: Language, code: &str) -> Option<String> {
    if code.trim().is_empty() {
        return None;
    }
    match language {
        Language::Python => check_indentation(code),
        Language::JavaScript | Language::Java => check_brackets(code),
        _ => None,
    }
}

/// Python blocks must be indented in multiples of four spaces.
fn check_indentation(code: &str) -> Option<String> {
    let inconsistent = code
        .lines()
        .filter(|line| !line.trim().is_empty())
        .any(|line| (line.len() - line.trim_start_matches(' ').len()) % 4 != 0);
    inconsistent.then(|| {
        "Indentation Error: Python requires consistent indentation (use 4 spaces)".to_string()
    })
}

fn check_brackets(code: &str) -> Option<String> {
    let mut stack = Vec::new();
    for c in code.chars() {
        if let Some(&(open, close)) = BRACKETS.iter().find(|(open, _)| *open == c) {
            stack.push((open, close));
        } else if BRACKETS.iter().any(|(_, close)| *close == c) {
            match stack.pop() {
                Some((_, close)) if close == c => {}
                _ => return Some(format!("Syntax Error: Mismatched bracket near \"{c}\"")),
            }
        }
    }
    stack
        .last()
        .map(|(open, _)| format!("Syntax Error: Unclosed bracket \"{open}\""))
}
