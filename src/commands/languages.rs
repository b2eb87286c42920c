use std::io::Write;

use anyhow::Result;

use crate::language::Language;

/// Print the supported languages and where each one runs.
pub fn languages<W: Write>(out: &mut W) -> Result<()> {
    for language in Language::ALL {
        let mode = if language.executes_remotely() {
            "remote"
        } else {
            "local preview"
        };
        writeln!(out, "{:<12}{mode}", language.id())?;
    }
    Ok(())
}
