use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::language::Language;
use crate::suggest::{SuggestionService, generate_or_fallback};

/// Ask for a sample program in `language` and print it, or write it to
/// `output`. A failed request produces the placeholder comment rather than an
/// error.
pub async fn generate<W: Write>(
    service: &dyn SuggestionService,
    language: &str,
    output: Option<&Path>,
    out: &mut W,
) -> Result<()> {
    let language: Language = language.parse()?;
    let code = generate_or_fallback(service, language).await;
    match output {
        Some(path) => {
            tokio::fs::write(path, format!("{code}\n"))
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(out, "Wrote {language} sample to {}", path.display())?;
        }
        None => writeln!(out, "{code}")?,
    }
    Ok(())
}
