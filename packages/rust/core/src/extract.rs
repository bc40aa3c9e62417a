//! Raw-text extraction collaborator.
//!
//! Consumes a source document path and produces its page-ordered text. An
//! unreadable or empty source is fatal to the whole pipeline — there is
//! nothing to index.

use std::path::Path;

use tracing::{info, instrument};

use bookdex_shared::{BookdexError, Result};

/// Boundary to whatever can turn a source document into plain text.
pub trait TextExtractor {
    /// Page-ordered text of the document at `source`.
    fn extract(&self, source: &Path) -> Result<String>;
}

/// Pick an extractor for a source file by extension.
pub fn extractor_for(source: &Path) -> Result<Box<dyn TextExtractor>> {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "pdf" => Ok(Box::new(PdfExtractor)),
        "txt" | "md" | "text" | "" => Ok(Box::new(PlainTextExtractor)),
        other => Err(BookdexError::extraction(format!(
            "unsupported source format '.{other}' for {}",
            source.display()
        ))),
    }
}

/// Reads a plain-text source verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    #[instrument(skip_all, fields(source = %source.display()))]
    fn extract(&self, source: &Path) -> Result<String> {
        let text = std::fs::read_to_string(source).map_err(|e| {
            BookdexError::extraction(format!("cannot read {}: {e}", source.display()))
        })?;

        if text.trim().is_empty() {
            return Err(BookdexError::extraction(format!(
                "{} contains no text",
                source.display()
            )));
        }

        info!(chars = text.len(), "plain text extracted");
        Ok(text)
    }
}

/// Extracts text from PDF sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    #[instrument(skip_all, fields(source = %source.display()))]
    fn extract(&self, source: &Path) -> Result<String> {
        let text = pdf_extract::extract_text(source).map_err(|e| {
            BookdexError::extraction(format!("cannot extract {}: {e}", source.display()))
        })?;

        if text.trim().is_empty() {
            return Err(BookdexError::extraction(format!(
                "{} contains no extractable text",
                source.display()
            )));
        }

        info!(chars = text.len(), "pdf text extracted");
        Ok(text)
    }
}
