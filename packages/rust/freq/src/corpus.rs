//! Corpus-frequency lookup collaborator.
//!
//! Maps a word to its general-language frequency. Unknown words answer 0.0
//! rather than failing, so the analyzer never aborts on vocabulary gaps.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use bookdex_shared::{BookdexError, Result};

/// External word → general-language frequency lookup.
pub trait CorpusFrequency {
    /// Frequency of `word` in general language, `>= 0.0`; 0.0 when unknown.
    fn lookup(&self, word: &str) -> f64;
}

/// Corpus that knows nothing: every word is maximally document-specific.
///
/// With this corpus the noise filter degrades to document frequency alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCorpus;

impl CorpusFrequency for NullCorpus {
    fn lookup(&self, _word: &str) -> f64 {
        0.0
    }
}

/// File-backed corpus: one `word<whitespace>frequency` pair per line.
///
/// Lines that fail to parse are skipped with a warning; a wordlist with
/// gaps is still a usable corpus.
#[derive(Debug, Clone, Default)]
pub struct WordlistCorpus {
    table: HashMap<String, f64>,
}

impl WordlistCorpus {
    /// Load a wordlist file. Empty lines and `#` comments are ignored.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| BookdexError::io(path, e))?;
        let corpus = Self::from_str_table(&content);
        info!(path = %path.display(), words = corpus.table.len(), "wordlist corpus loaded");
        Ok(corpus)
    }

    fn from_str_table(content: &str) -> Self {
        let mut table = HashMap::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(word), Some(freq)) = (parts.next(), parts.next()) else {
                warn!(line = line_no + 1, "skipping malformed wordlist line");
                continue;
            };

            match freq.parse::<f64>() {
                Ok(freq) if freq >= 0.0 => {
                    table.insert(word.to_lowercase(), freq);
                }
                _ => warn!(line = line_no + 1, "skipping unparsable frequency"),
            }
        }

        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl CorpusFrequency for WordlistCorpus {
    fn lookup(&self, word: &str) -> f64 {
        self.table.get(word).copied().unwrap_or(0.0)
    }
}
