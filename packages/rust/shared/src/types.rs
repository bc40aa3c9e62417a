//! Core domain types for bookdex document indexes.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current schema version for the index manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Length of truncated hex digests used for segment, node, and unit ids.
pub const SHORT_HASH_LEN: usize = 8;

/// First [`SHORT_HASH_LEN`] hex chars of the SHA-256 of `text`.
///
/// Every identifier in an index (segment ids, tree node keys, unit ids) is
/// derived through this one function so re-runs over unchanged input always
/// reproduce the same ids.
pub fn short_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..SHORT_HASH_LEN].to_string()
}

// ---------------------------------------------------------------------------
// DocId
// ---------------------------------------------------------------------------

/// Stable document identifier, derived from the source file name.
///
/// Unlike random ids, a `DocId` is reproducible: indexing the same source
/// file twice addresses the same output namespace and cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Build a `DocId` from a human-supplied name or file stem.
    ///
    /// Lowercases, maps whitespace/underscores to dashes, and drops any
    /// character that is not alphanumeric or a dash.
    pub fn from_name(name: &str) -> Self {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
            .filter(|c| c.is_alphanumeric() || *c == '-')
            .collect();

        // Collapse runs of dashes left behind by punctuation.
        let mut collapsed = String::with_capacity(slug.len());
        let mut prev_dash = false;
        for c in slug.chars() {
            if c == '-' {
                if !prev_dash && !collapsed.is_empty() {
                    collapsed.push(c);
                }
                prev_dash = true;
            } else {
                collapsed.push(c);
                prev_dash = false;
            }
        }
        let collapsed = collapsed.trim_end_matches('-').to_string();

        if collapsed.is_empty() {
            Self("document".to_string())
        } else {
            Self(collapsed)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// A unit of document structure: prose paragraph or source-code block.
///
/// Serialized with a `type` tag so stage outputs remain a flat, ordered list
/// that interleaves both kinds in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Paragraph(ParagraphSegment),
    SourceCode(CodeSegment),
}

impl Segment {
    /// Content-hash id of the segment.
    pub fn id(&self) -> &str {
        match self {
            Segment::Paragraph(p) => &p.id,
            Segment::SourceCode(c) => &c.id,
        }
    }

    /// Raw text of the segment.
    pub fn text(&self) -> &str {
        match self {
            Segment::Paragraph(p) => &p.text,
            Segment::SourceCode(c) => &c.text,
        }
    }

    /// Surviving keywords; code segments carry none.
    pub fn keywords(&self) -> &[String] {
        match self {
            Segment::Paragraph(p) => &p.keywords,
            Segment::SourceCode(_) => &[],
        }
    }
}

/// A prose paragraph with sentence structure and ranked keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphSegment {
    /// Content-hash id ([`short_hash`] of the trimmed text).
    pub id: String,
    pub text: String,
    /// Sorted, deduplicated tokens that survive the frequency filter.
    pub keywords: Vec<String>,
    /// Fraction of the paragraph's tokens that are surviving keywords.
    pub weight: f64,
    pub sentences: Vec<Sentence>,
    /// Summary produced by the normalization stage, if it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A source-code block or inline code span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSegment {
    /// Content-hash id ([`short_hash`] of the trimmed text).
    pub id: String,
    pub text: String,
    /// Classified language name, or "unknown".
    pub language: String,
    pub weight: f64,
    /// Id of the nearest preceding paragraph, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_paragraph_id: Option<String>,
}

/// A sentence within a paragraph segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    /// `<segment_id>_<hash>` — scoped to the owning paragraph.
    pub id: String,
    pub text: String,
    /// Sentence tokens present in the document's frequency table.
    pub keywords: Vec<String>,
    pub weight: f64,
}

// ---------------------------------------------------------------------------
// Frequency table
// ---------------------------------------------------------------------------

/// One surviving word with its document and corpus frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub word: String,
    /// Occurrences across the document's paragraph segments.
    pub document_frequency: u64,
    /// General-language frequency from the corpus collaborator (0.0 if unknown).
    pub corpus_frequency: f64,
    /// Ids of the paragraph segments the word occurs in.
    pub segments: BTreeSet<String>,
}

/// The document's frequency table, ordered by
/// (document_frequency desc, corpus_frequency asc, word asc).
///
/// The ordering is part of the on-disk contract: keyword ranking and unit-id
/// hashing both reproduce it from the raw frequencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable {
    pub entries: Vec<FrequencyEntry>,
}

impl FrequencyTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a hash-map view for O(1) per-word lookups.
    pub fn lookup(&self) -> FrequencyLookup<'_> {
        let mut words = HashMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            words.insert(
                entry.word.as_str(),
                (entry.document_frequency, entry.corpus_frequency),
            );
        }
        FrequencyLookup { words }
    }
}

/// Borrowed O(1) lookup view over a [`FrequencyTable`].
#[derive(Debug)]
pub struct FrequencyLookup<'a> {
    words: HashMap<&'a str, (u64, f64)>,
}

impl FrequencyLookup<'_> {
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains_key(word)
    }

    /// Document frequency, or 0 for a word outside the table.
    pub fn document_frequency(&self, word: &str) -> u64 {
        self.words.get(word).map(|(d, _)| *d).unwrap_or(0)
    }

    /// Corpus frequency, or 0.0 for a word outside the table.
    pub fn corpus_frequency(&self, word: &str) -> f64 {
        self.words.get(word).map(|(_, c)| *c).unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// A leaf record in the semantic tree: one indexed segment addressed by its
/// keyword set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Order-independent 8-hex digest of the keyword set (see bookdex-tree).
    pub id: String,
    /// Node key of the last path element, if the path is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Sorted snapshot of the keyword set at insertion time.
    pub keywords: Vec<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

// ---------------------------------------------------------------------------
// IndexManifest
// ---------------------------------------------------------------------------

/// The `manifest.json` structure stored at the root of each index directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Stable document identifier.
    pub doc_id: DocId,
    /// Human-readable name.
    pub name: String,
    /// Path of the source document that was indexed.
    pub source_path: String,
    /// Tool version that created this index.
    pub tool_version: String,
    /// When the index was first created.
    pub created_at: DateTime<Utc>,
    /// When the index was last refreshed.
    pub updated_at: DateTime<Utc>,
    /// Number of segments in the document.
    pub segment_count: usize,
    /// Number of surviving words in the frequency table.
    pub keyword_count: usize,
    /// Number of units stored in the semantic tree.
    pub unit_count: usize,
}
