//! Document segmentation: splits raw text into paragraph and source-code
//! blocks, then enriches them into [`Segment`] records.
//!
//! Splitting is deliberately separate from annotation: the frequency
//! analyzer counts words over the raw paragraph blocks, and annotation then
//! needs the resulting table to pick each segment's keywords. Both phases
//! share this crate's splitter so segment ids agree across stage outputs.

pub mod language;

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use bookdex_shared::{
    CodeSegment, FrequencyLookup, ParagraphSegment, Segment, Sentence, short_hash,
};

pub use language::{LanguageGuesser, MarkerLanguageGuesser, document_fallback_language};

// ---------------------------------------------------------------------------
// Block splitting
// ---------------------------------------------------------------------------

/// Kind of a raw block before annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Code,
}

/// A contiguous region of the raw text: prose or indented code.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub kind: BlockKind,
    pub text: String,
}

impl RawBlock {
    /// Content-hash id this block will carry as a segment.
    pub fn id(&self) -> String {
        short_hash(self.text.trim())
    }
}

/// A run of one or more consecutive indented lines (leading tab or ≥4
/// spaces) is a source-code block.
static CODE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)((?:^(?: {4}|\t).+\n?)+)").expect("valid regex"));

/// Blank-line runs separate paragraphs within a prose region.
static PARAGRAPH_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));

/// Lowercase word tokenizer shared by frequency counting and annotation.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

/// Inline code span delimited by backticks.
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));

/// Split raw text into ordered paragraph and code blocks.
pub fn split_blocks(raw_text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut last_index = 0;

    for m in CODE_BLOCK_RE.find_iter(raw_text) {
        if m.start() > last_index {
            push_paragraphs(&raw_text[last_index..m.start()], &mut blocks);
        }

        let code_text = m.as_str().trim_matches('\n');
        if !code_text.trim().is_empty() {
            blocks.push(RawBlock {
                kind: BlockKind::Code,
                text: code_text.to_string(),
            });
        }
        last_index = m.end();
    }

    if last_index < raw_text.len() {
        push_paragraphs(&raw_text[last_index..], &mut blocks);
    }

    debug!(blocks = blocks.len(), "raw text split");
    blocks
}

/// Split a prose region on blank lines and push the non-empty paragraphs.
fn push_paragraphs(region: &str, blocks: &mut Vec<RawBlock>) {
    for para in PARAGRAPH_BREAK_RE.split(region) {
        let text = para.trim();
        if !text.is_empty() {
            blocks.push(RawBlock {
                kind: BlockKind::Paragraph,
                text: text.to_string(),
            });
        }
    }
}

/// Lowercase word tokens of `text`, in order, with repeats.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Split paragraph text into sentences on terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // Only break when the punctuation ends a word, not e.g. "3.14".
            if chars.peek().is_none_or(|next| next.is_whitespace()) {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// Enrich raw blocks into full [`Segment`] records.
///
/// Paragraphs get sentences and keywords (tokens surviving the frequency
/// filter, sorted and deduplicated); inline backtick spans become code
/// segments linked to their containing paragraph; indented code blocks are
/// classified and linked to the nearest preceding paragraph.
pub fn annotate(
    blocks: &[RawBlock],
    lookup: &FrequencyLookup<'_>,
    guesser: &dyn LanguageGuesser,
    fallback_language: Option<&str>,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last_paragraph_id: Option<String> = None;

    for block in blocks {
        match block.kind {
            BlockKind::Paragraph => {
                let paragraph = annotate_paragraph(&block.text, lookup);
                last_paragraph_id = Some(paragraph.id.clone());
                let paragraph_id = paragraph.id.clone();
                segments.push(Segment::Paragraph(paragraph));

                // Inline code spans attach to the paragraph that holds them.
                for span in INLINE_CODE_RE.captures_iter(&block.text) {
                    let code = span[1].trim();
                    if code.is_empty() {
                        continue;
                    }
                    segments.push(Segment::SourceCode(CodeSegment {
                        id: short_hash(code),
                        text: code.to_string(),
                        language: "unknown".to_string(),
                        weight: 0.0,
                        linked_paragraph_id: Some(paragraph_id.clone()),
                    }));
                }
            }
            BlockKind::Code => {
                let language = guesser
                    .guess(&block.text)
                    .or_else(|| fallback_language.map(str::to_string))
                    .unwrap_or_else(|| "unknown".to_string());

                segments.push(Segment::SourceCode(CodeSegment {
                    id: block.id(),
                    text: block.text.trim().to_string(),
                    language,
                    weight: 0.0,
                    linked_paragraph_id: last_paragraph_id.clone(),
                }));
            }
        }
    }

    debug!(segments = segments.len(), "blocks annotated");
    segments
}

/// Build a paragraph segment: sentences, keywords, coverage weight.
fn annotate_paragraph(text: &str, lookup: &FrequencyLookup<'_>) -> ParagraphSegment {
    let text = text.trim();
    let id = short_hash(text);

    let mut paragraph_keywords: BTreeSet<String> = BTreeSet::new();
    let mut sentences = Vec::new();

    for sentence_text in split_sentences(text) {
        let tokens = tokenize(&sentence_text);
        let keywords: BTreeSet<String> = tokens
            .iter()
            .filter(|t| lookup.contains(t))
            .cloned()
            .collect();

        let weight = coverage(keywords.len(), tokens.len());
        paragraph_keywords.extend(keywords.iter().cloned());

        sentences.push(Sentence {
            id: format!("{id}_{}", short_hash(&sentence_text)),
            text: sentence_text,
            keywords: keywords.into_iter().collect(),
            weight,
        });
    }

    let tokens = tokenize(text);
    let weight = coverage(
        tokens.iter().filter(|t| lookup.contains(t)).count(),
        tokens.len(),
    );

    ParagraphSegment {
        id,
        text: text.to_string(),
        keywords: paragraph_keywords.into_iter().collect(),
        weight,
        sentences,
        summary: None,
    }
}

/// Fraction of tokens that survived the frequency filter.
fn coverage(kept: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        kept as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookdex_shared::{FrequencyEntry, FrequencyTable};
    use std::collections::BTreeSet as Set;

    fn table(words: &[(&str, u64, f64)]) -> FrequencyTable {
        FrequencyTable {
            entries: words
                .iter()
                .map(|(w, d, c)| FrequencyEntry {
                    word: w.to_string(),
                    document_frequency: *d,
                    corpus_frequency: *c,
                    segments: Set::new(),
                })
                .collect(),
        }
    }

    const SAMPLE: &str = "Shift operators move bits.\n\
                          \n\
                          The next example shifts left:\n\
                          \n\
                          \tint x = 1 << 3;\n\
                          \tSystem.out.println(x);\n\
                          \n\
                          Bits fall off the end.\n";

    #[test]
    fn split_finds_code_between_paragraphs() {
        let blocks = split_blocks(SAMPLE);
        let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Paragraph,
                BlockKind::Paragraph,
                BlockKind::Code,
                BlockKind::Paragraph
            ]
        );
        assert!(blocks[2].text.contains("1 << 3"));
    }

    #[test]
    fn four_space_indent_counts_as_code() {
        let text = "Intro text.\n\n    indented line one\n    indented line two\n\nOutro.";
        let blocks = split_blocks(text);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].kind, BlockKind::Code);
        assert!(blocks[1].text.contains("line two"));
    }

    #[test]
    fn three_space_indent_is_prose() {
        let text = "Intro.\n\n   not code, just ragged prose\n";
        let blocks = split_blocks(text);
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
    }

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("The Shift-Operator moves bits!"),
            vec!["the", "shift", "operator", "moves", "bits"]
        );
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let sentences = split_sentences("Bits move left. Do they vanish? Yes! See figure 3.14 for more.");
        assert_eq!(
            sentences,
            vec![
                "Bits move left.",
                "Do they vanish?",
                "Yes!",
                "See figure 3.14 for more."
            ]
        );
    }

    #[test]
    fn annotate_links_code_to_preceding_paragraph() {
        let t = table(&[("shift", 3, 0.001), ("bits", 2, 0.002)]);
        let lookup = t.lookup();
        let blocks = split_blocks(SAMPLE);
        let segments = annotate(&blocks, &lookup, &MarkerLanguageGuesser::default(), Some("java"));

        let paragraph_id = segments[1].id().to_string();
        match &segments[2] {
            Segment::SourceCode(code) => {
                assert_eq!(code.linked_paragraph_id.as_deref(), Some(paragraph_id.as_str()));
            }
            other => panic!("expected code segment, got {other:?}"),
        }
    }

    #[test]
    fn annotate_assigns_sorted_surviving_keywords() {
        let t = table(&[("shift", 3, 0.001), ("bits", 2, 0.002)]);
        let lookup = t.lookup();
        let blocks = split_blocks(SAMPLE);
        let segments = annotate(&blocks, &lookup, &MarkerLanguageGuesser::default(), None);

        match &segments[0] {
            Segment::Paragraph(p) => {
                assert_eq!(p.keywords, vec!["bits".to_string(), "shift".to_string()]);
                assert!(!p.sentences.is_empty());
                assert!(p.sentences[0].id.starts_with(&p.id));
                assert!(p.weight > 0.0 && p.weight < 1.0);
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn all_noise_paragraph_has_no_keywords() {
        let t = table(&[("shift", 3, 0.001)]);
        let lookup = t.lookup();
        let blocks = split_blocks("And so it was that they went on.\n");
        let segments = annotate(&blocks, &lookup, &MarkerLanguageGuesser::default(), None);

        assert_eq!(segments.len(), 1);
        assert!(segments[0].keywords().is_empty());
    }

    #[test]
    fn unclassifiable_code_falls_back_to_document_language() {
        let t = table(&[]);
        let lookup = t.lookup();
        let blocks = vec![RawBlock {
            kind: BlockKind::Code,
            text: "x = 1".to_string(),
        }];
        let segments = annotate(&blocks, &lookup, &MarkerLanguageGuesser::default(), Some("java"));

        match &segments[0] {
            Segment::SourceCode(code) => assert_eq!(code.language, "java"),
            other => panic!("expected code segment, got {other:?}"),
        }

        let segments = annotate(&blocks, &lookup, &MarkerLanguageGuesser::default(), None);
        match &segments[0] {
            Segment::SourceCode(code) => assert_eq!(code.language, "unknown"),
            other => panic!("expected code segment, got {other:?}"),
        }
    }

    #[test]
    fn inline_code_spans_become_linked_segments() {
        let t = table(&[("shift", 3, 0.001)]);
        let lookup = t.lookup();
        let blocks = split_blocks("Use the `<<` operator to shift.\n");
        let segments = annotate(&blocks, &lookup, &MarkerLanguageGuesser::default(), None);

        assert_eq!(segments.len(), 2);
        let paragraph_id = segments[0].id().to_string();
        match &segments[1] {
            Segment::SourceCode(code) => {
                assert_eq!(code.text, "<<");
                assert_eq!(code.linked_paragraph_id.as_deref(), Some(paragraph_id.as_str()));
            }
            other => panic!("expected code segment, got {other:?}"),
        }
    }

    #[test]
    fn segment_ids_are_stable_across_runs() {
        let blocks_a = split_blocks(SAMPLE);
        let blocks_b = split_blocks(SAMPLE);
        let ids_a: Vec<String> = blocks_a.iter().map(RawBlock::id).collect();
        let ids_b: Vec<String> = blocks_b.iter().map(RawBlock::id).collect();
        assert_eq!(ids_a, ids_b);
    }
}
