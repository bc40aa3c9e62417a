//! Word-frequency analysis: separates document-specific vocabulary from
//! generic language noise.
//!
//! For every word in the document's paragraph blocks we record how often it
//! occurs here (document frequency) and how often it occurs in general
//! language (corpus frequency, via the [`CorpusFrequency`] collaborator).
//! A word unusually common on *both* axes — at or above the 90th percentile
//! of each — is connective tissue ("the", "and") and is excluded. What
//! survives, ordered by (document frequency desc, corpus frequency asc), is
//! the document's keyword vocabulary; that ordering is reproduced verbatim
//! by keyword ranking and unit-id hashing downstream.

mod corpus;

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, instrument};

use bookdex_segment::{BlockKind, RawBlock, tokenize};
use bookdex_shared::{FrequencyEntry, FrequencyTable};

pub use corpus::{CorpusFrequency, NullCorpus, WordlistCorpus};

/// Percentile rank above which a word counts as "unusually common".
const NOISE_PERCENTILE: f64 = 0.9;

/// Build the frequency table for a document's raw blocks.
///
/// Only paragraph blocks are counted; code blocks contribute nothing to the
/// vocabulary. Every surviving entry records the ids of the paragraph
/// segments it occurs in.
#[instrument(skip_all, fields(blocks = blocks.len()))]
pub fn analyze(blocks: &[RawBlock], corpus: &dyn CorpusFrequency) -> FrequencyTable {
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut origins: HashMap<String, BTreeSet<String>> = HashMap::new();

    for block in blocks {
        if block.kind != BlockKind::Paragraph {
            continue;
        }
        let segment_id = block.id();
        for word in tokenize(&block.text) {
            *counts.entry(word.clone()).or_insert(0) += 1;
            origins.entry(word).or_default().insert(segment_id.clone());
        }
    }

    let mut entries: Vec<FrequencyEntry> = counts
        .into_iter()
        .map(|(word, document_frequency)| {
            let corpus_frequency = corpus.lookup(&word);
            let segments = origins.remove(&word).unwrap_or_default();
            FrequencyEntry {
                word,
                document_frequency,
                corpus_frequency,
                segments,
            }
        })
        .collect();

    // Thresholds are computed over the FULL word set, before any exclusion.
    let doc_threshold = percentile(
        entries.iter().map(|e| e.document_frequency as f64).collect(),
        NOISE_PERCENTILE,
    );
    let corpus_threshold = percentile(
        entries.iter().map(|e| e.corpus_frequency).collect(),
        NOISE_PERCENTILE,
    );

    let before = entries.len();
    entries.retain(|e| {
        !(e.corpus_frequency >= corpus_threshold
            && e.document_frequency as f64 >= doc_threshold)
    });

    debug!(
        words = before,
        excluded = before - entries.len(),
        doc_threshold,
        corpus_threshold,
        "noise filter applied"
    );

    sort_entries(&mut entries);
    FrequencyTable { entries }
}

/// Canonical table ordering: document frequency descending, corpus
/// frequency ascending, word ascending as the byte-stability tie-break.
fn sort_entries(entries: &mut [FrequencyEntry]) {
    entries.sort_by(|a, b| {
        b.document_frequency
            .cmp(&a.document_frequency)
            .then_with(|| {
                a.corpus_frequency
                    .partial_cmp(&b.corpus_frequency)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.word.cmp(&b.word))
    });
}

/// Rank-based quantile with linear interpolation between closest ranks.
fn percentile(mut values: Vec<f64>, q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let position = q * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return values[lower];
    }

    let fraction = position - lower as f64;
    values[lower] + fraction * (values[upper] - values[lower])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookdex_segment::split_blocks;

    /// Corpus where connector words are very common and everything else is
    /// rare, with longer words rarer still (so percentiles stay meaningful).
    struct EnglishLike;

    impl CorpusFrequency for EnglishLike {
        fn lookup(&self, word: &str) -> f64 {
            match word {
                "the" => 0.053,
                "and" => 0.031,
                "of" => 0.029,
                "a" => 0.025,
                "to" => 0.022,
                _ => 0.001 / word.len().max(1) as f64,
            }
        }
    }

    fn entry<'a>(table: &'a FrequencyTable, word: &str) -> Option<&'a FrequencyEntry> {
        table.entries.iter().find(|e| e.word == word)
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let p = percentile(values, 0.9);
        assert!((p - 9.1).abs() < 1e-9);

        assert_eq!(percentile(vec![7.0], 0.9), 7.0);
        assert_eq!(percentile(vec![], 0.9), 0.0);
    }

    #[test]
    fn connector_words_above_both_thresholds_are_excluded() {
        // "the" dominates the document AND general language; "mitochondria"
        // dominates only the document.
        let mut text = String::new();
        for i in 0..30 {
            text.push_str(&format!(
                "The mitochondria of the cell uses the membrane and the matrix variant{i}.\n\n"
            ));
        }

        let table = analyze(&split_blocks(&text), &EnglishLike);

        assert!(entry(&table, "the").is_none());
        let kept = entry(&table, "mitochondria").expect("document-specific word survives");
        assert_eq!(kept.document_frequency, 30);
    }

    #[test]
    fn exclusion_requires_both_axes() {
        // "of" is corpus-common but appears once here: the document axis
        // keeps it in the vocabulary.
        let mut text = String::from("Summary of mitochondria membranes.\n\n");
        for i in 0..20 {
            text.push_str(&format!("The mitochondria the membrane the matrix{i}.\n\n"));
        }

        let table = analyze(&split_blocks(&text), &EnglishLike);
        assert!(entry(&table, "of").is_some());
        assert!(entry(&table, "the").is_none());
    }

    #[test]
    fn ordering_is_doc_desc_then_corpus_asc_then_word() {
        let text = "alpha alpha alpha beta beta the gamma delta.\n\n";
        let table = analyze(&split_blocks(text), &EnglishLike);

        let words: Vec<&str> = table.entries.iter().map(|e| e.word.as_str()).collect();
        // alpha: doc 3; beta: doc 2; remaining doc 1 sorted by corpus asc
        // then word asc — "the" is corpus-heaviest but survives because its
        // document frequency sits below the 90th percentile here.
        assert_eq!(words[0], "alpha");
        assert_eq!(words[1], "beta");
        let singles = &words[2..];
        assert_eq!(singles, &["delta", "gamma", "the"]);
    }

    #[test]
    fn code_blocks_are_not_counted() {
        let text = "Prose about shifting.\n\n\tshift shift shift shift\n\nMore prose.\n";
        let table = analyze(&split_blocks(text), &EnglishLike);
        assert!(entry(&table, "shift").is_none_or(|e| e.document_frequency == 1));
        // "shifting" tokenizes from prose; the code-only repeats never count.
        assert!(entry(&table, "shifting").is_some());
    }

    #[test]
    fn originating_segments_are_tracked() {
        let text = "Mitochondria produce energy.\n\nEnergy moves the cell.\n\n";
        let blocks = split_blocks(text);
        let table = analyze(&blocks, &EnglishLike);

        let energy = entry(&table, "energy").expect("present");
        assert_eq!(energy.document_frequency, 2);
        assert_eq!(energy.segments.len(), 2);
        assert!(energy.segments.contains(&blocks[0].id()));
        assert!(energy.segments.contains(&blocks[1].id()));
    }
}
