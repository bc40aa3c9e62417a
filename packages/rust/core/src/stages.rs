//! Pipeline stages: the document flow wired into the engine.
//!
//! ```text
//! raw ──▶ frequencies ──▶ segments ──▶ normalized ──▶ tree
//!  │                       ▲                           ▲
//!  └───────────────────────┘        frequencies ───────┘
//! ```
//!
//! Each stage owns its collaborators and produces one persisted record. The
//! frequency stage counts words over the same block split the segment stage
//! uses, so originating segment ids agree across records.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use bookdex_engine::{DepOutputs, Stage, encode};
use bookdex_freq::CorpusFrequency;
use bookdex_segment::LanguageGuesser;
use bookdex_shared::{DocId, FrequencyTable, Result, Segment};
use bookdex_tree::SemanticTree;

use crate::extract::TextExtractor;
use crate::summarize::{Summarizer, summarize_with_retry};

/// Stage names; double as cache keys in the stage store.
pub const STAGE_RAW: &str = "raw";
pub const STAGE_FREQUENCIES: &str = "frequencies";
pub const STAGE_SEGMENTS: &str = "segments";
pub const STAGE_NORMALIZED: &str = "normalized";
pub const STAGE_TREE: &str = "tree";

// ---------------------------------------------------------------------------
// Stage records
// ---------------------------------------------------------------------------

/// Output of the extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTextRecord {
    pub text: String,
}

/// Output of the segmentation and normalization stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsRecord {
    pub segments: Vec<Segment>,
    /// Document-level language fallback used for unclassifiable code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_language: Option<String>,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// `raw`: source document → page-ordered text.
pub struct ExtractStage {
    source: PathBuf,
    extractor: Box<dyn TextExtractor>,
}

impl ExtractStage {
    pub fn new(source: PathBuf, extractor: Box<dyn TextExtractor>) -> Self {
        Self { source, extractor }
    }
}

impl Stage for ExtractStage {
    fn name(&self) -> &'static str {
        STAGE_RAW
    }

    fn run(&self, _doc: &DocId, _deps: &DepOutputs) -> Result<Value> {
        let text = self.extractor.extract(&self.source)?;
        encode(&RawTextRecord { text })
    }
}

/// `frequencies`: paragraph blocks → noise-filtered frequency table.
pub struct FrequencyStage {
    raw: Arc<ExtractStage>,
    corpus: Arc<dyn CorpusFrequency>,
}

impl FrequencyStage {
    pub fn new(raw: Arc<ExtractStage>, corpus: Arc<dyn CorpusFrequency>) -> Self {
        Self { raw, corpus }
    }
}

impl Stage for FrequencyStage {
    fn name(&self) -> &'static str {
        STAGE_FREQUENCIES
    }

    fn dependencies(&self) -> Vec<&dyn Stage> {
        vec![self.raw.as_ref()]
    }

    fn run(&self, _doc: &DocId, deps: &DepOutputs) -> Result<Value> {
        let raw: RawTextRecord = deps.decode(STAGE_RAW)?;
        let blocks = bookdex_segment::split_blocks(&raw.text);
        let table = bookdex_freq::analyze(&blocks, self.corpus.as_ref());
        debug!(words = table.len(), "frequency table built");
        encode(&table)
    }
}

/// `segments`: blocks + frequency table → annotated segments.
pub struct SegmentStage {
    raw: Arc<ExtractStage>,
    frequencies: Arc<FrequencyStage>,
    guesser: Arc<dyn LanguageGuesser>,
}

impl SegmentStage {
    pub fn new(
        raw: Arc<ExtractStage>,
        frequencies: Arc<FrequencyStage>,
        guesser: Arc<dyn LanguageGuesser>,
    ) -> Self {
        Self {
            raw,
            frequencies,
            guesser,
        }
    }
}

impl Stage for SegmentStage {
    fn name(&self) -> &'static str {
        STAGE_SEGMENTS
    }

    fn dependencies(&self) -> Vec<&dyn Stage> {
        vec![self.raw.as_ref(), self.frequencies.as_ref()]
    }

    fn run(&self, _doc: &DocId, deps: &DepOutputs) -> Result<Value> {
        let raw: RawTextRecord = deps.decode(STAGE_RAW)?;
        let table: FrequencyTable = deps.decode(STAGE_FREQUENCIES)?;

        let blocks = bookdex_segment::split_blocks(&raw.text);
        let fallback_language = bookdex_segment::document_fallback_language(&raw.text);
        let lookup = table.lookup();
        let segments = bookdex_segment::annotate(
            &blocks,
            &lookup,
            self.guesser.as_ref(),
            fallback_language.as_deref(),
        );

        encode(&SegmentsRecord {
            segments,
            fallback_language,
        })
    }
}

/// `normalized`: segments enriched with paragraph summaries.
///
/// Optional by design: without a summarizer the record passes through with
/// summaries left empty, and a failing summarizer degrades to the
/// paragraph's own text after bounded retries.
pub struct NormalizeStage {
    segments: Arc<SegmentStage>,
    summarizer: Option<Arc<dyn Summarizer>>,
    min_words: usize,
    max_words: usize,
    retries: u32,
}

impl NormalizeStage {
    pub fn new(
        segments: Arc<SegmentStage>,
        summarizer: Option<Arc<dyn Summarizer>>,
        min_words: usize,
        max_words: usize,
        retries: u32,
    ) -> Self {
        Self {
            segments,
            summarizer,
            min_words,
            max_words,
            retries,
        }
    }
}

impl Stage for NormalizeStage {
    fn name(&self) -> &'static str {
        STAGE_NORMALIZED
    }

    fn dependencies(&self) -> Vec<&dyn Stage> {
        vec![self.segments.as_ref()]
    }

    fn run(&self, _doc: &DocId, deps: &DepOutputs) -> Result<Value> {
        let mut record: SegmentsRecord = deps.decode(STAGE_SEGMENTS)?;

        if let Some(summarizer) = &self.summarizer {
            let mut summarized = 0usize;
            let mut fallbacks = 0usize;

            for segment in &mut record.segments {
                let Segment::Paragraph(paragraph) = segment else {
                    continue;
                };

                let summary = summarize_with_retry(
                    summarizer.as_ref(),
                    &paragraph.text,
                    self.min_words,
                    self.max_words,
                    self.retries,
                );
                match summary {
                    Some(summary) => {
                        paragraph.summary = Some(summary);
                        summarized += 1;
                    }
                    None => {
                        // Degrade, don't fail: the unit still gets content.
                        paragraph.summary = Some(paragraph.text.clone());
                        fallbacks += 1;
                    }
                }
            }

            debug!(summarized, fallbacks, "normalization complete");
        }

        encode(&record)
    }
}

/// `tree`: normalized segments + frequency table → semantic tree.
pub struct TreeStage {
    normalized: Arc<NormalizeStage>,
    frequencies: Arc<FrequencyStage>,
}

impl TreeStage {
    pub fn new(normalized: Arc<NormalizeStage>, frequencies: Arc<FrequencyStage>) -> Self {
        Self {
            normalized,
            frequencies,
        }
    }
}

impl Stage for TreeStage {
    fn name(&self) -> &'static str {
        STAGE_TREE
    }

    fn dependencies(&self) -> Vec<&dyn Stage> {
        vec![self.normalized.as_ref(), self.frequencies.as_ref()]
    }

    fn run(&self, _doc: &DocId, deps: &DepOutputs) -> Result<Value> {
        let record: SegmentsRecord = deps.decode(STAGE_NORMALIZED)?;
        let table: FrequencyTable = deps.decode(STAGE_FREQUENCIES)?;

        let lookup = table.lookup();
        let tree: SemanticTree = bookdex_tree::build(&record.segments, &lookup);
        encode(&tree)
    }
}

// ---------------------------------------------------------------------------
// Graph assembly
// ---------------------------------------------------------------------------

/// The assembled stage graph for one document.
pub struct StageGraph {
    pub raw: Arc<ExtractStage>,
    pub frequencies: Arc<FrequencyStage>,
    pub segments: Arc<SegmentStage>,
    pub normalized: Arc<NormalizeStage>,
    pub tree: Arc<TreeStage>,
}

/// Collaborator set for one pipeline run.
pub struct Collaborators {
    pub extractor: Box<dyn TextExtractor>,
    pub corpus: Arc<dyn CorpusFrequency>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

/// Summary-length and retry knobs for the normalization stage.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub min_words: usize,
    pub max_words: usize,
    pub retries: u32,
}

/// Wire the five stages into their dependency graph.
pub fn build_graph(
    source: PathBuf,
    collaborators: Collaborators,
    guesser: Arc<dyn LanguageGuesser>,
    options: NormalizeOptions,
) -> StageGraph {
    let raw = Arc::new(ExtractStage::new(source, collaborators.extractor));
    let frequencies = Arc::new(FrequencyStage::new(raw.clone(), collaborators.corpus));
    let segments = Arc::new(SegmentStage::new(raw.clone(), frequencies.clone(), guesser));
    let normalized = Arc::new(NormalizeStage::new(
        segments.clone(),
        collaborators.summarizer,
        options.min_words,
        options.max_words,
        options.retries,
    ));
    let tree = Arc::new(TreeStage::new(normalized.clone(), frequencies.clone()));

    StageGraph {
        raw,
        frequencies,
        segments,
        normalized,
        tree,
    }
}
