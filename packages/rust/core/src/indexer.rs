//! End-to-end `index` pipeline: source document → persisted semantic index.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};

use bookdex_engine::Engine;
use bookdex_freq::{CorpusFrequency, NullCorpus, WordlistCorpus};
use bookdex_segment::MarkerLanguageGuesser;
use bookdex_shared::{
    BookdexError, CURRENT_SCHEMA_VERSION, CorpusConfig, DocId, FrequencyTable, IndexManifest,
    Result, SummarizerConfig,
};
use bookdex_store::StageStore;
use bookdex_tree::SemanticTree;

use crate::extract;
use crate::stages::{
    Collaborators, NormalizeOptions, STAGE_FREQUENCIES, STAGE_NORMALIZED, STAGE_TREE,
    SegmentsRecord, build_graph,
};
use crate::summarize::{BridgeSummarizer, Summarizer};

/// Configuration for the `index` pipeline.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Source document to index.
    pub source: PathBuf,
    /// Human-readable name (defaults to the source file stem).
    pub name: String,
    /// Root directory for index storage.
    pub output_root: PathBuf,
    /// Summarization bridge settings.
    pub summarizer: SummarizerConfig,
    /// Corpus-frequency lookup settings.
    pub corpus: CorpusConfig,
    /// Tool version string.
    pub tool_version: String,
}

/// Result of the `index` pipeline.
#[derive(Debug)]
pub struct IndexResult {
    /// Stable document identifier.
    pub doc_id: DocId,
    /// Path to the document's index directory.
    pub index_path: PathBuf,
    /// Number of segments in the document.
    pub segment_count: usize,
    /// Number of surviving words in the frequency table.
    pub keyword_count: usize,
    /// Number of units in the semantic tree.
    pub unit_count: usize,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &IndexResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &IndexResult) {}
}

/// Run the full `index` pipeline with collaborators resolved from config.
pub fn index_document(
    config: &IndexConfig,
    progress: &dyn ProgressReporter,
) -> Result<IndexResult> {
    let collaborators = resolve_collaborators(config)?;
    index_document_with(config, collaborators, progress)
}

/// Resolve the extraction, corpus, and summarization collaborators.
fn resolve_collaborators(config: &IndexConfig) -> Result<Collaborators> {
    let extractor = extract::extractor_for(&config.source)?;

    let corpus: Arc<dyn CorpusFrequency> = match &config.corpus.wordlist_path {
        Some(path) => Arc::new(WordlistCorpus::from_path(Path::new(path))?),
        None => Arc::new(NullCorpus),
    };

    let summarizer: Option<Arc<dyn Summarizer>> = if config.summarizer.enabled {
        Some(Arc::new(BridgeSummarizer::new(
            config.summarizer.bridge_cmd.clone(),
            config.summarizer.bridge_script.clone(),
        )))
    } else {
        None
    };

    Ok(Collaborators {
        extractor,
        corpus,
        summarizer,
    })
}

/// Run the full `index` pipeline with explicit collaborators.
///
/// 1. Extract raw text
/// 2. Analyze word frequencies
/// 3. Segment and annotate
/// 4. Normalize (summaries, optional)
/// 5. Build the semantic tree
///
/// Every step is cached per document; re-running over an unchanged source
/// loads the persisted records and recomputes nothing.
#[instrument(skip_all, fields(source = %config.source.display(), name = %config.name))]
pub fn index_document_with(
    config: &IndexConfig,
    collaborators: Collaborators,
    progress: &dyn ProgressReporter,
) -> Result<IndexResult> {
    let start = Instant::now();
    let doc_id = DocId::from_name(&config.name);

    info!(%doc_id, source = %config.source.display(), "starting index pipeline");

    let store = StageStore::open(&config.output_root)?;
    let engine = Engine::new(store);

    let graph = build_graph(
        config.source.clone(),
        collaborators,
        Arc::new(MarkerLanguageGuesser::default()),
        NormalizeOptions {
            min_words: config.summarizer.min_words,
            max_words: config.summarizer.max_words,
            retries: config.summarizer.retries,
        },
    );

    progress.phase("Extracting raw text");
    engine.execute(&doc_id, graph.raw.as_ref())?;

    progress.phase("Analyzing word frequencies");
    let table_value = engine.execute(&doc_id, graph.frequencies.as_ref())?;

    progress.phase("Segmenting document");
    engine.execute(&doc_id, graph.segments.as_ref())?;

    progress.phase("Normalizing paragraphs");
    let normalized_value = engine.execute(&doc_id, graph.normalized.as_ref())?;

    progress.phase("Building semantic tree");
    let tree_value = engine.execute(&doc_id, graph.tree.as_ref())?;

    let table: FrequencyTable = decode_record(STAGE_FREQUENCIES, table_value)?;
    let normalized: SegmentsRecord = decode_record(STAGE_NORMALIZED, normalized_value)?;
    let tree: SemanticTree = decode_record(STAGE_TREE, tree_value)?;

    // Refresh the manifest, preserving the original creation time.
    let now = Utc::now();
    let created_at = engine
        .store()
        .load_manifest(&doc_id)?
        .map(|m| m.created_at)
        .unwrap_or(now);

    let manifest = IndexManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        doc_id: doc_id.clone(),
        name: config.name.clone(),
        source_path: config.source.display().to_string(),
        tool_version: config.tool_version.clone(),
        created_at,
        updated_at: now,
        segment_count: normalized.segments.len(),
        keyword_count: table.len(),
        unit_count: tree.unit_count(),
    };
    engine.store().save_manifest(&manifest)?;

    let result = IndexResult {
        index_path: engine.store().doc_dir(&doc_id),
        doc_id,
        segment_count: manifest.segment_count,
        keyword_count: manifest.keyword_count,
        unit_count: manifest.unit_count,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        doc_id = %result.doc_id,
        segments = result.segment_count,
        keywords = result.keyword_count,
        units = result.unit_count,
        elapsed_ms = result.elapsed.as_millis(),
        "index pipeline complete"
    );

    Ok(result)
}

/// Decode a stage record into its typed form, as a hard error.
fn decode_record<T: serde::de::DeserializeOwned>(
    stage: &str,
    value: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| BookdexError::validation(format!("'{stage}' record malformed: {e}")))
}
