//! Query path: direct keyword-set addressing against a persisted index.
//!
//! Loads only the frequency table (for canonical ranking) and the semantic
//! tree; no pipeline stage executes.

use std::path::Path;

use tracing::instrument;

use bookdex_shared::{BookdexError, DocId, FrequencyTable, Result};
use bookdex_store::StageStore;
use bookdex_tree::{QueryOutcome, SemanticTree};

use crate::stages::{STAGE_FREQUENCIES, STAGE_TREE};

/// Evaluate a keyword query against a previously indexed document.
#[instrument(skip_all, fields(doc = %doc, keywords = keywords.len()))]
pub fn query_document(
    output_root: &Path,
    doc: &DocId,
    keywords: &[String],
) -> Result<QueryOutcome> {
    let store = StageStore::open(output_root)?;

    let table: FrequencyTable = load_record(&store, doc, STAGE_FREQUENCIES)?;
    let tree: SemanticTree = load_record(&store, doc, STAGE_TREE)?;

    Ok(bookdex_tree::evaluate(keywords, &table, &tree))
}

/// Load and decode one persisted stage record, erroring on absence.
fn load_record<T: serde::de::DeserializeOwned>(
    store: &StageStore,
    doc: &DocId,
    stage: &str,
) -> Result<T> {
    let value = store.load(doc, stage)?.ok_or_else(|| {
        BookdexError::validation(format!(
            "no '{stage}' record for document '{doc}' — index it first"
        ))
    })?;

    serde_json::from_value(value)
        .map_err(|e| BookdexError::validation(format!("'{stage}' record malformed: {e}")))
}
