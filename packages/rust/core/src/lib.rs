//! Core pipeline orchestration for bookdex.
//!
//! This crate ties extraction, frequency analysis, segmentation,
//! normalization, and tree building into end-to-end workflows
//! (`index_document`, `query_document`) and hosts the external
//! collaborator boundaries (text extraction, summarization).

pub mod extract;
pub mod indexer;
pub mod query;
pub mod stages;
pub mod summarize;

pub use indexer::{
    IndexConfig, IndexResult, ProgressReporter, SilentProgress, index_document,
    index_document_with,
};
pub use bookdex_tree::QueryOutcome;
pub use query::query_document;
