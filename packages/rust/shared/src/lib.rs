//! Shared types, error model, and configuration for bookdex.
//!
//! This crate is the foundation depended on by all other bookdex crates.
//! It provides:
//! - [`BookdexError`] — the unified error type
//! - Domain types ([`Segment`], [`FrequencyTable`], [`Unit`], [`IndexManifest`], [`DocId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CorpusConfig, DefaultsConfig, DocumentRegistryEntry, SummarizerConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_output_dir,
};
pub use error::{BookdexError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, CodeSegment, DocId, FrequencyEntry, FrequencyLookup, FrequencyTable,
    IndexManifest, ParagraphSegment, SHORT_HASH_LEN, Segment, Sentence, Unit, short_hash,
};
