//! Keyed stage-output store.
//!
//! The [`StageStore`] persists one JSON record per (document, stage) pair
//! under `<root>/<doc_id>/<stage>.json`, plus a `manifest.json` per document.
//! It doubles as the pipeline cache: a stage whose record already exists is
//! not recomputed.
//!
//! **Access rules:**
//! - Writes are atomic (write to `<file>.tmp`, then rename), so a crash or
//!   failed stage never leaves a readable partial record.
//! - An unreadable or unparsable record is reported as a miss, never an
//!   error; the stage simply re-executes.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use bookdex_shared::{BookdexError, DocId, IndexManifest, Result};

/// File name of the per-document manifest.
const MANIFEST_FILE: &str = "manifest.json";

/// Stage-output store rooted at a single output directory.
#[derive(Debug, Clone)]
pub struct StageStore {
    root: PathBuf,
}

impl StageStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| BookdexError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all records for one document.
    pub fn doc_dir(&self, doc: &DocId) -> PathBuf {
        self.root.join(doc.as_str())
    }

    fn stage_path(&self, doc: &DocId, stage: &str) -> PathBuf {
        self.doc_dir(doc).join(format!("{stage}.json"))
    }

    // -----------------------------------------------------------------------
    // Stage records
    // -----------------------------------------------------------------------

    /// Load a stage record, or `None` on miss.
    ///
    /// A record that exists but cannot be parsed counts as a miss: the cache
    /// entry is stale garbage and the stage must re-execute.
    pub fn load(&self, doc: &DocId, stage: &str) -> Result<Option<Value>> {
        let path = self.stage_path(doc, stage);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BookdexError::io(&path, e)),
        };

        match serde_json::from_str(&content) {
            Ok(value) => {
                debug!(doc = %doc, stage, "stage record loaded");
                Ok(Some(value))
            }
            Err(e) => {
                warn!(doc = %doc, stage, error = %e, "corrupt stage record, treating as miss");
                Ok(None)
            }
        }
    }

    /// Persist a stage record atomically.
    pub fn save(&self, doc: &DocId, stage: &str, value: &Value) -> Result<()> {
        let path = self.stage_path(doc, stage);
        write_json_atomic(&path, value)?;
        debug!(doc = %doc, stage, "stage record saved");
        Ok(())
    }

    /// Whether a record exists for `(doc, stage)`. Does not validate content.
    pub fn contains(&self, doc: &DocId, stage: &str) -> bool {
        self.stage_path(doc, stage).exists()
    }

    /// Drop a stage record so the next pipeline run recomputes it.
    pub fn invalidate(&self, doc: &DocId, stage: &str) -> Result<()> {
        let path = self.stage_path(doc, stage);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BookdexError::io(&path, e)),
        }
    }

    // -----------------------------------------------------------------------
    // Manifests
    // -----------------------------------------------------------------------

    /// Load a document's manifest, if one has been written.
    pub fn load_manifest(&self, doc: &DocId) -> Result<Option<IndexManifest>> {
        let path = self.doc_dir(doc).join(MANIFEST_FILE);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BookdexError::io(&path, e)),
        };

        let manifest = serde_json::from_str(&content).map_err(|e| {
            BookdexError::validation(format!("invalid {}: {e}", path.display()))
        })?;
        Ok(Some(manifest))
    }

    /// Write a document's manifest atomically.
    pub fn save_manifest(&self, manifest: &IndexManifest) -> Result<()> {
        let path = self.doc_dir(&manifest.doc_id).join(MANIFEST_FILE);
        let value = serde_json::to_value(manifest)
            .map_err(|e| BookdexError::Store(format!("manifest serialization: {e}")))?;
        write_json_atomic(&path, &value)
    }

    /// Scan the store root for document manifests (for listings).
    ///
    /// Directories without a readable manifest are skipped with a warning.
    pub fn discover_manifests(&self) -> Result<Vec<IndexManifest>> {
        let mut manifests = Vec::new();

        let entries = std::fs::read_dir(&self.root).map_err(|e| BookdexError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BookdexError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }

            let manifest_path = entry.path().join(MANIFEST_FILE);
            if !manifest_path.exists() {
                continue;
            }

            let content = std::fs::read_to_string(&manifest_path)
                .map_err(|e| BookdexError::io(&manifest_path, e))?;
            match serde_json::from_str::<IndexManifest>(&content) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => {
                    warn!(path = %manifest_path.display(), error = %e, "skipping unreadable manifest");
                }
            }
        }

        manifests.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(manifests)
    }
}

/// Write a JSON value to `path` via a temp file and rename.
fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BookdexError::io(parent, e))?;
    }

    let content = serde_json::to_string_pretty(value)
        .map_err(|e| BookdexError::Store(format!("record serialization: {e}")))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(|e| BookdexError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| BookdexError::io(path, e))?;
    Ok(())
}
