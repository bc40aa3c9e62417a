//! Application configuration for bookdex.
//!
//! User config lives at `~/.bookdex/bookdex.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BookdexError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bookdex.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bookdex";

// ---------------------------------------------------------------------------
// Config structs (matching bookdex.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Summarization bridge settings.
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Corpus-frequency lookup settings.
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Registered document indexes.
    #[serde(default)]
    pub documents: Vec<DocumentRegistryEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default index output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "~/bookdex-index".into()
}

/// `[summarizer]` section.
///
/// Summarization runs through an external bridge subprocess; when disabled,
/// the normalization stage is skipped and units carry no summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Whether the normalization stage runs at all.
    #[serde(default)]
    pub enabled: bool,

    /// Bridge command (e.g., "python3").
    #[serde(default = "default_bridge_cmd")]
    pub bridge_cmd: String,

    /// Bridge script path, passed as the command's first argument.
    #[serde(default)]
    pub bridge_script: String,

    /// Minimum summary length in words.
    #[serde(default = "default_summary_min_words")]
    pub min_words: usize,

    /// Maximum summary length in words.
    #[serde(default = "default_summary_max_words")]
    pub max_words: usize,

    /// Retries per paragraph before falling back to the original text.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bridge_cmd: default_bridge_cmd(),
            bridge_script: String::new(),
            min_words: default_summary_min_words(),
            max_words: default_summary_max_words(),
            retries: default_retries(),
        }
    }
}

fn default_bridge_cmd() -> String {
    "python3".into()
}
fn default_summary_min_words() -> usize {
    30
}
fn default_summary_max_words() -> usize {
    130
}
fn default_retries() -> u32 {
    1
}

/// `[corpus]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Path to a word-frequency list (one `word<TAB>frequency` per line).
    /// When unset, every word's corpus frequency is 0.0 and the noise filter
    /// degrades to document frequency alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordlist_path: Option<String>,
}

/// `[[documents]]` entry — a registered index in the config's registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRegistryEntry {
    /// Human-readable name.
    pub name: String,
    /// Path to the index directory on disk.
    pub path: String,
    /// Source document the index was built from.
    pub source_path: String,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bookdex/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BookdexError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bookdex/bookdex.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BookdexError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BookdexError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BookdexError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BookdexError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BookdexError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the configured output directory, expanding a leading `~/`.
pub fn resolve_output_dir(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.defaults.output_dir;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| BookdexError::config("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("min_words"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.summarizer.min_words, 30);
        assert_eq!(parsed.summarizer.max_words, 130);
        assert!(!parsed.summarizer.enabled);
        assert!(parsed.corpus.wordlist_path.is_none());
    }

    #[test]
    fn config_with_documents() {
        let toml_str = r#"
[defaults]
output_dir = "/tmp/indexes"

[[documents]]
name = "thinking-in-java"
path = "/tmp/indexes/thinking-in-java"
source_path = "/books/thinking-in-java.pdf"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.documents.len(), 1);
        assert_eq!(config.documents[0].name, "thinking-in-java");
        assert_eq!(config.defaults.output_dir, "/tmp/indexes");
    }

    #[test]
    fn summarizer_section_overrides() {
        let toml_str = r#"
[summarizer]
enabled = true
bridge_cmd = "python3"
bridge_script = "bridge/summarize.py"
max_words = 80
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.summarizer.enabled);
        assert_eq!(config.summarizer.bridge_script, "bridge/summarize.py");
        assert_eq!(config.summarizer.max_words, 80);
        // Unset fields keep their defaults.
        assert_eq!(config.summarizer.min_words, 30);
        assert_eq!(config.summarizer.retries, 1);
    }
}
