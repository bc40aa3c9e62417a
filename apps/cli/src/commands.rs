//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use bookdex_core::{
    IndexConfig, IndexResult, ProgressReporter, QueryOutcome, index_document, query_document,
};
use bookdex_shared::{DocId, init_config, load_config, resolve_output_dir};
use bookdex_store::StageStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bookdex — turn long documents into keyword-addressable knowledge.
#[derive(Parser)]
#[command(
    name = "bookdex",
    version,
    about = "Index long documents into keyword-addressable knowledge units.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Index a source document into a semantic knowledge index.
    Index {
        /// Source document (.txt, .md, or .pdf).
        source: PathBuf,

        /// Human-readable name (defaults to the source file stem).
        #[arg(short, long)]
        name: Option<String>,

        /// Output directory for the index (defaults to config).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Run the summarization stage even if disabled in config.
        #[arg(long)]
        summarize: bool,
    },

    /// Query an indexed document by keyword set.
    Query {
        /// Document name or id.
        doc: String,

        /// Query keywords, any order.
        #[arg(required = true)]
        keywords: Vec<String>,

        /// Index directory (defaults to config).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List all indexed documents.
    List {
        /// Index directory (defaults to config).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bookdex=info",
        1 => "bookdex=debug",
        _ => "bookdex=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Index {
            source,
            name,
            out,
            summarize,
        } => cmd_index(source, name, out, summarize),
        Command::Query { doc, keywords, out } => cmd_query(&doc, &keywords, out),
        Command::List { out } => cmd_list(out),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Resolve the index root: CLI flag, else config.
fn output_root(out: Option<PathBuf>) -> Result<PathBuf> {
    match out {
        Some(path) => Ok(path),
        None => {
            let config = load_config()?;
            Ok(resolve_output_dir(&config)?)
        }
    }
}

fn cmd_index(
    source: PathBuf,
    name: Option<String>,
    out: Option<PathBuf>,
    summarize: bool,
) -> Result<()> {
    let config = load_config()?;

    if !source.exists() {
        return Err(eyre!("source document '{}' not found", source.display()));
    }

    // Derive name from the file stem if not provided.
    let doc_name = name.unwrap_or_else(|| {
        source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    });

    let mut summarizer = config.summarizer.clone();
    if summarize {
        summarizer.enabled = true;
    }

    let index_config = IndexConfig {
        source: source.clone(),
        name: doc_name.clone(),
        output_root: output_root(out)?,
        summarizer,
        corpus: config.corpus.clone(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    info!(source = %source.display(), name = %doc_name, "indexing document");

    let reporter = CliProgress::new();
    let result = index_document(&index_config, &reporter)?;

    println!();
    println!("  Document indexed successfully!");
    println!("  Id:       {}", result.doc_id);
    println!("  Name:     {doc_name}");
    println!("  Segments: {}", result.segment_count);
    println!("  Keywords: {}", result.keyword_count);
    println!("  Units:    {}", result.unit_count);
    println!("  Path:     {}", result.index_path.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_query(doc: &str, keywords: &[String], out: Option<PathBuf>) -> Result<()> {
    let root = output_root(out)?;
    let doc_id = DocId::from_name(doc);

    let outcome = query_document(&root, &doc_id, keywords)?;

    match outcome {
        QueryOutcome::Match { unit } => {
            println!();
            println!("  Unit:     {}", unit.id);
            println!("  Keywords: {}", unit.keywords.join(", "));
            if let Some(summary) = &unit.summary {
                println!("  Summary:  {summary}");
            }
            println!();
            println!("{}", unit.text);
        }
        QueryOutcome::NotFound { unit_id } => {
            println!("No unit indexed for that keyword set (address {unit_id}).");
        }
    }

    Ok(())
}

fn cmd_list(out: Option<PathBuf>) -> Result<()> {
    let root = output_root(out)?;
    let store = StageStore::open(&root)?;
    let manifests = store.discover_manifests()?;

    if manifests.is_empty() {
        println!("No indexed documents under {}.", root.display());
        return Ok(());
    }

    println!();
    for manifest in manifests {
        println!(
            "  {}  segments={} keywords={} units={}  ({})",
            manifest.doc_id,
            manifest.segment_count,
            manifest.keyword_count,
            manifest.unit_count,
            manifest.updated_at.format("%Y-%m-%d %H:%M"),
        );
    }
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config written to {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &IndexResult) {
        self.spinner.finish_and_clear();
    }
}
