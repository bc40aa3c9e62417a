//! bookdex CLI — turn long documents into keyword-addressable knowledge.
//!
//! Indexes a source document into content-addressed knowledge units and
//! answers keyword queries against the resulting semantic tree.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
