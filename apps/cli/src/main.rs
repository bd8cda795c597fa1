//! Doc2MD CLI: convert web pages, PDF, Word, and HTML documents to Markdown.
//!
//! Runs the REST API, the MCP tool server, or one-shot conversions.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
