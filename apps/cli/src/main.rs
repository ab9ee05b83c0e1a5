//! reviewtopics CLI: store review extraction and topic modelling.
//!
//! Stage 1 (`extract`) discovers games and scrapes their reviews to CSV;
//! stage 2 (`model`) cleans the text and labels each review with a topic.

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
