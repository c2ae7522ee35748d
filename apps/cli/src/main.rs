//! qexp CLI: builds the entity knowledge graph, samples article profiles,
//! and prepares the priming and category data used by query-expansion
//! experiments.

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
