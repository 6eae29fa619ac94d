//! BudgetLens CLI: extract, structure and label budget line items.
//!
//! Reads spreadsheets, PDF tables and scanned images of budget estimates,
//! keeps the working item list in a local session store, and enriches it
//! with a remote text classifier.

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
