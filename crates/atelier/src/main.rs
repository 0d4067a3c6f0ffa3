//! Atelier CLI binary.
//!
//! - Run a generation against a configured provider
//! - Render an artifact body offline
//! - List providers and credential status

use atelier::{AtelierConfig, init_logging};
use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, list_providers, render_file, run_generation};

    // Credentials usually live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;

    let config = match &cli.config {
        Some(path) => AtelierConfig::from_file(path)?,
        None => AtelierConfig::load()?,
    };

    match cli.command {
        Commands::Run(args) => run_generation(args, &config).await?,
        Commands::Render(args) => render_file(args, &config).await?,
        Commands::Providers => list_providers(&config),
    }

    Ok(())
}
