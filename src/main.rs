use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{ConfigCommand, TaxonomyCommand, TermCommand};
use config::Config;
use termstore_core::{SingleFileStorage, TermTaxonomyStorage};

#[derive(Parser)]
#[command(name = "termstore")]
#[command(version)]
#[command(about = "Inspect and edit versioned term/taxonomy files", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage taxonomy records nested under terms
    Taxonomy(TaxonomyCommand),

    /// Manage terms
    Term(TermCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    // Logs go to stderr, command output to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "termstore=warn,termstore_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;
    tracing::debug!(store = %config.store_path.value.display(), "loaded configuration");

    match cli.command {
        Some(Commands::Taxonomy(cmd)) => {
            cmd.run(&open_repo(&config))?;
        }
        Some(Commands::Term(cmd)) => {
            cmd.run(&open_repo(&config))?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

fn open_repo(config: &Config) -> TermTaxonomyStorage {
    TermTaxonomyStorage::new(SingleFileStorage::new(
        config.store_path.value.clone(),
        config.id_column.value.clone(),
    ))
}
