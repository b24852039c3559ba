use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use memory_api::config::{self, MemoryApiConfig};
use memory_api::{db, server};

#[derive(Parser)]
#[command(name = "memory-api", version, about = "HTTP memory store for conversational records")]
struct Cli {
    /// Config file (default: ~/.memory-api/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Open the storage backend, report which engine was selected, and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = MemoryApiConfig::load_from(
        cli.config.unwrap_or_else(config::default_config_path),
    )?;

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if config.server.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(config).await?,
        Command::Check => {
            let store = db::open_store(&config.storage).await?;
            println!("backend:  {}", store.engine());
            println!("location: {}", store.location());
        }
    }

    Ok(())
}
