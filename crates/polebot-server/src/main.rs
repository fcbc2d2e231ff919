use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polebot_server::{config::ServerConfig, db};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "polebot-server", about = "Polebot goal and mission planning service")]
struct Cli {
    /// TOML settings file; defaults to <config dir>/polebot/server.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Create the database file and schema, then exit.
    InitDb {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Print the effective settings as TOML.
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref()).context("loading server config")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    match cli.command {
        Command::Serve { host, port, db_path } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(db_path) = db_path {
                config.db_path = db_path;
            }
            polebot_server::serve(&config).await?;
        }
        Command::InitDb { db_path } => {
            let db_path = db_path.unwrap_or(config.db_path);
            db::open(&db_path)
                .with_context(|| format!("initializing {}", db_path.display()))?;
            info!(db_path = %db_path.display(), "database schema ready");
        }
        Command::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
