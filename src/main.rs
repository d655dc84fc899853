use std::path::PathBuf;

use anyhow::Context;
use axum::extract::FromRef;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod error;
mod models;
mod paste;
mod store;
pub(crate) mod types;

pub(crate) use error::{ApiError, ApiResult};

use config::Config;
use paste::PasteStore;
use store::AnyKv;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve,
}

#[derive(Clone, FromRef)]
pub struct App {
    pub config: Config,
    pub pastes: PasteStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("failed to load config")?;

    match cli.command {
        Command::Serve => {
            let kv = AnyKv::connect(&config)
                .await
                .context("failed to connect to backing store")?;
            let pastes = PasteStore::new(kv, &config);
            commands::serve::run(App { config, pastes }).await
        }
    }
}
