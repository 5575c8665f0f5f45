use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mosaic_models::auth::{Caller, Role};

mod commands;
mod config;

use commands::Context;
use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "mosaic", about = "Model registry and provider catalog")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file applied on top of the user and project layers
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Caller id used for ownership and access checks
    #[arg(long, global = true, default_value = "local")]
    user: String,

    #[arg(long, global = true, default_value = "admin")]
    role: Role,

    /// Group membership of the caller (repeatable)
    #[arg(long = "group", global = true)]
    groups: Vec<String>,
}

impl Cli {
    fn caller(&self) -> Caller {
        Caller {
            id: self.user.clone(),
            role: self.role,
            groups: self.groups.iter().cloned().collect(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage provider connections
    Connections(commands::connections::ConnectionsArgs),
    /// Show the merged model catalog across enabled connections
    Catalog(commands::catalog::CatalogArgs),
    /// Manage the local model registry
    Models(commands::models::ModelsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::load(cli.config.as_deref())?;
    let ctx = Context::open(&config, cli.caller()).await?;

    match cli.command {
        Commands::Connections(args) => commands::connections::run(args, ctx).await,
        Commands::Catalog(args) => commands::catalog::run(args, ctx).await,
        Commands::Models(args) => commands::models::run(args, ctx).await,
    }
}
