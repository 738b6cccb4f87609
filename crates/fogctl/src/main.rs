use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(
    name = "fogctl",
    about = "fogplane — control plane for fog nodes and their microservices",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to controller.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// State database file, overriding [store].path.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Id of the already-authenticated user acting.
    #[arg(long, global = true, default_value = "1")]
    user_id: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage microservices and their routes
    Microservice {
        #[command(subcommand)]
        action: commands::microservice::MicroserviceAction,
    },
    /// Inspect and register catalog items
    Catalog {
        #[command(subcommand)]
        action: commands::catalog::CatalogAction,
    },
    /// Register and remove fog nodes
    Fog {
        #[command(subcommand)]
        action: commands::fog::FogAction,
    },
    /// Run the REST API.
    Serve {
        /// Port to listen on, overriding [api].port.
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing(logging: &fogplane_core::config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = fogplane_core::ControllerConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }
    init_tracing(&config.logging);

    let ctx = Context::new(config, cli.user_id);
    match cli.command {
        Commands::Microservice { action } => commands::microservice::run(&ctx, action),
        Commands::Catalog { action } => commands::catalog::run(&ctx, action),
        Commands::Fog { action } => commands::fog::run(&ctx, action),
        Commands::Serve { port } => commands::serve::run(&ctx, port),
    }
}
