//! Telemetry Hub server
//!
//! Run with: cargo run --bin telemetry-hub -- serve
//!
//! Settings come from a TOML file (see `telemetry-hub config`) overridden by
//! `TELEMETRY_HUB_*` environment variables and then by command-line flags.
//! `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use telemetry_hub::api::{serve, AppState};
use telemetry_hub::clock::SystemClock;
use telemetry_hub::config::{generate_default_config, Config};
use telemetry_hub::logging::init_tracing;
use telemetry_hub::storage::StorageEngine;
use telemetry_hub::websocket::ConnectionHub;

#[derive(Parser)]
#[command(name = "telemetry-hub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Telemetry ingestion, history and live streaming server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the server (default)
    Serve(ServeArgs),

    /// Print or write the default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Config { output, force } => write_default_config(output, force),
        Command::Serve(args) => run_server(args),
    }
}

fn write_default_config(output: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let content = generate_default_config();

    match output {
        None => {
            print!("{}", content);
        }
        Some(path) => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(&path, content)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
        }
    }

    Ok(())
}

fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let (mut config, config_path) = Config::resolve(args.config.as_deref())?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.to_string_lossy().to_string();
    }
    config.validate()?;

    init_tracing(&config.logging).context("installing tracing subscriber")?;

    tracing::info!("Starting telemetry hub v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    let workers = config.server.effective_worker_threads();
    tracing::info!(workers, "Building request worker pool");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("telemetry-hub-worker")
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let engine_config = config.engine_config();
    tracing::info!("Data directory: {:?}", engine_config.data_dir);

    let storage = Arc::new(
        StorageEngine::new(engine_config)
            .await
            .context("opening storage")?,
    );
    match storage.stats().await {
        Ok(stats) => tracing::info!("Storage stats: {}", stats),
        Err(e) => tracing::warn!(error = %e, "Could not read storage stats"),
    }

    let hub = Arc::new(ConnectionHub::new(config.hub_config()));
    let api_config = config.api_config();
    let state = AppState::with_parts(
        Arc::clone(&storage),
        hub,
        Arc::new(SystemClock),
        api_config.clone(),
    );

    serve(state, &api_config).await?;

    tracing::info!("Shutting down storage engine...");
    storage.shutdown().await?;
    tracing::info!("Telemetry hub stopped");

    Ok(())
}
