use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tts_stream_gateway::{ServerConfig, server};

/// Streaming TTS gateway - WebSocket server for chunked speech synthesis
#[derive(Parser, Debug)]
#[command(name = "tts-stream-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host to bind (overrides config file and environment)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config file and environment)
    #[arg(long)]
    port: Option<u16>,

    /// Enable debug logging when RUST_LOG is not set
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if cli.verbose { "debug" } else { "info" }))
        .map_err(|e| anyhow!("Invalid log filter: {}", e))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("TTS stream gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from file or environment
    let mut config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path)?
    } else {
        ServerConfig::from_env()?
    };

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!("Starting server on {}", config.address());
    server::run(config).await?;

    Ok(())
}
