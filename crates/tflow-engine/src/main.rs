//! Telemetry refresh and distribution engine - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Telemetry refresh and distribution engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TFLOW_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tflow_telemetry::init_logging()?;

    info!("Starting tflow engine v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > TFLOW_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TFLOW_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = tflow_engine::AppConfig::from_file(&config_path)?;
    info!(
        entities = config.entities.len(),
        gateway = %config.gateway.base_url,
        "Configuration loaded"
    );

    let app = tflow_engine::Application::new(config).await?;
    app.run().await?;

    Ok(())
}
