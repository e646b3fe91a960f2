// src/main.rs - Fake Select Mini V2 entry point
use std::path::PathBuf;

use clap::Parser;
use fake_select_mini::{config, server};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fake-printer", about = "Emulates the Monoprice Select Mini V2 HTTP API")]
struct Args {
    /// TOML configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "printer.toml")]
    config: PathBuf,
    /// Override `server.port`
    #[arg(short, long)]
    port: Option<u16>,
    /// Override `server.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
    /// Log filter, e.g. `debug` or `fake_select_mini=trace`; `RUST_LOG` wins when set
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Seed the thermal noise for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Loading configuration from: {}", args.config.display());
    let mut config = config::load_config_or_default(&args.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config.display(), e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    tracing::info!(
        "Thermal: room {}°, floor {}°, convergence every {:?}",
        config.thermal.room_temperature,
        config.thermal.floor(),
        config.thermal.convergence_period()
    );
    match toml::to_string(&config) {
        Ok(effective) => tracing::debug!("Effective configuration:\n{}", effective),
        Err(e) => tracing::warn!("Could not render effective configuration: {}", e),
    }

    let listener = match server::bind(&config).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };
    server::serve(listener, config, args.seed).await?;
    Ok(())
}
