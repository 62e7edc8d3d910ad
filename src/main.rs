//! cloudshelf - upload, list and share files kept in a cloud bucket

use anyhow::Context;
use clap::Parser;
use cloudshelf::metrics::server::MetricsServer;
use cloudshelf::{config::Config, server::Server, storage::build_store, telemetry};
use std::path::PathBuf;
use tracing::info;

/// Upload files through a browser and share them with signed links
#[derive(Parser, Debug)]
#[command(name = "cloudshelf")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file; environment variables are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the configured level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::from_env().context("loading configuration from the environment")?,
    };
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    telemetry::init_subscriber(&config.logging)?;
    info!("Starting cloudshelf v{}", cloudshelf::VERSION);
    match &args.config {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("Loaded configuration from environment"),
    }

    let store = build_store(&config.storage)
        .await
        .context("initializing object store")?;

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::on_port(config.metrics.port);
        let addr = server.start().await.context("starting metrics server")?;
        info!("Metrics available at http://{}/metrics", addr);
        Some(server)
    } else {
        None
    };

    let server = Server::new(config, store).await?;
    server.run().await?;

    if let Some(metrics_server) = metrics_server.as_mut() {
        metrics_server.shutdown().await;
    }

    Ok(())
}
