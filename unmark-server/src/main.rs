use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use unmark_config::{DEFAULT_CONFIG_FILE, UnmarkConfigLoader};
use unmark_pipeline::{JobStore, Pipeline, spawn_sweeper};
use unmark_server::{AppState, build_app_router};

/// Scrape a dealer listing, strip watermarks from its photos, serve a ZIP.
#[derive(Debug, Parser)]
#[command(name = "unmark-server", version, about)]
struct Cli {
    /// YAML config file. Defaults to ./unmark.yaml when present.
    #[arg(short, long, env = "UNMARK_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address override.
    #[arg(long)]
    host: Option<String>,

    /// Port override.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => UnmarkConfigLoader::new().with_required_file(path),
        None => UnmarkConfigLoader::new().with_file(DEFAULT_CONFIG_FILE),
    };
    let mut config = loader
        .load_validated()
        .context("refusing to start with an invalid configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let log_path = unmark_common::observability::init_logging(config.logging.to_log_config())
        .context("failed to initialise logging")?;
    tracing::info!(
        log_file = %log_path.display(),
        vendor = config.vendor.provider(),
        "server.starting"
    );

    let remover = unmark_vendors::build_remover(&config.vendor)?;
    let pipeline = Pipeline::from_config(&config.scraper, remover)?;
    let jobs = Arc::new(JobStore::from_config(&config.jobs));

    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(jobs.clone(), config.jobs.sweep_interval(), cancel.clone());

    let state = AppState::new(pipeline, jobs);
    let app = build_app_router(state, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.host))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "server.listening");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("server.shutdown.signal"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await
        .context("server error")?;

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper).await;
    tracing::info!("server.stopped");
    Ok(())
}
