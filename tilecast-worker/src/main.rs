use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tilecast_config::{ConfigLoader, ConfigLoaderOptions};
use tilecast_core::FfmpegTranscoder;
use tilecast_worker::{HttpJobClient, PollLoop, Worker, WorkerError};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "tilecast-worker")]
#[command(about = "Pulls tile jobs from a Tilecast server, encodes them and uploads the results")]
struct Cli {
    /// Path to a tilecast.toml configuration file
    #[arg(long, env = "TILECAST_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Base URL of the dispatch server (overrides config)
    #[arg(long)]
    server_addr: Option<String>,

    /// Pause after a failed poll, e.g. `5s`
    #[arg(long, value_parser = humantime::parse_duration)]
    retry_interval: Option<Duration>,

    /// TCP connect timeout towards the server, e.g. `10s`
    #[arg(long, value_parser = humantime::parse_duration)]
    connect_timeout: Option<Duration>,

    /// ffmpeg binary used to encode tiles (overrides config)
    #[arg(long)]
    ffmpeg_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let load = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;
    let warnings = load.warnings;
    let mut config = load.config;

    if let Some(addr) = cli.server_addr {
        config.worker.server_addr = addr;
    }
    if let Some(interval) = cli.retry_interval {
        config.worker.retry_interval = interval;
    }
    if let Some(timeout) = cli.connect_timeout {
        config.worker.connect_timeout = timeout;
    }
    if let Some(path) = cli.ffmpeg_path {
        config.ffmpeg.path = path;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    warnings.log();

    let client = HttpJobClient::new(&config.worker.server_addr, config.worker.connect_timeout)
        .context("failed to build HTTP client")?;
    let worker = Worker::new(
        Arc::new(FfmpegTranscoder::new(&config.ffmpeg.path)),
        Arc::new(client.clone()),
    );
    let poll_loop = PollLoop::new(client, config.worker.retry_interval);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown requested, finishing the current job");
            cancel.cancel();
        }
    });

    info!(
        server = %config.worker.server_addr,
        retry_interval = ?config.worker.retry_interval,
        "worker started"
    );

    match poll_loop.subscribe(&cancel, &worker).await {
        Ok(()) | Err(WorkerError::Cancelled) => {
            info!("worker stopped");
            Ok(())
        }
        Err(err) => Err(err).context("poll loop failed"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
