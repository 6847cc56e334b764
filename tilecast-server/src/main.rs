use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;
use tilecast_config::{ConfigLoader, ConfigLoaderOptions};
use tilecast_server::{AppState, create_router};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "tilecast-server")]
#[command(about = "Splits video encodes into tiles and long-polls them out to workers")]
struct Cli {
    /// Path to a tilecast.toml configuration file
    #[arg(long, env = "TILECAST_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Longest a poll request waits for a tile, e.g. `15s`
    #[arg(long, value_parser = humantime::parse_duration)]
    dispatch_timeout: Option<Duration>,

    /// Directory encoded tiles are written to (overrides config)
    #[arg(long)]
    result_path: Option<PathBuf>,

    /// Directory relative source paths resolve against (overrides config)
    #[arg(long)]
    input_path: Option<PathBuf>,

    /// ffmpeg binary used to crop tiles (overrides config)
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

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(timeout) = cli.dispatch_timeout {
        config.dispatch.timeout = timeout;
    }
    if let Some(path) = cli.result_path {
        config.storage.result_root = path;
    }
    if let Some(path) = cli.input_path {
        config.storage.input_root = Some(path);
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
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "loaded configuration file");
    }
    warnings.log();

    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind_address()))?;

    info!(
        result_root = %config.storage.result_root.display(),
        ffmpeg = %config.ffmpeg.path,
        "starting dispatch server"
    );

    let state = AppState::from_config(&config);
    info!(dispatch_timeout = ?state.dispatch.dispatch_timeout(), "dispatch coordinator ready");

    let router = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    state.dispatch.shutdown();
    info!("server stopped");
    Ok(())
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

    info!("shutdown signal received");
}
