#![forbid(unsafe_code)]

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};
use ytaudio_service::{
    api::{AppState, router},
    config::{ConfigOverrides, resolve_config},
};

/// Serves YouTube audio stream URLs extracted with yt-dlp.
#[derive(Debug, Parser)]
#[command(version, about)]
struct ServerArgs {
    /// Address to listen on.
    #[arg(long)]
    host: Option<String>,
    #[arg(long, short)]
    port: Option<u16>,
    /// Extraction strategy: `process` or `library`.
    #[arg(long)]
    extractor: Option<String>,
    /// Path to the yt-dlp executable.
    #[arg(long = "yt-dlp", value_name = "PATH")]
    ytdlp_bin: Option<PathBuf>,
    /// Base URL of the proof-of-origin token provider.
    #[arg(long)]
    pot_server: Option<String>,
    /// Seconds before an extraction is abandoned.
    #[arg(long, value_name = "SECS")]
    extract_timeout: Option<u64>,
    /// Dotenv file read before the process environment.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

impl From<ServerArgs> for ConfigOverrides {
    fn from(args: ServerArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            extractor: args.extractor,
            ytdlp_bin: args.ytdlp_bin,
            pot_server: args.pot_server,
            extract_timeout_secs: args.extract_timeout,
            env_path: args.env_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracer();

    let config = resolve_config(args.into()).context("loading configuration")?;
    let addr = SocketAddr::new(config.host, config.port);
    info!(
        extractor = config.extractor.as_str(),
        ytdlp = %config.ytdlp_bin.display(),
        pot_server = %config.pot_server,
        "configuration loaded"
    );

    let state = AppState::new(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    info!("server stopped");
    Ok(())
}

fn init_tracer() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        // Without a handler Ctrl+C still kills the process, just not gracefully.
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
