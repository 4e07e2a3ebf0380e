//! Soundboard - Main entry point
//!
//! Loads configuration, starts the playback consumers and serves the HTTP
//! control surface until Ctrl+C or SIGTERM.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use soundboard::api::{self, AppState};
use soundboard::audio::CpalSink;
use soundboard::Soundboard;
use soundboard_common::config::LoggingConfig;
use soundboard_common::SoundboardConfig;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for soundboard
#[derive(Parser, Debug)]
#[command(name = "soundboard")]
#[command(about = "Home-automation soundboard playback service")]
#[command(version)]
struct Args {
    /// Configuration file (overrides SOUNDBOARD_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides [webserver] port)
    #[arg(short, long, env = "SOUNDBOARD_PORT")]
    port: Option<u16>,

    /// Print the available audio output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        SoundboardConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.webserver.port = port;
    }

    init_logging(&config.logging)?;

    if args.list_devices {
        for device in CpalSink::list_devices().context("Failed to enumerate audio devices")? {
            println!("{}", device);
        }
        return Ok(());
    }

    info!("Starting soundboard v{}", env!("CARGO_PKG_VERSION"));
    info!("Sample directory: {}", config.sample_path.display());

    let host = config.webserver.host.clone();
    let port = config.webserver.port;

    let soundboard = Arc::new(
        Soundboard::from_config(config).context("Failed to initialize soundboard")?,
    );

    let app = api::create_router(AppState::new(Arc::clone(&soundboard)));

    info!("Starting HTTP server on {}:{}", host, port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Joining the consumers waits for the in-flight playback
    tokio::task::spawn_blocking(move || soundboard.shutdown())
        .await
        .context("Shutdown task failed")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Default directives for a given base level
fn default_filter(level: &str) -> String {
    format!("soundboard={0},soundboard_common={0},tower_http=info", level)
}

/// Stderr logging plus an optional plain-text log file.
///
/// `RUST_LOG` wins over `[logging] level`.
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(&config.level)))
        .unwrap_or_else(|_| EnvFilter::new(default_filter("debug")));

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
