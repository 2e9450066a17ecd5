use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use voxgate_core::AppConfig;
use voxgate_engine::EngineRegistry;
use voxgate_server::AppState;

#[derive(Parser)]
#[command(name = "voxgate", about = "Streaming speech-to-text gateway over WebSocket")]
struct Cli {
    /// Path to the configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config file and the PORT variable
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {path:?}"))?,
        None => AppConfig::default(),
    };

    if let Ok(port) = std::env::var("PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("PORT is not a valid port number: {port:?}"))?;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let env_filter =
        EnvFilter::try_new(&config.general.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("voxgate starting");

    let state = AppState::new(config.session.clone());
    let router = voxgate_server::create_router(state.clone(), &config.server.ws_path);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {addr}, sessions at {}", config.server.ws_path);

    if config.engine.is_empty() {
        tracing::warn!("no engines configured; sessions will report engine_unavailable");
    } else {
        let loader = state.clone();
        let engines = config.engine.clone();
        let ensemble = config.ensemble.clone();
        tokio::spawn(async move {
            let registry = EngineRegistry::new();
            tracing::info!(available = ?registry.kinds(), "loading engines");
            if let Err(e) = loader.load_engines(engines, registry, ensemble).await {
                tracing::error!("no engine could be loaded: {e}");
            }
        });
    }

    voxgate_server::serve(listener, router, shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutting down");
    state.shutdown_engines().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
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
