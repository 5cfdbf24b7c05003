use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use complyd::analysis::{ModelInvoker, ResponseNormalizer};
use complyd::config::{self, Config};
use complyd::dispatch::TaskDispatcher;
use complyd::llm::{GeminiClient, GenerativeBackend};
use complyd::server::{self, AppState};
use complyd::session::SessionStore;
use complyd::store::ResultStore;

// ============================================================================
// CLI Types
// ============================================================================

/// Complyd - compliance analysis for video ads, social posts, and websites
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "complyd.yaml")]
    config: String,

    /// Host to bind to (overrides config file)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config).await?;

    // CLI overrides config
    if let Some(host) = args.host {
        config.server.host = host.to_string();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Paths are resolved relative to the config file
    let config_path = Path::new(&args.config);
    let database_path = config::resolve_path(config_path, &config.database.path);
    let uploads_dir = config::resolve_path(config_path, &config.uploads.dir);

    let api_key = config.gemini.resolve_api_key()?;
    let backend: Arc<dyn GenerativeBackend> =
        Arc::new(GeminiClient::new(&config.gemini, api_key)?);

    let invoker = ModelInvoker::new(
        backend.clone(),
        Duration::from_secs(config.gemini.file_poll_interval_seconds),
        config.gemini.file_poll_max_attempts,
    );
    let normalizer = ResponseNormalizer::new(backend);
    let dispatcher = TaskDispatcher::new(SessionStore::new(), invoker, normalizer);

    let results = ResultStore::connect(&database_path).await?;

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        results,
        uploads_dir,
    };

    let app = server::build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
