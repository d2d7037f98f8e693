mod alias;
mod config;
mod logging;
mod proxy;
mod routes;
mod state;
mod view;

use std::process::ExitCode;

use crate::alias::DEFAULT_EXTENSIONS;
use crate::config::{ConfigError, DevConfig};
use crate::proxy::ProxyError;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    logging::init();
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "dev server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = DevConfig::from_env()?;
    check_project_layout(&config);

    let (host, port) = config.bind_addr();
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        proxy_prefix = %config.proxy.prefix,
        proxy_target = %config.proxy.target,
        change_origin = config.proxy.change_origin,
        alias = %config.alias.symbol,
        alias_target = %config.alias.target.display(),
        test_environment = config.test.environment.as_str(),
        test_globals = config.test.globals,
        "finance-tracker dev server listening"
    );

    let app = routes::app(state::AppState::new(config)?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("dev server stopped");
    Ok(())
}

/// Warn about missing pieces of the frontend layout. None of them stop the
/// server: the landing view and the proxy work without a source tree.
fn check_project_layout(config: &DevConfig) {
    if !config.alias.target.is_dir() {
        tracing::warn!(target_dir = %config.alias.target.display(), "alias target is not a directory");
    }
    match config.alias.resolve_existing(&config.entry, DEFAULT_EXTENSIONS) {
        Some(path) => tracing::info!(entry = %config.entry, path = %path.display(), "entry module resolved"),
        None => tracing::warn!(entry = %config.entry, "entry module not found under alias target"),
    }

    let setup = config.test.setup_path(&config.root);
    if !setup.is_file() {
        tracing::debug!(path = %setup.display(), "test setup file missing");
    }
    if !config.public_dir.is_dir() {
        tracing::debug!(path = %config.public_dir.display(), "public directory missing; static fallback will 404");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
