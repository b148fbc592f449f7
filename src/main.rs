use std::path::PathBuf;

use anyhow::Context;
use tido_auth::TokenKeys;
use tido_server::{AppState, ServerConfig};
use tido_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting tido server");

    // Database path: TIDO_DB overrides ~/.tido/tido.db
    let db_path = match std::env::var("TIDO_DB") {
        Ok(path) => PathBuf::from(path),
        Err(_) => dirs_home().join(".tido").join("tido.db"),
    };

    let db = Database::open(&db_path).context("failed to open database")?;
    tracing::info!(path = %db_path.display(), "Database opened");

    let keys = match std::env::var("TIDO_JWT_SECRET") {
        Ok(secret) => TokenKeys::from_secret(secret.as_bytes()),
        Err(_) => {
            tracing::warn!("TIDO_JWT_SECRET not set, using development secret");
            TokenKeys::from_secret(b"tido-dev-secret")
        }
    };

    let mut config = ServerConfig::default();
    if let Ok(addr) = std::env::var("TIDO_ADDR") {
        let (host, port) = addr
            .rsplit_once(':')
            .context("TIDO_ADDR must be host:port")?;
        config.host = host.to_string();
        config.port = port.parse().context("TIDO_ADDR port must be a number")?;
    }

    let state = AppState { db, keys };
    let handle = tido_server::start(config, state)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "tido server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    Ok(())
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
