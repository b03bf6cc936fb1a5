//! slircbot - Straylight IRC bot.
//!
//! Connects to every configured server and hosts the built-in extensions.

use slirc_bot::config::{Config, validation};
use slirc_bot::extension::StoreManager;
use slirc_bot::extensions::BuiltinLoader;
use slirc_bot::network;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "configuration has {} error(s), see log above",
            errors.len()
        ));
    }

    info!(
        servers = config.servers.len(),
        provider = ?config.auth.provider,
        data_dir = %config.general.data_dir,
        "Starting slircbot"
    );

    let config = Arc::new(config);
    let stores = Arc::new(StoreManager::new(config.general.data_path()));
    let loader = Arc::new(BuiltinLoader::new(Arc::clone(&config), Arc::clone(&stores)));
    let (shutdown_tx, _) = broadcast::channel(1);

    let mut tasks = Vec::with_capacity(config.servers.len());
    for server in &config.servers {
        tasks.push(tokio::spawn(network::run(
            Arc::clone(&config),
            server.clone(),
            Arc::clone(&loader),
            shutdown_tx.subscribe(),
        )));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    // No receivers left means every server task has already exited.
    let _ = shutdown_tx.send(());

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Server task panicked");
        }
    }

    drop(loader);
    stores.close_all();
    info!("Shutdown complete");
    Ok(())
}
