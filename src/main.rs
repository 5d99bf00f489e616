//! mxdird - Matrix room directory server.
//!
//! An appservice agent watches a curated set of rooms, keeps the directory
//! store in sync with their state, and publishes the eligible rooms to
//! federated callers as a paginated `publicRooms` listing.

mod config;
mod db;
mod directory;
mod error;
mod http;
mod keyserver;
mod matrix;
mod metrics;
mod processor;
mod state;

use crate::config::Config;
use crate::db::Database;
use crate::directory::Directory;
use crate::directory::snapshot::SnapshotCache;
use crate::keyserver::KeyServerClient;
use crate::matrix::{Homeserver, HttpHomeserver};
use crate::processor::Processor;
use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
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

    info!(
        homeserver = %config.homeserver.url,
        space = %config.directory.space,
        "Starting mxdird"
    );

    metrics::init();

    // Initialize database
    let db = Database::new(&config.database.path).await?;

    // Bring up the appservice agent and learn its own identity
    let homeserver: Arc<dyn Homeserver> = Arc::new(HttpHomeserver::new(
        config.homeserver.url.as_str(),
        config.homeserver.access_token.as_str(),
    ));
    let agent_user_id = homeserver.whoami().await?;
    info!(user_id = %agent_user_id, "Appservice agent identified");

    // The configured space may be an alias; resolve it once up front
    let space_id = homeserver.resolve_room(&config.directory.space).await?;
    info!(space_id = %space_id, "Directory space resolved");

    // Build the snapshot cache and fill it before serving any traffic
    let snapshot = Arc::new(SnapshotCache::new(
        db.clone(),
        Arc::clone(&homeserver),
        space_id,
        config.directory.mode.into(),
    ));
    let count = snapshot.refresh().await?;
    info!(rooms = count, "Initial snapshot built");

    // Background refresh with a shutdown handshake: cancel the token, then
    // await the handle so an in-flight refresh finishes before exit
    let shutdown = CancellationToken::new();
    let refresh_handle = snapshot.spawn_refresh_loop(
        Duration::from_secs(config.directory.refresh_interval_secs),
        shutdown.clone(),
    );
    info!(
        interval_secs = config.directory.refresh_interval_secs,
        "Snapshot refresh loop started"
    );

    let processor = Processor::new(
        Arc::clone(&homeserver),
        Arc::clone(&snapshot),
        config.directory.admin_user.as_str(),
        agent_user_id.as_str(),
    );

    let app_state = Arc::new(AppState {
        directory: Mutex::new(Directory::new(db, homeserver)),
        processor,
        snapshot,
        authenticator: Arc::new(KeyServerClient::new(config.keyserver.url.as_str())),
        hs_token: config.homeserver.hs_token.clone(),
    });

    let router = http::router(app_state);
    http::run(
        router,
        &config.listen.address,
        config.listen.port,
        shutdown_signal(),
    )
    .await?;

    info!("Stopping...");
    shutdown.cancel();
    if let Err(e) = refresh_handle.await {
        error!(error = %e, "Refresh task did not shut down cleanly");
    }

    Ok(())
}

/// Resolve when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
}
