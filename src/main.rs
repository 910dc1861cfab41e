use anyhow::Result;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use showroom_rust::{config::Settings, create_app, storage::FileStore, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "showroom_rust=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing showroom server...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let addr: SocketAddr = match settings.server_address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid server address format in configuration ('{}'): {}", settings.server_address, e);
            return Err(anyhow::anyhow!("Invalid server address format: {}", settings.server_address));
        }
    };

    let store = Arc::new(FileStore::new(&settings.storage_path));
    let state = AppState::build(settings, store)?;

    // A stale or unreadable stored session just means starting logged out
    match state.session.restore().await {
        Ok(session_state) => tracing::info!(?session_state, "Session restored"),
        Err(e) => tracing::warn!("Could not restore stored session: {}", e),
    }

    let app = create_app(state);

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
