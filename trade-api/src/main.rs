//! Trade Order API Server
//!
//! Accepts orders over HTTP, stores them in SQLite and pushes every new
//! order to the clients connected on `/ws`.

mod config;
mod routes;

use std::sync::Arc;
use tokio::signal;
use trade_services::{Broadcaster, OrderService, OrderStore, SubscriberRegistry};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ApiConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub order_service: OrderService,
    /// Host name reported by `/ws-test` (HOST environment variable)
    pub public_host: Option<String>,
}

impl AppState {
    pub fn registry(&self) -> &SubscriberRegistry {
        self.order_service.registry()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env.local takes precedence over .env; dotenvy never overrides
    load_env_file(".env.local");
    load_env_file(".env");

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,trade_api=debug")),
        )
        .init();

    info!("Starting Trade Order API");

    let config = ApiConfig::from_env()?;

    // Initialize order storage (SQLite database)
    let store = if config.is_in_memory() {
        info!("Initializing in-memory order storage");
        OrderStore::new_in_memory()?
    } else {
        info!("Initializing order storage at: {}", config.database_path);
        OrderStore::new(&config.database_path)?
    };

    let registry = SubscriberRegistry::new();
    let broadcaster = Broadcaster::with_send_timeout(registry.clone(), config.send_timeout);
    let order_service = OrderService::new(Arc::new(store), broadcaster);

    let state = AppState {
        order_service,
        public_host: config.public_host.clone(),
    };

    let app = routes::app(state);

    let addr = config.socket_addr();
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            registry.close_all().await;
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

fn load_env_file(filename: &str) {
    if let Err(e) = dotenvy::from_filename(filename) {
        // Not an error if the file doesn't exist
        if !e.not_found() {
            eprintln!("Warning: Failed to load {}: {}", filename, e);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
