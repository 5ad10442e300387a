//! Sourcing desk - vendor sourcing conversation tracker
//!
//! A Rust backend implementing the conversation state machine behind a
//! buyer's vendor-sourcing workflow: opportunity invitations, yes/no
//! responses, quotes, a single award per opportunity, e-signature, and
//! purchase order issuance.

mod api;
mod db;
mod directory;
mod engine;
mod notify;
mod retention;
mod state_machine;

use api::{create_router, AppState};
use db::Database;
use directory::JsonVendorDirectory;
use engine::{ConversationEngine, Notifier};
use notify::{LogNotifier, WebhookNotifier};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sourcing_desk=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = std::env::var("SOURCING_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.sourcing-desk/sourcing.db")
    });

    let port: u16 = std::env::var("SOURCING_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let base_url = std::env::var("SOURCING_BASE_URL")
        .unwrap_or_else(|_| format!("http://localhost:{port}"));

    let retention_minutes: i64 = std::env::var("SOURCING_RETENTION_MINUTES")
        .ok()
        .and_then(|m| m.parse().ok())
        .unwrap_or(60);
    let retention_window = chrono::Duration::minutes(retention_minutes);

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    tracing::info!(path = %db_path, "Opening database");
    let db = Database::open(&db_path)?;

    // Vendor directory
    let directory = match std::env::var("SOURCING_VENDORS_PATH") {
        Ok(path) => match JsonVendorDirectory::load(&path) {
            Ok(dir) => {
                tracing::info!(path = %path, vendors = dir.len(), "Vendor directory loaded");
                dir
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e,
                    "Failed to load vendor directory, starting with an empty one");
                JsonVendorDirectory::empty()
            }
        },
        Err(_) => {
            tracing::warn!("SOURCING_VENDORS_PATH not set, starting with an empty vendor directory");
            JsonVendorDirectory::empty()
        }
    };

    // Notification transport
    let notifier: Arc<dyn Notifier> = match std::env::var("SOURCING_NOTIFY_URL") {
        Ok(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Webhook notifier configured");
            Arc::new(WebhookNotifier::new(endpoint))
        }
        Err(_) => {
            tracing::warn!("SOURCING_NOTIFY_URL not set, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    // Background retention sweeps every 15 minutes
    retention::spawn_sweeper(
        db.clone(),
        retention_window,
        std::time::Duration::from_secs(15 * 60),
    );

    let engine = ConversationEngine::new(db, Arc::new(directory), notifier, base_url);
    let state = AppState::new(engine, retention_window);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Sourcing desk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
