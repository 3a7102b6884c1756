//! Doru - pharmacy locator backend
//!
//! Serves the drugstore API:
//! - Registration with mail confirmation
//! - Drugstore profiles with opening hours
//! - Stock management and drug search

use anyhow::Result;
use doru::api;
use doru::services::{DrugstoreService, Mailer, PhotoStore};
use doru::{Config, Database};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    if std::path::Path::new(".env").exists() {
        dotenvy::dotenv()?;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Doru starting...");

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");
    info!("Mail backend: {}", config.mail.backend);
    info!("Images directory: {}", config.images.dir);

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.migrate().await?;
    info!("Database initialized");

    let drugstores = DrugstoreService::new(
        db,
        Mailer::new(&config.mail),
        PhotoStore::new(&config.images),
        &config.front.base_url,
    );

    let server = api::start_server(config, drugstores);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                anyhow::bail!("API server task failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Doru shutting down");
    Ok(())
}
