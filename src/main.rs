use anyhow::Result;
use std::sync::Arc;

use school_services::{
    app, config, logging, services::sqlite_store::SqliteStore, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;
    tracing::info!(
        "Import policies: subject failures {:?}, subject codes {:?}",
        config.import.subject_failures,
        config.import.subject_codes
    );

    let store = SqliteStore::open(&config.database_path)?;
    let addr = config.bind_addr;

    // Build our application state
    let state = AppState::new(config, Arc::new(store));
    let app = app(state);

    // Run it
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
