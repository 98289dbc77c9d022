//! JSON:API server
//!
//! Serves the entities described by a site document over JSON:API.

mod site;

use std::sync::Arc;

use clap::Parser;
use helios_jsonapi::{AppState, ServerConfig, create_app_with_state, init_logging};
use tracing::info;

use crate::site::{Site, SiteDocument};

/// Loads the configured site document, or an empty site without one.
fn load_site(config: &ServerConfig) -> anyhow::Result<Site> {
    match config.schema_path.as_deref() {
        Some(path) => {
            info!(path = %path, "Loading site document");
            SiteDocument::from_file(path)?.into_site()
        }
        None => {
            info!("No site document configured, starting with an empty schema");
            SiteDocument::default().into_site()
        }
    }
}

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        base_path = %config.normalized_base_path(),
        "Starting JSON:API server"
    );

    let site = load_site(&config)?;
    let state = AppState::new(Arc::new(site.backend), config.clone())
        .with_overrides(site.overrides)
        .with_accounts(site.accounts);
    let app = create_app_with_state(state);
    serve(app, &config).await
}
