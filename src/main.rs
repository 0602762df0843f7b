//! Outerfaces Revision Server
//!
//! This is the main entry point for the revision-pinned asset server.
//! It loads configuration, sets up logging, resolves the application
//! revision, and starts the HTTP service.

use outerfaces_rev::{RevServer, RevisionProvider, ServeConfig};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "outerfaces_rev.yaml";

/// Main entry point for the revision server
///
/// # Usage
/// ```bash
/// # Start with default config (outerfaces_rev.yaml) or built-in defaults
/// cargo run
///
/// # Start with custom config
/// cargo run -- /path/to/config.yaml
/// ```
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Outerfaces Revision Server");

    let config = match env::args().nth(1) {
        Some(path) => load_config(&path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH),
        None => {
            info!("No configuration file found, using defaults");
            ServeConfig::default()
        }
    };

    info!("  - Listen address: {}", config.listen_address);
    info!("  - Mismatch policy: {:?}", config.mismatch_policy);
    info!("  - Asset roots: {:?}", config.asset_roots);
    info!("  - Index document: {}", config.index_document);
    info!("  - CDN origin: {:?}", config.cdn_origin);
    info!("  - Metrics enabled: {}", config.enable_metrics);

    let config = Arc::new(config);
    let provider = Arc::new(RevisionProvider::from_config(&config));

    // Resolve once at startup so the first request doesn't pay for it
    let revision = provider.current();
    info!("Current revision: {}", revision);

    let server = Arc::new(RevServer::new(config, provider));
    let listener = server.bind().await?;
    server.run(listener).await?;

    Ok(())
}

/// Load and validate a configuration file, exiting on failure
fn load_config(path: &str) -> ServeConfig {
    info!("Loading configuration from: {}", path);
    match ServeConfig::from_file(path) {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Please ensure the configuration file exists and is valid");
            std::process::exit(1);
        }
    }
}
