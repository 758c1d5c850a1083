//! mucd — Multi-User Chat component protocol engine.
//!
//! The binary wires the engine to its collaborators and waits for shutdown.
//! Stanza transport belongs to the surrounding component framework; the
//! adapter feeds `MucComponent::submit` and drains the outbound channel.

use mucd::config::Config;
use mucd::delivery::ChannelWriter;
use mucd::history::MemoryHistory;
use mucd::MucComponent;
use std::sync::Arc;
use tracing::{debug, error, info};
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

    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).map_err(|e| {
            error!(path = %config_path, error = %e, "Failed to load config");
            e
        })?
    } else {
        info!(path = %config_path, "no config file; using defaults");
        Config::default()
    };

    info!(
        service = %config.service.name,
        workers = config.service.workers,
        "Starting mucd"
    );

    let history = Arc::new(MemoryHistory::new(config.history.max_messages));
    let (writer, mut outbound) = ChannelWriter::new();

    let component = MucComponent::new(&config, history, None, Arc::new(writer))
        .map_err(|e| anyhow::anyhow!("component init failed: {e}"))?;

    // Transport adapter boundary: until one is attached, outbound stanzas
    // are only traced.
    let drain = tokio::spawn(async move {
        while let Some(stanza) = outbound.recv().await {
            debug!(%stanza, "outbound stanza");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    component.shutdown().await;
    drain.abort();

    Ok(())
}
