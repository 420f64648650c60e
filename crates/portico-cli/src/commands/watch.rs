use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use portico_engine::{parse_config, validate_config, ComponentHost, RuntimeConfig};
use portico_runtime::ComponentChangedCallback;
use portico_types::ComponentKey;

/// Execute the `watch` command: start a dev-mode host and log changes until Ctrl-C.
pub async fn execute(config_path: Option<&Path>) -> Result<()> {
    // 1. Load config; this command always runs in dev mode
    let mut config = match config_path {
        Some(path) => parse_config(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    config.apply_env()?;
    config.dev_mode = true;
    validate_config(&config)?;

    // 2. Start host
    let host = ComponentHost::new(config);
    let on_changed: ComponentChangedCallback = Arc::new(|keys: &[ComponentKey]| {
        let keys: Vec<&str> = keys.iter().map(ComponentKey::as_str).collect();
        println!("Changed: {}", keys.join(", "));
    });
    let summary = host.start(on_changed).await?;
    println!(
        "Registered {} component(s) from {} package(s); watching {} director(ies). Press Ctrl-C to stop.",
        summary.components, summary.manifests, summary.watched_roots
    );

    // 3. Run until interrupted
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    host.shutdown()?;
    Ok(())
}
