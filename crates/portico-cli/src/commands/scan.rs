use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use portico_engine::{validate_config, RuntimeConfig};
use portico_runtime::{DiscoveredManifest, ManifestScanner, ManifestSource, SiteIndex};
use serde_json::json;

/// Execute the `scan` command: discover component packages and list their components.
pub async fn execute(site_dirs: Vec<PathBuf>, workers: Option<usize>, json: bool) -> Result<()> {
    // 1. Resolve site directories and pool size (flags win over env)
    let mut config = RuntimeConfig::default();
    config.apply_env()?;
    if !site_dirs.is_empty() {
        config.scan.site_dirs = site_dirs;
    }
    if workers.is_some() {
        config.scan.max_workers = workers;
    }
    validate_config(&config)?;
    if config.scan.site_dirs.is_empty() {
        bail!("No site directories given; pass --site-dir or set PORTICO_SITE_DIRS");
    }

    // 2. Scan
    let index = Arc::new(SiteIndex::new(config.scan.site_dirs.clone()));
    let scanner = ManifestScanner::new(index);
    let candidates = scanner.candidates().len();
    let mut found = scanner.scan(config.scan.max_workers).await;
    found.sort_by(|a, b| a.package.cmp(&b.package));

    // 3. Report
    if json {
        let packages: Vec<_> = found.iter().map(to_json).collect();
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }

    println!(
        "Found {} component package(s) among {} candidate(s):\n",
        found.len(),
        candidates
    );
    for discovered in &found {
        let manifest = &discovered.manifest;
        println!("Package: {} ({} {})", discovered.package, manifest.name, manifest.version);
        println!("  Asset root: {}", discovered.asset_root.display());
        println!("  Found via:  {}", source_label(discovered.source));
        for descriptor in &manifest.components {
            println!("  - {}", manifest.component_key(descriptor));
        }
        println!();
    }

    Ok(())
}

fn source_label(source: ManifestSource) -> &'static str {
    match source {
        ManifestSource::Embedded => "package metadata",
        ManifestSource::Record => "recorded files",
        ManifestSource::ModuleDir => "module directory",
    }
}

fn to_json(discovered: &DiscoveredManifest) -> serde_json::Value {
    let manifest = &discovered.manifest;
    let components: Vec<String> = manifest
        .components
        .iter()
        .map(|descriptor| manifest.component_key(descriptor).to_string())
        .collect();
    json!({
        "package": discovered.package,
        "name": manifest.name,
        "version": manifest.version,
        "asset_root": discovered.asset_root,
        "source": source_label(discovered.source),
        "components": components,
        "security": manifest.security,
    })
}
