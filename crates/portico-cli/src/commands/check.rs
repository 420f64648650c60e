use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use portico_runtime::ComponentRegistry;
use portico_types::ManifestDocument;

/// Execute the `check` command: validate one manifest and resolve every asset it names.
pub fn execute(manifest_path: &Path, root: Option<&Path>) -> Result<()> {
    // 1. Parse manifest TOML
    let text = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read manifest: {}", manifest_path.display()))?;
    let document = ManifestDocument::from_toml_str(&text)
        .with_context(|| format!("Failed to parse manifest: {}", manifest_path.display()))?;
    let Some(manifest) = document.into_component_manifest()? else {
        bail!(
            "{} has no [tool.portico.component] section",
            manifest_path.display()
        );
    };
    println!(
        "Manifest structure: OK ({} {}, {} component(s))",
        manifest.name,
        manifest.version,
        manifest.components.len()
    );

    // 2. Resolve every asset, collecting all sandbox errors
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => match manifest_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    println!("Asset root:         {}", root.display());

    let mut failures = 0usize;
    for descriptor in &manifest.components {
        let key = manifest.component_key(descriptor);
        for (slot, pattern) in [("css", &descriptor.css), ("js", &descriptor.js)] {
            let Some(pattern) = pattern else { continue };
            match portico_runtime::resolve(pattern, &root) {
                Ok(path) => println!("  {key} {slot}: {}", path.display()),
                Err(e) => {
                    failures += 1;
                    println!("  {key} {slot}: FAILED");
                    println!("    {e}");
                }
            }
        }
    }
    if failures > 0 {
        bail!("{failures} asset reference(s) failed to resolve");
    }

    // 3. Register into a scratch registry and check mountability
    let registry = ComponentRegistry::new();
    let keys = registry.register_from_manifest(manifest, &root)?;
    let mut unmountable = 0usize;
    for key in &keys {
        let mountable = registry
            .get(key.as_str())?
            .is_some_and(|definition| definition.is_mountable());
        if !mountable {
            unmountable += 1;
            println!("  {key}: FAILED (no JS or HTML content)");
        }
    }
    if unmountable > 0 {
        bail!("{unmountable} component(s) cannot be mounted");
    }

    println!("\nAll checks passed.");
    Ok(())
}
