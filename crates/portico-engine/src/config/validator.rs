//! Semantic validation for parsed runtime configuration values.

use anyhow::{bail, Result};

use crate::config::types::RuntimeConfig;

fn validate_ignored_dirs(names: &[String], errors: &mut Vec<String>) {
    for name in names {
        if name.trim().is_empty() {
            errors.push("watch.extra_ignored_dirs: empty directory name".to_string());
            continue;
        }
        if name.contains('/') || name.contains('\\') {
            errors.push(format!(
                "watch.extra_ignored_dirs: '{name}' must be a single directory name, not a path"
            ));
        }
    }
}

/// Validate a parsed runtime configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing every problem found.
pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.scan.max_workers == Some(0) {
        errors.push("scan.max_workers must be > 0".to_string());
    }

    validate_ignored_dirs(&config.watch.extra_ignored_dirs, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        bail!(
            "Runtime config validation failed:\n  - {}",
            errors.join("\n  - ")
        )
    }
}
