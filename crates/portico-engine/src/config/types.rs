//! Runtime configuration types.

use std::path::PathBuf;

use anyhow::{Context, Result};
use portico_runtime::WatchOptions;
use serde::{Deserialize, Serialize};

/// Enables dev mode when set to `1`, `true`, or `yes`.
pub const ENV_DEV_MODE: &str = "PORTICO_DEV_MODE";
/// Site directories, joined with the platform path-list separator.
pub const ENV_SITE_DIRS: &str = "PORTICO_SITE_DIRS";
/// Upper bound on discovery workers.
pub const ENV_SCAN_WORKERS: &str = "PORTICO_SCAN_WORKERS";

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Re-resolve glob-backed assets when files change.
    pub dev_mode: bool,
    pub scan: ScanConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Directories holding installed packages.
    pub site_dirs: Vec<PathBuf>,
    /// Defaults to available parallelism.
    pub max_workers: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Appended to the built-in noisy directory names.
    pub extra_ignored_dirs: Vec<String>,
}

impl RuntimeConfig {
    /// Apply `PORTICO_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORTICO_SCAN_WORKERS` is not a number.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var_os(name).map(|v| v.to_string_lossy().into_owned()))
    }

    /// Apply overrides read through `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker override is not a number.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_DEV_MODE) {
            self.dev_mode = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
        if let Some(raw) = lookup(ENV_SITE_DIRS) {
            self.scan.site_dirs = std::env::split_paths(&raw)
                .filter(|dir| !dir.as_os_str().is_empty())
                .collect();
        }
        if let Some(raw) = lookup(ENV_SCAN_WORKERS) {
            let workers = raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{ENV_SCAN_WORKERS} must be a number, got '{raw}'"))?;
            self.scan.max_workers = Some(workers);
        }
        Ok(())
    }

    /// Watcher settings derived from this configuration.
    #[must_use]
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            dev_mode: self.dev_mode,
            extra_ignored_dirs: self.watch.extra_ignored_dirs.clone(),
        }
    }
}
