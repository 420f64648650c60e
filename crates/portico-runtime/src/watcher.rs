//! Dev-mode watcher that re-resolves glob-backed component assets.
//!
//! One recursive watcher per distinct asset root. Changes under build,
//! cache and dependency directories are dropped before any resolution work
//! so tooling that writes intermediate artifacts cannot cause a feedback loop.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use portico_types::{AssetSource, ComponentKey, ComponentPatch};

use crate::error::{Result, RuntimeError};
use crate::registry::ComponentRegistry;
use crate::sandbox;

/// Directory names whose contents never trigger re-resolution.
pub const DEFAULT_IGNORED_DIRS: [&str; 13] = [
    "node_modules",
    ".git",
    "__pycache__",
    ".cache",
    ".vite",
    ".turbo",
    ".parcel-cache",
    ".next",
    ".pytest_cache",
    ".mypy_cache",
    ".venv",
    "venv",
    "target",
];

/// Host hook invoked with the keys whose assets were re-resolved.
pub type ComponentChangedCallback = Arc<dyn Fn(&[ComponentKey]) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Watching only happens in development mode.
    pub dev_mode: bool,
    /// Appended to [`DEFAULT_IGNORED_DIRS`].
    pub extra_ignored_dirs: Vec<String>,
}

/// State shared with the notification threads.
struct WatchShared {
    registry: Arc<ComponentRegistry>,
    on_changed: ComponentChangedCallback,
    ignored: HashSet<String>,
}

impl WatchShared {
    fn is_noisy(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        relative.components().any(|component| match component {
            Component::Normal(name) => self.ignored.contains(name.to_string_lossy().as_ref()),
            _ => false,
        })
    }

    fn handle_event(&self, root: &Path, event: notify::Result<Event>) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "File watcher error");
                return;
            }
        };
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }
        // One re-resolution pass per event; every path shares the root.
        if let Some(path) = event.paths.iter().find(|p| !self.is_noisy(root, p)) {
            self.on_path_changed(root, path);
        } else if let Some(path) = event.paths.first() {
            tracing::trace!(path = %path.display(), "Ignoring change in noisy directory");
        }
    }

    fn on_path_changed(&self, root: &Path, path: &Path) -> Vec<ComponentKey> {
        if self.is_noisy(root, path) {
            tracing::trace!(path = %path.display(), "Ignoring change in noisy directory");
            return Vec::new();
        }

        let records = match self.registry.glob_watch_records_for_root(root) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Cannot read glob watch records");
                return Vec::new();
            }
        };

        let mut changed = Vec::new();
        for record in records {
            let current = match self.registry.get(record.key.as_str()) {
                Ok(Some(definition)) => definition,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(component = %record.key, error = %e, "Cannot read component");
                    continue;
                }
            };

            let mut patch = ComponentPatch::default();
            for (slot, pattern) in record.patterns() {
                match sandbox::resolve(pattern, root) {
                    Ok(resolved) => {
                        if current.slot(slot).and_then(AssetSource::path) != Some(resolved.as_path()) {
                            patch = patch.set(slot, Some(AssetSource::File(resolved)));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            component = %record.key,
                            slot = slot.as_str(),
                            pattern,
                            error = %e,
                            "Re-resolution failed; keeping previous asset"
                        );
                    }
                }
            }

            if patch.is_empty() {
                continue;
            }
            match self.registry.update_component(record.key.as_str(), &patch) {
                Ok(true) => changed.push(record.key.clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(component = %record.key, error = %e, "Component update failed");
                }
            }
        }

        if !changed.is_empty() {
            tracing::info!(
                components = ?changed.iter().map(ComponentKey::as_str).collect::<Vec<_>>(),
                path = %path.display(),
                "Components changed"
            );
            (self.on_changed)(changed.as_slice());
        }
        changed
    }
}

/// Directory watchers for component asset roots.
pub struct ComponentFileWatcher {
    shared: Arc<WatchShared>,
    dev_mode: bool,
    watchers: Mutex<HashMap<PathBuf, RecommendedWatcher>>,
}

impl std::fmt::Debug for ComponentFileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentFileWatcher")
            .field("dev_mode", &self.dev_mode)
            .field("roots", &self.watched_roots())
            .finish_non_exhaustive()
    }
}

impl ComponentFileWatcher {
    #[must_use]
    pub fn new(
        registry: Arc<ComponentRegistry>,
        on_changed: ComponentChangedCallback,
        options: WatchOptions,
    ) -> Self {
        let ignored = DEFAULT_IGNORED_DIRS
            .iter()
            .map(|name| (*name).to_string())
            .chain(options.extra_ignored_dirs)
            .collect();
        Self {
            shared: Arc::new(WatchShared {
                registry,
                on_changed,
                ignored,
            }),
            dev_mode: options.dev_mode,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<PathBuf, RecommendedWatcher>>> {
        self.watchers.lock().map_err(|_| RuntimeError::LockPoisoned)
    }

    /// Begin watching `roots`, one recursive watcher per distinct directory.
    ///
    /// A no-op outside dev mode or with no roots. A root that cannot be
    /// watched is logged and skipped. Returns the number of directories
    /// now watched.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if internal state is poisoned.
    pub fn start(&self, roots: &[PathBuf]) -> Result<usize> {
        if !self.dev_mode || roots.is_empty() {
            tracing::debug!(dev_mode = self.dev_mode, roots = roots.len(), "File watcher not started");
            return Ok(0);
        }

        let mut watchers = self.lock()?;
        for root in roots {
            let root = match root.canonicalize() {
                Ok(root) if root.is_dir() => root,
                Ok(_) => {
                    tracing::warn!(root = %root.display(), "Asset root is not a directory; not watching");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "Asset root unavailable; not watching");
                    continue;
                }
            };
            if watchers.contains_key(&root) {
                continue;
            }
            match self.watch_root(&root) {
                Ok(watcher) => {
                    tracing::info!(root = %root.display(), "Watching component assets");
                    watchers.insert(root, watcher);
                }
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "Failed to watch asset root");
                }
            }
        }
        Ok(watchers.len())
    }

    fn watch_root(&self, root: &Path) -> Result<RecommendedWatcher> {
        let shared = Arc::clone(&self.shared);
        let event_root = root.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            shared.handle_event(&event_root, event);
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(watcher)
    }

    /// Close every watcher. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        let mut watchers = match self.watchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (root, mut watcher) in watchers.drain() {
            if let Err(e) = watcher.unwatch(&root) {
                tracing::warn!(root = %root.display(), error = %e, "Failed to close file watcher");
            }
        }
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        !self.watched_roots().is_empty()
    }

    /// Watched directories in sorted order.
    #[must_use]
    pub fn watched_roots(&self) -> Vec<PathBuf> {
        let Ok(watchers) = self.watchers.lock() else {
            return Vec::new();
        };
        let mut roots: Vec<_> = watchers.keys().cloned().collect();
        roots.sort();
        roots
    }

    /// Handle a change to `path` under the watched `root` as if the
    /// notification facility had reported it. Returns the changed keys.
    pub fn on_path_changed(&self, root: &Path, path: &Path) -> Vec<ComponentKey> {
        self.shared.on_path_changed(root, path)
    }
}

impl Drop for ComponentFileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
