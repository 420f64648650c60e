//! Bookkeeping that lets the file watcher re-resolve glob-backed slots.

use std::path::PathBuf;
use std::sync::Arc;

use crate::component::{ComponentKey, Slot};
use crate::manifest::PackageManifest;

/// Ties a component's glob-backed `js`/`css` slots to the literal patterns
/// needed to re-resolve them. Only created for components whose manifest
/// entries used glob patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobWatchRecord {
    pub key: ComponentKey,
    pub js_pattern: Option<String>,
    pub css_pattern: Option<String>,
    pub manifest: Arc<PackageManifest>,
    /// Canonical asset root the patterns resolve against.
    pub asset_root: PathBuf,
}

impl GlobWatchRecord {
    /// Glob patterns per slot, in a fixed `js`, `css` order.
    #[must_use]
    pub fn patterns(&self) -> Vec<(Slot, &str)> {
        let mut out = Vec::with_capacity(2);
        if let Some(pattern) = self.js_pattern.as_deref() {
            out.push((Slot::Js, pattern));
        }
        if let Some(pattern) = self.css_pattern.as_deref() {
            out.push((Slot::Css, pattern));
        }
        out
    }
}
