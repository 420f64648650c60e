//! Component definitions and their merge-update form.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Registry key of a component: `<package>.<component>` for manifest
/// components, a bare name for runtime-registered ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentKey(String);

impl ComponentKey {
    /// Create a key from a raw string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build the fully-qualified key of a manifest component.
    #[must_use]
    pub fn qualified(package: &str, component: &str) -> Self {
        Self(format!("{package}.{component}"))
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Package prefix of a qualified key, if any.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.0.split_once('.').map(|(pkg, _)| pkg)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for ComponentKey {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Borrow<str> for ComponentKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// One of the three content slots of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Html,
    Css,
    Js,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Html, Slot::Css, Slot::Js];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Js => "js",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of one slot: inline text or a resolved absolute file path.
///
/// A slot can never be both; the enum makes that unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSource {
    Inline(String),
    File(PathBuf),
}

impl AssetSource {
    /// Inline text, if this slot is inline.
    #[must_use]
    pub fn inline(&self) -> Option<&str> {
        match self {
            Self::Inline(text) => Some(text),
            Self::File(_) => None,
        }
    }

    /// File path, if this slot is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Inline(_) => None,
            Self::File(path) => Some(path),
        }
    }

    /// Whether the slot carries usable content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Inline(text) => text.trim().is_empty(),
            Self::File(path) => path.as_os_str().is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentDefinition
// ---------------------------------------------------------------------------

/// Immutable description of one component's HTML/CSS/JS content.
///
/// Constructible with any combination of slots (a CSS-only definition is
/// valid for override merging); [`ComponentDefinition::is_mountable`]
/// enforces the HTML-or-JS requirement at mount time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub key: ComponentKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<AssetSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<AssetSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js: Option<AssetSource>,
}

impl ComponentDefinition {
    /// Create a definition with no content.
    #[must_use]
    pub fn new(key: impl Into<ComponentKey>) -> Self {
        Self {
            key: key.into(),
            html: None,
            css: None,
            js: None,
        }
    }

    #[must_use]
    pub fn with_html(mut self, source: AssetSource) -> Self {
        self.html = Some(source);
        self
    }

    #[must_use]
    pub fn with_css(mut self, source: AssetSource) -> Self {
        self.css = Some(source);
        self
    }

    #[must_use]
    pub fn with_js(mut self, source: AssetSource) -> Self {
        self.js = Some(source);
        self
    }

    /// Borrow the source stored in `slot`.
    #[must_use]
    pub fn slot(&self, slot: Slot) -> Option<&AssetSource> {
        match slot {
            Slot::Html => self.html.as_ref(),
            Slot::Css => self.css.as_ref(),
            Slot::Js => self.js.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<AssetSource> {
        match slot {
            Slot::Html => &mut self.html,
            Slot::Css => &mut self.css,
            Slot::Js => &mut self.js,
        }
    }

    #[must_use]
    pub fn html_content(&self) -> Option<&str> {
        self.html.as_ref().and_then(AssetSource::inline)
    }

    #[must_use]
    pub fn css_content(&self) -> Option<&str> {
        self.css.as_ref().and_then(AssetSource::inline)
    }

    #[must_use]
    pub fn js_content(&self) -> Option<&str> {
        self.js.as_ref().and_then(AssetSource::inline)
    }

    #[must_use]
    pub fn css_url(&self) -> Option<String> {
        Self::basename(self.css.as_ref())
    }

    #[must_use]
    pub fn js_url(&self) -> Option<String> {
        Self::basename(self.js.as_ref())
    }

    fn basename(source: Option<&AssetSource>) -> Option<String> {
        source
            .and_then(AssetSource::path)
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Parent directory of every file-backed slot.
    #[must_use]
    pub fn source_paths(&self) -> BTreeMap<Slot, String> {
        Slot::ALL
            .iter()
            .filter_map(|&slot| {
                let parent = self.slot(slot)?.path()?.parent()?;
                Some((slot, parent.to_string_lossy().into_owned()))
            })
            .collect()
    }

    /// At least one of HTML or JS must carry content for the component to mount.
    #[must_use]
    pub fn is_mountable(&self) -> bool {
        let has = |s: Option<&AssetSource>| s.is_some_and(|src| !src.is_empty());
        has(self.html.as_ref()) || has(self.js.as_ref())
    }

    /// Apply a merge update, returning whether any slot changed.
    pub fn apply(&mut self, patch: &ComponentPatch) -> bool {
        let mut changed = false;
        for slot in Slot::ALL {
            if let FieldUpdate::Replace(value) = patch.field(slot) {
                let current = self.slot_mut(slot);
                if current != value {
                    current.clone_from(value);
                    changed = true;
                }
            }
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// Merge updates
// ---------------------------------------------------------------------------

/// Update of a single field: keep the existing value or replace it
/// (replacing with `None` clears the slot).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Replace(Option<T>),
}

impl<T> FieldUpdate<T> {
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// Partial update pushed into the registry; absent fields keep their value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComponentPatch {
    pub html: FieldUpdate<AssetSource>,
    pub css: FieldUpdate<AssetSource>,
    pub js: FieldUpdate<AssetSource>,
}

impl ComponentPatch {
    #[must_use]
    pub fn field(&self, slot: Slot) -> &FieldUpdate<AssetSource> {
        match slot {
            Slot::Html => &self.html,
            Slot::Css => &self.css,
            Slot::Js => &self.js,
        }
    }

    #[must_use]
    pub fn set(mut self, slot: Slot, value: Option<AssetSource>) -> Self {
        let update = FieldUpdate::Replace(value);
        match slot {
            Slot::Html => self.html = update,
            Slot::Css => self.css = update,
            Slot::Js => self.js = update,
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.html.is_keep() && self.css.is_keep() && self.js.is_keep()
    }
}
