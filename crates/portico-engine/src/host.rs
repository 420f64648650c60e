//! Component host: startup discovery, dev-mode watching, and mounting.
//!
//! ```text
//! start ──► scan installed packages ──► register manifests ──► watch (dev)
//! mount ──► lookup ──► encode data ──► widget id ──► state slots ──► enqueue
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use portico_dataplane::{EncodedPayload, Payload};
use portico_runtime::{
    ComponentChangedCallback, ComponentFileWatcher, ComponentRegistry, ManifestScanner,
    PackageIndex, RuntimeError, SiteIndex,
};
use portico_state::{ComponentOutput, EventCallback, StateBridge, StateStore};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::types::RuntimeConfig;
use crate::errors::MountError;
use crate::output::{Enqueue, LayoutHints, RenderInstruction, BIDI_COMPONENT_KIND};

/// Prefix shared by every widget id.
pub const WIDGET_ID_PREFIX: &str = "$$ID";

/// Derive the stable id of one mount.
///
/// With a user key the hash covers only the component and user key, so
/// the id survives data edits. Without one the encoded data participates
/// and the suffix is the literal `None`; the component key only ever
/// reaches the id through the hash, so any registrable key can mount.
#[must_use]
pub fn compute_widget_id(component_key: &str, user_key: Option<&str>, data_fingerprint: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(component_key.as_bytes());
    hasher.update([0u8]);
    match user_key {
        Some(user_key) => {
            hasher.update(b"key");
            hasher.update(user_key.as_bytes());
        }
        None => {
            hasher.update(b"data");
            hasher.update(data_fingerprint);
        }
    }
    let digest = format!("{:x}", hasher.finalize());
    format!(
        "{WIDGET_ID_PREFIX}-{}-{}",
        &digest[..16],
        user_key.unwrap_or("None")
    )
}

/// One call to mount a registered component.
pub struct MountRequest {
    /// Registry key of the component.
    pub component: String,
    /// Caller-chosen identity; keeps the widget id stable across data edits.
    pub key: Option<String>,
    pub data: Option<Payload>,
    /// Initial state per callback key.
    pub defaults: BTreeMap<String, Value>,
    pub callbacks: Vec<(String, EventCallback)>,
    pub layout: LayoutHints,
}

impl fmt::Debug for MountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountRequest")
            .field("component", &self.component)
            .field("key", &self.key)
            .field("data", &self.data)
            .field("defaults", &self.defaults)
            .field(
                "callbacks",
                &self.callbacks.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("layout", &self.layout)
            .finish()
    }
}

impl MountRequest {
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            key: None,
            data: None,
            defaults: BTreeMap::new(),
            callbacks: Vec::new(),
            layout: LayoutHints::default(),
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Handle state key or trigger event `name`.
    #[must_use]
    pub fn on(
        mut self,
        name: impl Into<String>,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.push((name.into(), Arc::new(callback)));
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: LayoutHints) -> Self {
        self.layout = layout;
        self
    }
}

/// Outcome of [`ComponentHost::start`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupSummary {
    /// Manifests registered successfully.
    pub manifests: usize,
    pub components: usize,
    /// Manifests discovered but rejected at registration.
    pub skipped: usize,
    pub watched_roots: usize,
}

/// Owns the registry for one host process.
///
/// Construct at host startup, call [`start`](Self::start) once, and call
/// [`shutdown`](Self::shutdown) at exit or test teardown.
pub struct ComponentHost {
    config: RuntimeConfig,
    index: Arc<dyn PackageIndex>,
    registry: Arc<ComponentRegistry>,
    watcher: Mutex<Option<ComponentFileWatcher>>,
}

impl fmt::Debug for ComponentHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHost")
            .field("config", &self.config)
            .field("watcher", &self.watcher_slot().as_ref().map(ComponentFileWatcher::watched_roots))
            .finish_non_exhaustive()
    }
}

impl ComponentHost {
    /// Host over the configured site directories.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let index = Arc::new(SiteIndex::new(config.scan.site_dirs.clone()));
        Self::with_index(config, index)
    }

    /// Host over an arbitrary package index.
    #[must_use]
    pub fn with_index(config: RuntimeConfig, index: Arc<dyn PackageIndex>) -> Self {
        Self {
            config,
            index,
            registry: Arc::new(ComponentRegistry::new()),
            watcher: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher_slot()
            .as_ref()
            .is_some_and(ComponentFileWatcher::is_watching)
    }

    fn watcher_slot(&self) -> MutexGuard<'_, Option<ComponentFileWatcher>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discover and register installed component packages, then watch their
    /// asset roots when in dev mode.
    ///
    /// A manifest that fails registration is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the registry is poisoned or the watcher
    /// cannot be set up.
    pub async fn start(&self, on_changed: ComponentChangedCallback) -> Result<StartupSummary, RuntimeError> {
        let scanner = ManifestScanner::new(Arc::clone(&self.index));
        let discovered = scanner.scan(self.config.scan.max_workers).await;

        let mut summary = StartupSummary::default();
        for found in discovered {
            match self
                .registry
                .register_from_manifest(found.manifest, &found.asset_root)
            {
                Ok(keys) => {
                    summary.manifests += 1;
                    summary.components += keys.len();
                }
                Err(e) => {
                    summary.skipped += 1;
                    tracing::warn!(
                        package = %found.package,
                        root = %found.asset_root.display(),
                        error = %e,
                        "Skipping component manifest"
                    );
                }
            }
        }

        if self.config.dev_mode {
            let watcher = ComponentFileWatcher::new(
                Arc::clone(&self.registry),
                on_changed,
                self.config.watch_options(),
            );
            summary.watched_roots = watcher.start(&self.registry.asset_roots()?)?;
            if let Some(previous) = self.watcher_slot().replace(watcher) {
                previous.stop();
            }
        }

        tracing::info!(
            manifests = summary.manifests,
            components = summary.components,
            skipped = summary.skipped,
            watched_roots = summary.watched_roots,
            dev_mode = self.config.dev_mode,
            "Component host started"
        );
        Ok(summary)
    }

    /// Stop watching and drop every registration. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry is poisoned.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        if let Some(watcher) = self.watcher_slot().take() {
            watcher.stop();
        }
        self.registry.clear()?;
        tracing::debug!("Component host shut down");
        Ok(())
    }

    /// Mount a registered component and return its current state and triggers.
    ///
    /// # Errors
    ///
    /// Returns a configuration [`MountError`] for an unknown key, a
    /// definition without content, or defaults naming no callback.
    pub fn mount(
        &self,
        request: MountRequest,
        store: &dyn StateStore,
        output: &dyn Enqueue,
    ) -> Result<ComponentOutput, MountError> {
        let MountRequest {
            component,
            key,
            data,
            defaults,
            callbacks,
            layout,
        } = request;

        let Some(definition) = self.registry.get(&component)? else {
            return Err(MountError::UnregisteredComponent { key: component });
        };
        if !definition.is_mountable() {
            return Err(MountError::MissingContent { key: component });
        }

        let data = data.as_ref().map(portico_dataplane::encode).transpose()?;
        let fingerprint = data
            .as_ref()
            .map(EncodedPayload::fingerprint_bytes)
            .unwrap_or_default();
        let widget_id = compute_widget_id(&component, key.as_deref(), &fingerprint);

        let bridge = StateBridge::new(widget_id.clone(), callbacks, defaults)?;
        let result = bridge.register(store)?;

        tracing::debug!(
            component = %component,
            widget_id = %widget_id,
            data = data.as_ref().map(EncodedPayload::kind),
            "Mounting component"
        );
        let instruction = RenderInstruction {
            component_name: component,
            widget_id,
            html: definition.html_content().map(str::to_owned),
            css_content: definition.css_content().map(str::to_owned),
            css_url: definition.css_url(),
            js_content: definition.js_content().map(str::to_owned),
            js_url: definition.js_url(),
            data,
            state_defaults: bridge.defaults().clone(),
        };
        output.enqueue(BIDI_COMPONENT_KIND, instruction, layout);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferedOutput;
    use portico_state::MemoryStateStore;
    use portico_types::ErrorCategory;
    use serde_json::json;

    fn host_with(key: &str, html: Option<&str>, js: Option<&str>) -> ComponentHost {
        let host = ComponentHost::new(RuntimeConfig::default());
        host.registry()
            .register_sources(key, html, None, js)
            .unwrap();
        host
    }

    #[test]
    fn widget_id_has_expected_shape() {
        let id = compute_widget_id("acme.chart", None, b"payload");
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "$$ID");
        assert_eq!(parts[1].len(), 16);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], "None");
        assert_ne!(id, compute_widget_id("acme.table", None, b"payload"));
    }

    #[test]
    fn user_key_pins_widget_id_across_data() {
        let a = compute_widget_id("acme.chart", Some("main"), b"one");
        let b = compute_widget_id("acme.chart", Some("main"), b"two");
        assert_eq!(a, b);
        assert!(a.ends_with("-main"));

        let c = compute_widget_id("acme.chart", None, b"one");
        let d = compute_widget_id("acme.chart", None, b"two");
        assert_ne!(c, d);
        assert_ne!(
            compute_widget_id("acme.chart", Some("main"), b""),
            compute_widget_id("acme.table", Some("main"), b"")
        );
    }

    #[test]
    fn mount_enqueues_bidi_component() {
        let host = host_with("acme.chart", Some("<div class='c'></div>"), None);
        let store = MemoryStateStore::new();
        let output = BufferedOutput::new();

        let request = MountRequest::new("acme.chart")
            .with_data(json!({"points": [1, 2, 3]}))
            .with_default("color", "red")
            .on("color", |_| {});
        let result = host.mount(request, &store, &output).unwrap();
        assert_eq!(result.state["color"], json!("red"));

        let elements = output.elements();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, BIDI_COMPONENT_KIND);
        let instruction = &elements[0].instruction;
        assert_eq!(instruction.component_name, "acme.chart");
        assert_eq!(instruction.html.as_deref(), Some("<div class='c'></div>"));
        assert_eq!(instruction.state_defaults["color"], json!("red"));
        assert!(matches!(instruction.data, Some(EncodedPayload::Json(_))));
    }

    #[test]
    fn unregistered_component_is_config_error() {
        let host = ComponentHost::new(RuntimeConfig::default());
        let err = host
            .mount(
                MountRequest::new("acme.missing"),
                &MemoryStateStore::new(),
                &BufferedOutput::new(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "component 'acme.missing' is not registered");
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn component_without_content_rejected() {
        let host = host_with("acme.empty", Some(""), None);
        let output = BufferedOutput::new();
        let err = host
            .mount(MountRequest::new("acme.empty"), &MemoryStateStore::new(), &output)
            .unwrap_err();
        assert!(matches!(err, MountError::MissingContent { ref key } if key == "acme.empty"));
        assert!(output.is_empty());
    }

    #[test]
    fn default_without_callback_rejected_before_enqueue() {
        let host = host_with("acme.chart", Some("<div></div>"), None);
        let output = BufferedOutput::new();
        let request = MountRequest::new("acme.chart")
            .with_default("colour", "red")
            .on("color", |_| {});
        let err = host
            .mount(request, &MemoryStateStore::new(), &output)
            .unwrap_err();
        assert!(err.to_string().contains("available callback keys: [color]"));
        assert!(output.is_empty());
    }

    #[test]
    fn delimiter_in_user_key_rejected() {
        let host = host_with("acme.chart", Some("<div></div>"), None);
        let err = host
            .mount(
                MountRequest::new("acme.chart").with_key("a__b"),
                &MemoryStateStore::new(),
                &BufferedOutput::new(),
            )
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn delimiter_in_component_key_still_mounts() {
        let host = host_with("my__chart", Some("<div></div>"), None);
        let output = BufferedOutput::new();
        host.mount(
            MountRequest::new("my__chart"),
            &MemoryStateStore::new(),
            &output,
        )
        .unwrap();

        let elements = output.drain();
        let widget_id = &elements[0].instruction.widget_id;
        assert!(widget_id.ends_with("-None"));
        assert!(!widget_id.contains("__"));
        assert_eq!(elements[0].instruction.component_name, "my__chart");
    }

    #[test]
    fn shutdown_clears_registry_and_is_repeatable() {
        let host = host_with("acme.chart", Some("<div></div>"), None);
        host.shutdown().unwrap();
        host.shutdown().unwrap();
        assert!(host.registry().is_empty().unwrap());
        assert!(!host.is_watching());
    }
}
