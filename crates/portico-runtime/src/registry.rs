//! Thread-safe component registry.
//!
//! One `Mutex` guards every lookup and mutation. Sandbox resolution runs
//! before the lock is taken so no file I/O happens inside a critical section.
//!
//! The registry is an explicitly owned value: the host creates it at startup
//! (usually behind an `Arc`), shares it with the watcher, and calls
//! [`ComponentRegistry::clear`] at shutdown or test teardown.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use portico_types::{
    AssetSource, ComponentDefinition, ComponentKey, ComponentPatch, GlobWatchRecord,
    PackageManifest, SecurityRequirements, Slot,
};

use crate::error::{Result, RuntimeError};
use crate::sandbox::{self, AssetClass, SandboxError};

/// Where a definition came from. Manifest re-registration is expected on
/// re-scan and stays silent; runtime overwrites are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOrigin {
    Runtime,
    Manifest,
}

#[derive(Debug, Clone)]
struct Entry {
    definition: ComponentDefinition,
    origin: RegistrationOrigin,
}

#[derive(Debug, Default)]
struct Inner {
    components: HashMap<ComponentKey, Entry>,
    security: HashMap<String, SecurityRequirements>,
    metadata: HashMap<ComponentKey, Arc<PackageManifest>>,
    glob_records: HashMap<ComponentKey, GlobWatchRecord>,
    asset_roots: HashMap<ComponentKey, PathBuf>,
}

/// Keyed store of component definitions plus manifest provenance.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    inner: Mutex<Inner>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)
    }

    /// Insert or overwrite a runtime-registered definition.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn register(&self, definition: ComponentDefinition) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.components.get(&definition.key) {
            if existing.definition != definition {
                tracing::warn!(
                    component = %definition.key,
                    "Component already registered; overwriting with a different definition"
                );
            }
        }
        // A runtime registration replaces any manifest provenance for the key.
        inner.metadata.remove(&definition.key);
        inner.glob_records.remove(&definition.key);
        inner.asset_roots.remove(&definition.key);
        inner.components.insert(
            definition.key.clone(),
            Entry {
                definition,
                origin: RegistrationOrigin::Runtime,
            },
        );
        Ok(())
    }

    /// Classify raw slot values and register the resulting definition.
    ///
    /// Each value may be inline text or a path to an existing asset file.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidSource`] naming the slot when a value
    /// looks like a file reference that cannot be used.
    pub fn register_sources(
        &self,
        key: impl Into<ComponentKey>,
        html: Option<&str>,
        css: Option<&str>,
        js: Option<&str>,
    ) -> Result<ComponentDefinition> {
        let key = key.into();
        let mut definition = ComponentDefinition::new(key.clone());
        for (slot, raw) in [(Slot::Html, html), (Slot::Css, css), (Slot::Js, js)] {
            let Some(raw) = raw else { continue };
            let source = match sandbox::classify_asset(raw) {
                AssetClass::Inline(text) => AssetSource::Inline(text),
                AssetClass::Path(path) => AssetSource::File(path),
                AssetClass::Invalid(reason) => {
                    return Err(RuntimeError::InvalidSource {
                        key,
                        slot,
                        reason,
                    })
                }
            };
            definition = match slot {
                Slot::Html => definition.with_html(source),
                Slot::Css => definition.with_css(source),
                Slot::Js => definition.with_js(source),
            };
        }
        self.register(definition.clone())?;
        Ok(definition)
    }

    /// Register every component declared by `manifest`, resolving `js`/`css`
    /// entries inside `asset_root`.
    ///
    /// Resolution is all-or-nothing: if any entry fails the sandbox, nothing
    /// from this manifest is inserted and the error propagates unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Sandbox`] for the first entry that fails to
    /// resolve.
    pub fn register_from_manifest(
        &self,
        manifest: PackageManifest,
        asset_root: &Path,
    ) -> Result<Vec<ComponentKey>> {
        let root = asset_root
            .canonicalize()
            .map_err(|source| SandboxError::Root {
                root: asset_root.to_path_buf(),
                source,
            })?;
        let manifest = Arc::new(manifest);

        let mut resolved = Vec::with_capacity(manifest.components.len());
        for descriptor in &manifest.components {
            let key = manifest.component_key(descriptor);
            let mut definition = ComponentDefinition::new(key.clone());
            if let Some(html) = &descriptor.html {
                definition = definition.with_html(AssetSource::Inline(html.clone()));
            }
            if let Some(css) = &descriptor.css {
                definition = definition.with_css(AssetSource::File(sandbox::resolve(css, &root)?));
            }
            if let Some(js) = &descriptor.js {
                definition = definition.with_js(AssetSource::File(sandbox::resolve(js, &root)?));
            }

            let js_pattern = descriptor.js.clone().filter(|p| sandbox::is_glob(p));
            let css_pattern = descriptor.css.clone().filter(|p| sandbox::is_glob(p));
            let record = (js_pattern.is_some() || css_pattern.is_some()).then(|| GlobWatchRecord {
                key: key.clone(),
                js_pattern,
                css_pattern,
                manifest: Arc::clone(&manifest),
                asset_root: root.clone(),
            });
            resolved.push((definition, record));
        }

        let mut inner = self.lock()?;
        inner
            .security
            .insert(manifest.name.clone(), manifest.security.clone());

        let mut keys = Vec::with_capacity(resolved.len());
        for (definition, record) in resolved {
            let key = definition.key.clone();
            inner.metadata.insert(key.clone(), Arc::clone(&manifest));
            inner.asset_roots.insert(key.clone(), root.clone());
            match record {
                Some(record) => {
                    inner.glob_records.insert(key.clone(), record);
                }
                None => {
                    inner.glob_records.remove(&key);
                }
            }
            inner.components.insert(
                key.clone(),
                Entry {
                    definition,
                    origin: RegistrationOrigin::Manifest,
                },
            );
            keys.push(key);
        }

        tracing::debug!(
            package = manifest.name,
            version = manifest.version,
            components = keys.len(),
            asset_root = %root.display(),
            "Registered components from manifest"
        );
        Ok(keys)
    }

    /// Look up a definition.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn get(&self, key: &str) -> Result<Option<ComponentDefinition>> {
        Ok(self
            .lock()?
            .components
            .get(key)
            .map(|entry| entry.definition.clone()))
    }

    /// Origin of a registered key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn origin(&self, key: &str) -> Result<Option<RegistrationOrigin>> {
        Ok(self.lock()?.components.get(key).map(|entry| entry.origin))
    }

    /// Remove a key together with its provenance and glob record.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn unregister(&self, key: &str) -> Result<Option<ComponentDefinition>> {
        let mut inner = self.lock()?;
        inner.metadata.remove(key);
        inner.glob_records.remove(key);
        inner.asset_roots.remove(key);
        Ok(inner.components.remove(key).map(|entry| entry.definition))
    }

    /// Drop everything, including security requirements.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        *self.lock()? = Inner::default();
        Ok(())
    }

    /// Directory hot reload should watch for a file-backed component:
    /// the parent of its `js` file, else of its `css` file.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn get_component_path(&self, key: &str) -> Result<Option<String>> {
        let Some(definition) = self.get(key)? else {
            return Ok(None);
        };
        let mut paths = definition.source_paths();
        Ok(paths.remove(&Slot::Js).or_else(|| paths.remove(&Slot::Css)))
    }

    /// Merge `patch` into an existing definition.
    ///
    /// Returns `true` if the stored definition changed; unknown keys are a
    /// no-op returning `false`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn update_component(&self, key: &str, patch: &ComponentPatch) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(entry) = inner.components.get_mut(key) else {
            tracing::debug!(component = key, "Ignoring update for unregistered component");
            return Ok(false);
        };
        Ok(entry.definition.apply(patch))
    }

    /// Security requirements for a package name or a component key
    /// belonging to a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn get_security_requirements(&self, name: &str) -> Result<Option<SecurityRequirements>> {
        let inner = self.lock()?;
        let package = inner
            .metadata
            .get(name)
            .map_or(name, |manifest| manifest.name.as_str());
        Ok(inner.security.get(package).cloned())
    }

    /// Manifest a component key was registered from.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn get_metadata(&self, key: &str) -> Result<Option<Arc<PackageManifest>>> {
        Ok(self.lock()?.metadata.get(key).cloned())
    }

    /// Every glob watch record, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn glob_watch_records(&self) -> Result<Vec<GlobWatchRecord>> {
        let mut records: Vec<_> = self.lock()?.glob_records.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    /// Glob watch records whose asset root is `root`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn glob_watch_records_for_root(&self, root: &Path) -> Result<Vec<GlobWatchRecord>> {
        let mut records = self.glob_watch_records()?;
        records.retain(|record| record.asset_root == root);
        Ok(records)
    }

    /// Distinct asset roots of manifest-registered components.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn asset_roots(&self) -> Result<Vec<PathBuf>> {
        let roots: BTreeSet<PathBuf> = self.lock()?.asset_roots.values().cloned().collect();
        Ok(roots.into_iter().collect())
    }

    /// Registered keys in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn keys(&self) -> Result<Vec<ComponentKey>> {
        let mut keys: Vec<_> = self.lock()?.components.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.components.len())
    }

    /// # Errors
    ///
    /// Returns [`RuntimeError::LockPoisoned`] if the registry lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_types::ComponentDescriptor;
    use std::fs;

    fn package_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/index-1a2b.js"), "export default 1").unwrap();
        fs::write(dir.path().join("dist/style.css"), "a{}").unwrap();
        fs::write(dir.path().join("gauge.js"), "export default 2").unwrap();
        dir
    }

    fn manifest() -> PackageManifest {
        let mut security = SecurityRequirements::new();
        security.insert("network".into(), serde_json::json!("none"));
        PackageManifest {
            name: "acme".into(),
            version: "1.0.0".into(),
            components: vec![
                ComponentDescriptor {
                    name: "spark".into(),
                    html: Some("<div></div>".into()),
                    css: Some("dist/style.css".into()),
                    js: Some("dist/index-*.js".into()),
                },
                ComponentDescriptor {
                    name: "gauge".into(),
                    html: None,
                    css: None,
                    js: Some("gauge.js".into()),
                },
            ],
            security,
        }
    }

    #[test]
    fn register_and_get() {
        let registry = ComponentRegistry::new();
        let def = ComponentDefinition::new("inline")
            .with_js(AssetSource::Inline("export default () => {}".into()));
        registry.register(def.clone()).unwrap();
        assert_eq!(registry.get("inline").unwrap(), Some(def));
        assert_eq!(registry.origin("inline").unwrap(), Some(RegistrationOrigin::Runtime));
        assert_eq!(registry.get("missing").unwrap(), None);
    }

    #[test]
    fn overwrite_replaces_definition() {
        let registry = ComponentRegistry::new();
        registry
            .register(ComponentDefinition::new("c").with_html(AssetSource::Inline("a".into())))
            .unwrap();
        let second = ComponentDefinition::new("c").with_html(AssetSource::Inline("b".into()));
        registry.register(second.clone()).unwrap();
        assert_eq!(registry.get("c").unwrap(), Some(second));
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn registering_same_definition_twice_is_idempotent() {
        let registry = ComponentRegistry::new();
        let def = ComponentDefinition::new("c")
            .with_html(AssetSource::Inline("<p></p>".into()))
            .with_js(AssetSource::Inline("export default 1".into()));
        registry.register(def.clone()).unwrap();
        registry.register(def.clone()).unwrap();

        assert_eq!(registry.get("c").unwrap(), Some(def));
        assert_eq!(registry.keys().unwrap(), vec![ComponentKey::new("c")]);
        assert_eq!(registry.origin("c").unwrap(), Some(RegistrationOrigin::Runtime));
        assert!(registry.get_metadata("c").unwrap().is_none());
        assert!(registry.glob_watch_records().unwrap().is_empty());
        assert!(registry.asset_roots().unwrap().is_empty());
    }

    #[test]
    fn rescanning_same_manifest_is_stable() {
        let dir = package_dir();
        let registry = ComponentRegistry::new();
        let first_keys = registry.register_from_manifest(manifest(), dir.path()).unwrap();
        let keys = registry.keys().unwrap();
        let records = registry.glob_watch_records().unwrap();
        let roots = registry.asset_roots().unwrap();
        let spark = registry.get("acme.spark").unwrap();
        let metadata = registry.get_metadata("acme.spark").unwrap();
        let security = registry.get_security_requirements("acme").unwrap();

        let second_keys = registry.register_from_manifest(manifest(), dir.path()).unwrap();
        assert_eq!(first_keys, second_keys);
        assert_eq!(registry.keys().unwrap(), keys);
        assert_eq!(registry.len().unwrap(), 2);
        assert_eq!(registry.glob_watch_records().unwrap(), records);
        assert_eq!(registry.asset_roots().unwrap(), roots);
        assert_eq!(registry.get("acme.spark").unwrap(), spark);
        assert_eq!(registry.get_metadata("acme.spark").unwrap(), metadata);
        assert_eq!(registry.get_security_requirements("acme").unwrap(), security);
    }

    #[test]
    fn register_sources_classifies_each_slot() {
        let dir = package_dir();
        let js_path = dir.path().join("gauge.js");
        let registry = ComponentRegistry::new();
        let def = registry
            .register_sources(
                "mixed",
                Some("<p>hello</p>"),
                Some("p { color: red; }"),
                Some(js_path.to_str().unwrap()),
            )
            .unwrap();
        assert_eq!(def.html_content(), Some("<p>hello</p>"));
        assert_eq!(def.css_content(), Some("p { color: red; }"));
        assert_eq!(def.js_url().as_deref(), Some("gauge.js"));

        let err = registry
            .register_sources("broken", None, None, Some("missing/file.js"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidSource { slot: Slot::Js, .. }));
        assert!(registry.get("broken").unwrap().is_none());
    }

    #[test]
    fn manifest_registration_resolves_paths_and_records_globs() {
        let dir = package_dir();
        let registry = ComponentRegistry::new();
        let keys = registry.register_from_manifest(manifest(), dir.path()).unwrap();
        assert_eq!(keys.len(), 2);

        let spark = registry.get("acme.spark").unwrap().unwrap();
        assert_eq!(spark.html_content(), Some("<div></div>"));
        assert_eq!(spark.js_url().as_deref(), Some("index-1a2b.js"));
        assert_eq!(spark.css_url().as_deref(), Some("style.css"));
        assert_eq!(
            registry.origin("acme.spark").unwrap(),
            Some(RegistrationOrigin::Manifest)
        );

        let records = registry.glob_watch_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key.as_str(), "acme.spark");
        assert_eq!(records[0].js_pattern.as_deref(), Some("dist/index-*.js"));
        assert_eq!(records[0].css_pattern, None);

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(registry.glob_watch_records_for_root(&root).unwrap().len(), 1);
        assert!(registry.asset_roots().unwrap().contains(&root));
    }

    #[test]
    fn manifest_registration_is_all_or_nothing() {
        let dir = package_dir();
        let mut bad = manifest();
        bad.components[1].js = Some("../escape.js".into());
        let registry = ComponentRegistry::new();
        let err = registry.register_from_manifest(bad, dir.path()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Sandbox(SandboxError::Traversal { .. })
        ));
        assert!(registry.is_empty().unwrap());
        assert!(registry.get_security_requirements("acme").unwrap().is_none());
    }

    #[test]
    fn security_and_metadata_lookup() {
        let dir = package_dir();
        let registry = ComponentRegistry::new();
        registry.register_from_manifest(manifest(), dir.path()).unwrap();

        let by_package = registry.get_security_requirements("acme").unwrap().unwrap();
        let by_key = registry
            .get_security_requirements("acme.gauge")
            .unwrap()
            .unwrap();
        assert_eq!(by_package, by_key);
        assert_eq!(by_key["network"], serde_json::json!("none"));

        let meta = registry.get_metadata("acme.spark").unwrap().unwrap();
        assert_eq!(meta.name, "acme");
        assert_eq!(meta.version, "1.0.0");
        assert!(registry.get_metadata("acme").unwrap().is_none());
    }

    #[test]
    fn component_path_prefers_js() {
        let dir = package_dir();
        let registry = ComponentRegistry::new();
        registry.register_from_manifest(manifest(), dir.path()).unwrap();

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(
            registry.get_component_path("acme.spark").unwrap(),
            Some(root.join("dist").to_string_lossy().into_owned())
        );
        assert_eq!(
            registry.get_component_path("acme.gauge").unwrap(),
            Some(root.to_string_lossy().into_owned())
        );

        registry
            .register(ComponentDefinition::new("inline").with_js(AssetSource::Inline("x".into())))
            .unwrap();
        assert_eq!(registry.get_component_path("inline").unwrap(), None);
        assert_eq!(registry.get_component_path("missing").unwrap(), None);
    }

    #[test]
    fn update_merges_fields() {
        let dir = package_dir();
        let registry = ComponentRegistry::new();
        registry.register_from_manifest(manifest(), dir.path()).unwrap();

        let new_js = dir.path().join("gauge.js").canonicalize().unwrap();
        let patch = ComponentPatch::default().set(Slot::Js, Some(AssetSource::File(new_js)));
        assert!(registry.update_component("acme.spark", &patch).unwrap());

        let spark = registry.get("acme.spark").unwrap().unwrap();
        assert_eq!(spark.js_url().as_deref(), Some("gauge.js"));
        assert_eq!(spark.css_url().as_deref(), Some("style.css"));
        assert_eq!(spark.html_content(), Some("<div></div>"));

        assert!(!registry.update_component("acme.spark", &patch).unwrap());
        assert!(!registry.update_component("nope", &patch).unwrap());
    }

    #[test]
    fn unregister_and_clear() {
        let dir = package_dir();
        let registry = ComponentRegistry::new();
        registry.register_from_manifest(manifest(), dir.path()).unwrap();

        assert!(registry.unregister("acme.spark").unwrap().is_some());
        assert!(registry.get_metadata("acme.spark").unwrap().is_none());
        assert!(registry.glob_watch_records().unwrap().is_empty());
        assert_eq!(registry.keys().unwrap(), vec![ComponentKey::new("acme.gauge")]);

        registry.clear().unwrap();
        assert!(registry.is_empty().unwrap());
        assert!(registry.get_security_requirements("acme").unwrap().is_none());
    }

    #[test]
    fn concurrent_registration() {
        let registry = Arc::new(ComponentRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let def = ComponentDefinition::new(format!("c{i}"))
                        .with_html(AssetSource::Inline(format!("<p>{i}</p>")));
                    registry.register(def).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len().unwrap(), 8);
    }
}
