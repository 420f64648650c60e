//! Manifest discovery across installed packages.
//!
//! Enumeration is cheap and happens once. An early name filter drops
//! unrelated packages before any file I/O, then surviving candidates are
//! inspected on a bounded pool of blocking workers. A failure inside one
//! package is logged and treated as "no manifest"; it never aborts the scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use portico_types::{ManifestDocument, PackageManifest, MANIFEST_FILE_NAME};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Result, RuntimeError};
use crate::packages::{normalize_name, InstalledPackage, PackageIndex};

/// Ecosystem name matched against package name, summary and requirements.
pub const ECOSYSTEM_NAME: &str = "portico";

/// Conventional naming prefixes for component packages.
pub const CANDIDATE_PREFIXES: [&str; 4] = ["portico-", "portico_", "ptc-", "ptc_"];

/// Hard ceiling on scan workers regardless of the requested count.
pub const MAX_SCAN_WORKERS: usize = 16;

/// Where a discovered manifest was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSource {
    /// Read through the index from the package's own metadata.
    Embedded,
    /// Listed in the package's recorded file manifest.
    Record,
    /// Found next to the importable module, or in its immediate parent.
    ModuleDir,
}

/// A component manifest paired with the root its assets resolve against.
#[derive(Debug, Clone)]
pub struct DiscoveredManifest {
    /// Distribution that owns the manifest.
    pub package: String,
    pub manifest: PackageManifest,
    pub asset_root: PathBuf,
    pub source: ManifestSource,
}

/// Early filter: does this package plausibly ship portico components?
#[must_use]
pub fn is_candidate(package: &InstalledPackage) -> bool {
    let name = package.name.to_ascii_lowercase();
    if CANDIDATE_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return true;
    }
    let mentions = |text: &str| text.to_ascii_lowercase().contains(ECOSYSTEM_NAME);
    mentions(&name)
        || package.summary.as_deref().is_some_and(mentions)
        || package.requires.iter().any(|req| mentions(req))
}

/// Worker count for a scan over `candidates` packages.
#[must_use]
pub fn effective_workers(requested: Option<usize>, candidates: usize) -> usize {
    let default = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    requested
        .unwrap_or(default)
        .min(candidates)
        .min(MAX_SCAN_WORKERS)
        .max(1)
}

/// Discovers component manifests through a [`PackageIndex`].
#[derive(Clone)]
pub struct ManifestScanner {
    index: Arc<dyn PackageIndex>,
}

impl std::fmt::Debug for ManifestScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestScanner").finish_non_exhaustive()
    }
}

impl ManifestScanner {
    #[must_use]
    pub fn new(index: Arc<dyn PackageIndex>) -> Self {
        Self { index }
    }

    /// Installed packages that pass the early filter.
    #[must_use]
    pub fn candidates(&self) -> Vec<InstalledPackage> {
        self.index.packages().into_iter().filter(is_candidate).collect()
    }

    /// Scan every candidate package.
    ///
    /// Results arrive in completion order, which is not deterministic.
    pub async fn scan(&self, max_workers: Option<usize>) -> Vec<DiscoveredManifest> {
        let started = Instant::now();
        let candidates = self.candidates();
        if candidates.is_empty() {
            tracing::info!("No candidate component packages installed");
            return Vec::new();
        }

        let workers = effective_workers(max_workers, candidates.len());
        let semaphore = Arc::new(Semaphore::new(workers));
        let candidate_count = candidates.len();
        tracing::debug!(candidates = candidate_count, workers, "Scanning packages for manifests");

        let mut join_set = JoinSet::new();
        for package in candidates {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                tracing::warn!("Scan semaphore closed; remaining packages skipped");
                break;
            };
            let index = Arc::clone(&self.index);
            join_set.spawn(async move {
                let _permit = permit;
                let name = package.name.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || scan_package(index.as_ref(), &package))
                        .await;
                (name, outcome)
            });
        }

        let mut discovered = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(Ok(Some(found))))) => discovered.push(found),
                Ok((_, Ok(Ok(None)))) => {}
                Ok((package, Ok(Err(e)))) => {
                    tracing::warn!(package, error = %e, "Manifest discovery failed; skipping package");
                }
                Ok((package, Err(join_err))) => {
                    tracing::warn!(package, error = %join_err, "Manifest discovery task panicked; skipping package");
                }
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "Manifest discovery task join error");
                }
            }
        }

        tracing::info!(
            candidates = candidate_count,
            manifests = discovered.len(),
            workers,
            duration_ms = started.elapsed().as_millis(),
            "Component manifest scan complete"
        );
        discovered
    }
}

/// Locate, verify and parse the manifest of one package.
///
/// Lookup order: embedded metadata, recorded files (shallowest first), then
/// each module directory and its immediate parent. The first manifest that
/// belongs to the package decides; if it lacks the component section the
/// package is skipped with `Ok(None)`.
///
/// # Errors
///
/// Returns an error when a candidate manifest cannot be read or parsed, or
/// when the owning manifest's component section is invalid.
pub fn scan_package(
    index: &dyn PackageIndex,
    package: &InstalledPackage,
) -> Result<Option<DiscoveredManifest>> {
    let owner = Ownership::new(index, package);
    let module_dirs = index.module_dirs(package);

    if let Some(text) = index.embedded_manifest(package) {
        let location = format!("embedded in {}", package.name);
        let text = text.map_err(|source| RuntimeError::ManifestRead { location, source })?;
        let doc = ManifestDocument::from_toml_str(&text)?;
        match module_dirs.first() {
            Some(root) if owner.owns(&doc) => {
                return finish(package, doc, root, ManifestSource::Embedded);
            }
            Some(_) => tracing::debug!(package = package.name, "Embedded manifest names another project"),
            None => tracing::debug!(package = package.name, "Embedded manifest without a module directory"),
        }
    }

    if let Some(files) = index.recorded_files(package) {
        let mut manifests: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| path.file_name().is_some_and(|n| n == MANIFEST_FILE_NAME))
            .collect();
        manifests.sort_by_key(|path| path.components().count());

        for path in manifests {
            if let Some(doc) = owner.read_owned(&path)? {
                let Some(root) = path.parent() else { continue };
                return finish(package, doc, root, ManifestSource::Record);
            }
        }
    }

    for module_dir in &module_dirs {
        let search = std::iter::once(module_dir.as_path()).chain(module_dir.parent());
        for dir in search {
            if let Some(doc) = owner.read_owned(&dir.join(MANIFEST_FILE_NAME))? {
                return finish(package, doc, dir, ManifestSource::ModuleDir);
            }
        }
    }

    Ok(None)
}

fn finish(
    package: &InstalledPackage,
    doc: ManifestDocument,
    root: &Path,
    source: ManifestSource,
) -> Result<Option<DiscoveredManifest>> {
    let Some(manifest) = doc.into_component_manifest()? else {
        tracing::debug!(package = package.name, "Manifest has no component section; skipping");
        return Ok(None);
    };
    Ok(Some(DiscoveredManifest {
        package: package.name.clone(),
        manifest,
        asset_root: root.to_path_buf(),
        source,
    }))
}

/// Names a manifest's project must match to belong to the package.
struct Ownership {
    dist: String,
    modules: Vec<String>,
}

impl Ownership {
    fn new(index: &dyn PackageIndex, package: &InstalledPackage) -> Self {
        Self {
            dist: package.normalized_name(),
            modules: index
                .module_names(package)
                .iter()
                .map(|m| normalize_name(m))
                .collect(),
        }
    }

    fn owns(&self, doc: &ManifestDocument) -> bool {
        match doc.project_name() {
            Some(name) => {
                let name = normalize_name(name);
                name == self.dist || self.modules.contains(&name)
            }
            None => doc.has_component_section(),
        }
    }

    /// Parse `path` if it exists and belongs to this package.
    fn read_owned(&self, path: &Path) -> Result<Option<ManifestDocument>> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::ManifestRead {
            location: path.display().to_string(),
            source,
        })?;
        let doc = ManifestDocument::from_toml_str(&text)?;
        if self.owns(&doc) {
            Ok(Some(doc))
        } else {
            tracing::debug!(path = %path.display(), "Manifest belongs to another project");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn package(name: &str, site: &Path) -> InstalledPackage {
        InstalledPackage {
            name: name.into(),
            version: "1.0".into(),
            summary: None,
            requires: Vec::new(),
            site_dir: site.to_path_buf(),
            metadata_dir: None,
        }
    }

    /// Index over an in-memory package list with fixed module names.
    struct FixedIndex {
        packages: Vec<InstalledPackage>,
        records: Option<Vec<PathBuf>>,
        embedded: Option<String>,
    }

    impl PackageIndex for FixedIndex {
        fn packages(&self) -> Vec<InstalledPackage> {
            self.packages.clone()
        }

        fn recorded_files(&self, _package: &InstalledPackage) -> Option<Vec<PathBuf>> {
            self.records.clone()
        }

        fn module_names(&self, package: &InstalledPackage) -> Vec<String> {
            vec![package.normalized_name()]
        }

        fn embedded_manifest(&self, _package: &InstalledPackage) -> Option<std::io::Result<String>> {
            self.embedded.clone().map(Ok)
        }
    }

    fn component_manifest(project: &str, name: &str) -> String {
        format!(
            "[project]\nname = \"{project}\"\n\n[tool.portico.component]\nname = \"{name}\"\nversion = \"1.0\"\n\n[[tool.portico.component.components]]\nname = \"w\"\nhtml = \"<b/>\"\n"
        )
    }

    #[test]
    fn early_filter_matches_name_summary_requires_and_prefix() {
        let site = Path::new("/site");
        assert!(is_candidate(&package("portico-charts", site)));
        assert!(is_candidate(&package("ptc_maps", site)));
        assert!(is_candidate(&package("AcmePortico", site)));

        let mut by_summary = package("charts", site);
        by_summary.summary = Some("Charts for Portico apps".into());
        assert!(is_candidate(&by_summary));

        let mut by_requires = package("charts", site);
        by_requires.requires = vec!["portico>=1.0".into()];
        assert!(is_candidate(&by_requires));

        assert!(!is_candidate(&package("requests", site)));
        assert!(!is_candidate(&package("ptcx", site)));
    }

    #[test]
    fn worker_count_is_bounded() {
        assert_eq!(effective_workers(Some(4), 10), 4);
        assert_eq!(effective_workers(Some(64), 100), MAX_SCAN_WORKERS);
        assert_eq!(effective_workers(Some(8), 3), 3);
        assert_eq!(effective_workers(Some(0), 3), 1);
        assert_eq!(effective_workers(None, 1), 1);
        assert!(effective_workers(None, 100) <= MAX_SCAN_WORKERS);
    }

    #[test]
    fn module_dir_manifest_is_found() {
        let site = tempfile::tempdir().unwrap();
        let module = site.path().join("portico_charts");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join(MANIFEST_FILE_NAME), component_manifest("portico-charts", "charts")).unwrap();

        let pkg = package("portico-charts", site.path());
        let index = FixedIndex { packages: vec![pkg.clone()], records: None, embedded: None };
        let found = scan_package(&index, &pkg).unwrap().unwrap();
        assert_eq!(found.manifest.name, "charts");
        assert_eq!(found.asset_root, module);
        assert_eq!(found.source, ManifestSource::ModuleDir);
    }

    #[test]
    fn parent_of_module_dir_checked_but_not_further() {
        let site = tempfile::tempdir().unwrap();
        let project = site.path().join("project");
        let module = project.join("portico_charts");
        fs::create_dir_all(&module).unwrap();
        fs::write(project.join(MANIFEST_FILE_NAME), component_manifest("portico_charts", "charts")).unwrap();
        // An ancestor two levels up must never be claimed.
        fs::write(site.path().join(MANIFEST_FILE_NAME), component_manifest("portico_charts", "wrong")).unwrap();

        let pkg = package("portico-charts", &project);
        let index = FixedIndex { packages: vec![pkg.clone()], records: None, embedded: None };
        let found = scan_package(&index, &pkg).unwrap().unwrap();
        assert_eq!(found.manifest.name, "charts");
        assert_eq!(found.asset_root, project);

        fs::remove_file(project.join(MANIFEST_FILE_NAME)).unwrap();
        assert!(scan_package(&index, &pkg).unwrap().is_none());
    }

    #[test]
    fn foreign_project_manifest_is_not_claimed() {
        let site = tempfile::tempdir().unwrap();
        let module = site.path().join("portico_charts");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join(MANIFEST_FILE_NAME), component_manifest("someone-else", "x")).unwrap();

        let pkg = package("portico-charts", site.path());
        let index = FixedIndex { packages: vec![pkg.clone()], records: None, embedded: None };
        assert!(scan_package(&index, &pkg).unwrap().is_none());
    }

    #[test]
    fn nameless_document_needs_marker() {
        let site = tempfile::tempdir().unwrap();
        let module = site.path().join("portico_charts");
        fs::create_dir_all(&module).unwrap();
        fs::write(
            module.join(MANIFEST_FILE_NAME),
            "[tool.portico.component]\nname = \"anon\"\nversion = \"0.1\"\n",
        )
        .unwrap();

        let pkg = package("portico-charts", site.path());
        let index = FixedIndex { packages: vec![pkg.clone()], records: None, embedded: None };
        assert_eq!(scan_package(&index, &pkg).unwrap().unwrap().manifest.name, "anon");

        fs::write(module.join(MANIFEST_FILE_NAME), "[tool.other]\nx = 1\n").unwrap();
        assert!(scan_package(&index, &pkg).unwrap().is_none());
    }

    #[test]
    fn owned_document_without_marker_is_skipped() {
        let site = tempfile::tempdir().unwrap();
        let module = site.path().join("portico_charts");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join(MANIFEST_FILE_NAME), "[project]\nname = \"portico-charts\"\n").unwrap();

        let pkg = package("portico-charts", site.path());
        let index = FixedIndex { packages: vec![pkg.clone()], records: None, embedded: None };
        assert!(scan_package(&index, &pkg).unwrap().is_none());
    }

    #[test]
    fn recorded_manifests_checked_shallowest_first() {
        let site = tempfile::tempdir().unwrap();
        let shallow = site.path().join("portico_charts");
        let deep = shallow.join("vendor").join("nested");
        fs::create_dir_all(&deep).unwrap();
        fs::write(shallow.join(MANIFEST_FILE_NAME), component_manifest("portico-charts", "shallow")).unwrap();
        fs::write(deep.join(MANIFEST_FILE_NAME), component_manifest("portico-charts", "deep")).unwrap();

        let pkg = package("portico-charts", site.path());
        let index = FixedIndex {
            packages: vec![pkg.clone()],
            records: Some(vec![deep.join(MANIFEST_FILE_NAME), shallow.join(MANIFEST_FILE_NAME)]),
            embedded: None,
        };
        let found = scan_package(&index, &pkg).unwrap().unwrap();
        assert_eq!(found.manifest.name, "shallow");
        assert_eq!(found.source, ManifestSource::Record);
    }

    #[test]
    fn embedded_manifest_preferred() {
        let site = tempfile::tempdir().unwrap();
        let module = site.path().join("portico_charts");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join(MANIFEST_FILE_NAME), component_manifest("portico-charts", "on-disk")).unwrap();

        let pkg = package("portico-charts", site.path());
        let index = FixedIndex {
            packages: vec![pkg.clone()],
            records: None,
            embedded: Some(component_manifest("portico-charts", "embedded")),
        };
        let found = scan_package(&index, &pkg).unwrap().unwrap();
        assert_eq!(found.manifest.name, "embedded");
        assert_eq!(found.source, ManifestSource::Embedded);
        assert_eq!(found.asset_root, module);
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let site = tempfile::tempdir().unwrap();
        let module = site.path().join("portico_charts");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join(MANIFEST_FILE_NAME), "[tool.portico.component\n").unwrap();

        let pkg = package("portico-charts", site.path());
        let index = FixedIndex { packages: vec![pkg.clone()], records: None, embedded: None };
        let err = scan_package(&index, &pkg).unwrap_err();
        assert!(matches!(err, RuntimeError::Manifest(_)));
    }

    #[tokio::test]
    async fn scan_skips_bad_packages_and_filters_early() {
        let site = tempfile::tempdir().unwrap();
        for (dist, body) in [
            ("portico_good", component_manifest("portico-good", "good")),
            ("portico_bad", "[tool.portico.component\n".to_string()),
            ("unrelated", component_manifest("unrelated", "never")),
        ] {
            let module = site.path().join(dist);
            fs::create_dir_all(&module).unwrap();
            fs::write(module.join(MANIFEST_FILE_NAME), body).unwrap();
        }

        let index = FixedIndex {
            packages: vec![
                package("portico-good", site.path()),
                package("portico-bad", site.path()),
                package("unrelated", site.path()),
            ],
            records: None,
            embedded: None,
        };
        let scanner = ManifestScanner::new(Arc::new(index));
        assert_eq!(scanner.candidates().len(), 2);

        let found = scanner.scan(Some(4)).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].manifest.name, "good");
        assert_eq!(found[0].package, "portico-good");
    }

    #[tokio::test]
    async fn scan_with_no_candidates_is_empty() {
        let index = FixedIndex { packages: Vec::new(), records: None, embedded: None };
        let scanner = ManifestScanner::new(Arc::new(index));
        assert!(scanner.scan(None).await.is_empty());
    }
}
