//! Installed-package index consumed by the manifest scanner.
//!
//! [`PackageIndex`] is the seam between discovery and the host's package
//! layout. [`SiteIndex`] reads `<dist>-<version>.dist-info` directories from
//! one or more site directories.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use portico_types::MANIFEST_FILE_NAME;

const METADATA_DIR_SUFFIX: &str = ".dist-info";

/// One installed package, as enumerated cheaply from its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Distribution name as declared.
    pub name: String,
    pub version: String,
    pub summary: Option<String>,
    /// Declared dependencies, verbatim.
    pub requires: Vec<String>,
    /// Site directory the package is installed into.
    pub site_dir: PathBuf,
    /// Metadata directory, when the index has one.
    pub metadata_dir: Option<PathBuf>,
}

impl InstalledPackage {
    #[must_use]
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Lowercase and fold `-`/`.` into `_` so distribution and module names compare equal.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(['-', '.'], "_")
}

/// Source of installed packages.
///
/// Implementations must be `Send + Sync`: the scanner shares one index
/// across its worker pool.
pub trait PackageIndex: Send + Sync {
    /// Enumerate installed packages. Must only read cheap metadata.
    fn packages(&self) -> Vec<InstalledPackage>;

    /// Files recorded as installed by the package, as absolute paths.
    /// `None` when the package has no file record.
    fn recorded_files(&self, package: &InstalledPackage) -> Option<Vec<PathBuf>>;

    /// Importable module names provided by the package.
    fn module_names(&self, package: &InstalledPackage) -> Vec<String>;

    /// Directories of the package's importable modules that exist on disk.
    fn module_dirs(&self, package: &InstalledPackage) -> Vec<PathBuf> {
        self.module_names(package)
            .iter()
            .map(|module| package.site_dir.join(module))
            .filter(|dir| dir.is_dir())
            .collect()
    }

    /// Manifest text embedded in the package's own metadata, if the index
    /// supports reading it without knowing where the package lives on disk.
    fn embedded_manifest(&self, _package: &InstalledPackage) -> Option<io::Result<String>> {
        None
    }
}

// ---------------------------------------------------------------------------
// SiteIndex
// ---------------------------------------------------------------------------

/// Filesystem index over site directories holding `*.dist-info` metadata.
///
/// When a distribution appears in several site directories, the first
/// directory wins.
#[derive(Debug, Clone, Default)]
pub struct SiteIndex {
    site_dirs: Vec<PathBuf>,
}

impl SiteIndex {
    #[must_use]
    pub fn new(site_dirs: Vec<PathBuf>) -> Self {
        Self { site_dirs }
    }

    #[must_use]
    pub fn site_dirs(&self) -> &[PathBuf] {
        &self.site_dirs
    }

    fn read_package(site_dir: &Path, metadata_dir: &Path) -> Option<InstalledPackage> {
        let text = std::fs::read_to_string(metadata_dir.join("METADATA")).ok()?;
        let fields = parse_metadata(&text);
        let Some(name) = fields.name else {
            tracing::debug!(path = %metadata_dir.display(), "Skipping metadata without a Name field");
            return None;
        };
        Some(InstalledPackage {
            name,
            version: fields.version.unwrap_or_default(),
            summary: fields.summary,
            requires: fields.requires,
            site_dir: site_dir.to_path_buf(),
            metadata_dir: Some(metadata_dir.to_path_buf()),
        })
    }
}

impl PackageIndex for SiteIndex {
    fn packages(&self) -> Vec<InstalledPackage> {
        let mut seen = HashSet::new();
        let mut packages = Vec::new();

        for site_dir in &self.site_dirs {
            let entries = match std::fs::read_dir(site_dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!(path = %site_dir.display(), error = %e, "Site directory unreadable");
                    continue;
                }
            };

            let mut metadata_dirs: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_dir()
                        && path
                            .file_name()
                            .is_some_and(|n| n.to_string_lossy().ends_with(METADATA_DIR_SUFFIX))
                })
                .collect();
            metadata_dirs.sort();

            for metadata_dir in metadata_dirs {
                if let Some(package) = Self::read_package(site_dir, &metadata_dir) {
                    if seen.insert(package.normalized_name()) {
                        packages.push(package);
                    }
                }
            }
        }

        packages
    }

    fn recorded_files(&self, package: &InstalledPackage) -> Option<Vec<PathBuf>> {
        let record = package.metadata_dir.as_ref()?.join("RECORD");
        let text = std::fs::read_to_string(record).ok()?;
        Some(
            text.lines()
                .filter_map(record_path)
                .map(|rel| package.site_dir.join(rel))
                .collect(),
        )
    }

    fn module_names(&self, package: &InstalledPackage) -> Vec<String> {
        let from_file = package
            .metadata_dir
            .as_ref()
            .and_then(|dir| std::fs::read_to_string(dir.join("top_level.txt")).ok())
            .map(|text| {
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if from_file.is_empty() {
            vec![package.normalized_name()]
        } else {
            from_file
        }
    }

    fn embedded_manifest(&self, package: &InstalledPackage) -> Option<io::Result<String>> {
        let path = package.metadata_dir.as_ref()?.join(MANIFEST_FILE_NAME);
        path.is_file().then(|| std::fs::read_to_string(path))
    }
}

// ---------------------------------------------------------------------------
// Metadata parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq)]
struct MetadataFields {
    name: Option<String>,
    version: Option<String>,
    summary: Option<String>,
    requires: Vec<String>,
}

/// Parse RFC-822 style headers up to the first blank line.
fn parse_metadata(text: &str) -> MetadataFields {
    let mut fields = MetadataFields::default();
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => fields.name = Some(value),
            "version" => fields.version = Some(value),
            "summary" => fields.summary = Some(value),
            "requires-dist" => fields.requires.push(value),
            _ => {}
        }
    }
    fields
}

/// First CSV column of a RECORD line, honouring double-quoted paths.
fn record_path(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let path = if let Some(rest) = line.strip_prefix('"') {
        rest.split_once('"').map(|(path, _)| path)?
    } else {
        line.split(',').next()?
    };
    (!path.is_empty()).then_some(path)
}
