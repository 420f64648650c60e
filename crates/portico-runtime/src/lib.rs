//! Component runtime for portico: resolves component assets inside their
//! package sandbox, keeps the component registry, discovers installed
//! component packages, and re-resolves glob-backed assets in dev mode.
//!
//! ```text
//! scanner ──► registry ◄── watcher
//!                │
//!             sandbox
//! ```

#![warn(clippy::pedantic)]

pub mod error;
pub mod packages;
pub mod registry;
pub mod sandbox;
pub mod scanner;
pub mod watcher;

pub use error::{Result, RuntimeError};
pub use packages::{normalize_name, InstalledPackage, PackageIndex, SiteIndex};
pub use registry::{ComponentRegistry, RegistrationOrigin};
pub use sandbox::{classify_asset, resolve, AssetClass, SandboxError};
pub use scanner::{DiscoveredManifest, ManifestScanner, ManifestSource};
pub use watcher::{
    ComponentChangedCallback, ComponentFileWatcher, WatchOptions, DEFAULT_IGNORED_DIRS,
};
