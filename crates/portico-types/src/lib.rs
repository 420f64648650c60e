//! Shared portico component, manifest, and error model types.
//!
//! This crate is dependency-boundary-safe for the runtime, state, and engine
//! crates: it performs no file-system I/O of its own.

#![warn(clippy::pedantic)]

pub mod component;
pub mod error;
pub mod manifest;
pub mod watch;

pub use component::{AssetSource, ComponentDefinition, ComponentKey, ComponentPatch, FieldUpdate, Slot};
pub use error::ErrorCategory;
pub use manifest::{
    ComponentDescriptor, ManifestDocument, ManifestError, PackageManifest, SecurityRequirements,
    MANIFEST_FILE_NAME,
};
pub use watch::GlobWatchRecord;
