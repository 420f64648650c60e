//! Host orchestration for portico components.
//!
//! Loads the runtime configuration, discovers installed component packages
//! at startup, watches their assets in dev mode, and mounts components by
//! wiring the registry, data plane, and state bridge into one render
//! instruction.

#![warn(clippy::pedantic)]

pub mod config;
pub mod errors;
pub mod host;
pub mod output;

pub use config::parser::{parse_config, parse_config_str};
pub use config::types::RuntimeConfig;
pub use config::validator::validate_config;
pub use errors::MountError;
pub use host::{compute_widget_id, ComponentHost, MountRequest, StartupSummary};
pub use output::{
    BufferedOutput, Enqueue, LayoutHints, QueuedElement, RenderInstruction, Width,
    BIDI_COMPONENT_KIND,
};
